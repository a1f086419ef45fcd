use std::env;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Which gateway backend transactions are created against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayEnvironment {
    Live,
    Sandbox,
}

impl GatewayEnvironment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" | "production" => Some(Self::Live),
            "sandbox" | "test" => Some(Self::Sandbox),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Sandbox => "sandbox",
        }
    }
}

/// Startup configuration. Every field is required; a missing variable
/// aborts the process before the server binds.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub base_url: String,
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub app_email: String,
    pub support_email: String,
    pub gateway_base_url: String,
    pub gateway_api_key: String,
    pub gateway_environment: GatewayEnvironment,
    pub allowed_emails: Vec<String>,
    pub cookie_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment_raw = required("PAYMENT_GATEWAY_ENV")?;
        let gateway_environment = GatewayEnvironment::parse(&environment_raw).ok_or(
            ConfigError::Invalid {
                name: "PAYMENT_GATEWAY_ENV",
                value: environment_raw,
            },
        )?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            base_url: required("BASE_URL")?.trim_end_matches('/').to_string(),
            smtp_host: required("SMTP_HOST")?,
            smtp_username: required("SMTP_USERNAME")?,
            smtp_password: required("SMTP_PASSWORD")?,
            app_email: required("APP_EMAIL")?,
            support_email: required("SUPPORT_EMAIL")?,
            gateway_base_url: required("PAYMENT_GATEWAY_URL")?
                .trim_end_matches('/')
                .to_string(),
            gateway_api_key: required("PAYMENT_GATEWAY_API_KEY")?,
            gateway_environment,
            allowed_emails: parse_allow_list(&required("ALLOWED_EMAILS")?),
            cookie_secret: required("COOKIE_SECRET")?,
        })
    }

    /// Only allow-listed addresses may create dashboard accounts.
    pub fn email_is_allowed(&self, email: &str) -> bool {
        let candidate = email.trim();
        self.allowed_emails
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(candidate))
    }

    /// Where the payment gateway sends the browser after a payment attempt.
    pub fn payment_callback_url(&self) -> String {
        format!("{}/payments/callback", self.base_url)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_allow_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_allow_list(entries: &[&str]) -> Config {
        Config {
            database_url: String::new(),
            base_url: "https://conf.example.com".to_string(),
            smtp_host: String::new(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            app_email: String::new(),
            support_email: String::new(),
            gateway_base_url: String::new(),
            gateway_api_key: String::new(),
            gateway_environment: GatewayEnvironment::Sandbox,
            allowed_emails: entries.iter().map(|e| e.to_string()).collect(),
            cookie_secret: String::new(),
        }
    }

    #[test]
    fn allow_list_parsing_trims_and_drops_empties() {
        let parsed = parse_allow_list(" ada@example.com , ,grace@example.com,");
        assert_eq!(parsed, vec!["ada@example.com", "grace@example.com"]);
    }

    #[test]
    fn allow_list_match_is_case_insensitive() {
        let config = config_with_allow_list(&["Ada@Example.com"]);
        assert!(config.email_is_allowed("ada@example.com"));
        assert!(config.email_is_allowed(" ADA@EXAMPLE.COM "));
        assert!(!config.email_is_allowed("grace@example.com"));
    }

    #[test]
    fn gateway_environment_parses_known_names() {
        assert_eq!(
            GatewayEnvironment::parse("live"),
            Some(GatewayEnvironment::Live)
        );
        assert_eq!(
            GatewayEnvironment::parse(" SANDBOX "),
            Some(GatewayEnvironment::Sandbox)
        );
        assert_eq!(GatewayEnvironment::parse("staging"), None);
    }

    #[test]
    fn callback_url_hangs_off_the_base_url() {
        let config = config_with_allow_list(&[]);
        assert_eq!(
            config.payment_callback_url(),
            "https://conf.example.com/payments/callback"
        );
    }
}
