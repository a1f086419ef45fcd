use serde::Serialize;

/// Field-level validation failures, returned structurally to the client
/// rather than as a bare message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationErrors {
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Lightweight shape check: one `@`, non-empty local part, dot-bearing
/// domain. The mail transport is the real arbiter.
pub fn email_is_valid(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && tld.len() >= 2 && !email.contains(char::is_whitespace)
}

pub const PASSWORD_MIN_LEN: usize = 8;

/// Passwords must carry at least one letter, one digit and one symbol.
pub fn password_meets_policy(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().any(|c| c.is_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

/// Phone numbers: digits with an optional leading `+`, allowing spaces,
/// dashes and parentheses between groups.
pub fn phone_is_valid(phone: &str) -> bool {
    let cleaned: String = phone
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    // The `+` may sit inside wrapper characters, e.g. "(+229) ...", so it
    // is stripped after cleaning, not before.
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    digits.len() >= 6 && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(email_is_valid("ada@example.com"));
        assert!(email_is_valid("first.last@mail.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!email_is_valid("adaexample.com"));
        assert!(!email_is_valid("@example.com"));
        assert!(!email_is_valid("ada@"));
        assert!(!email_is_valid("ada@example"));
        assert!(!email_is_valid("ada @example.com"));
        assert!(!email_is_valid("ada@ex@ample.com"));
    }

    #[test]
    fn password_policy_requires_all_classes() {
        assert!(password_meets_policy("s3cret-pass"));
        assert!(!password_meets_policy("short1!"));
        assert!(!password_meets_policy("nodigits!!"));
        assert!(!password_meets_policy("nosymbols123"));
        assert!(!password_meets_policy("12345678!"));
    }

    #[test]
    fn phone_accepts_international_forms() {
        assert!(phone_is_valid("+221 77 123 45 67"));
        assert!(phone_is_valid("0612345678"));
        assert!(phone_is_valid("(+229) 90-00-00-00"));
    }

    #[test]
    fn parenthesised_country_prefix_is_accepted() {
        assert!(phone_is_valid("(+233) 20 123 4567"));
        assert!(phone_is_valid("( +221 ) 77-123-45-67"));
    }

    #[test]
    fn phone_rejects_garbage() {
        assert!(!phone_is_valid("call me"));
        assert!(!phone_is_valid("123"));
        assert!(!phone_is_valid("77 123 45 6x"));
        assert!(!phone_is_valid("+229+90000000"));
    }

    #[test]
    fn errors_accumulate_in_order() {
        let mut errors = ValidationErrors::default();
        errors.push("email", "Email is invalid");
        errors.push("phone", "Phone number is invalid");
        assert_eq!(errors.fields.len(), 2);
        assert_eq!(errors.fields[0].field, "email");
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn empty_errors_convert_to_ok() {
        assert!(ValidationErrors::default().into_result().is_ok());
    }
}
