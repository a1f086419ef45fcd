use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid mail address: {0}")]
    Address(String),

    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Outbound transactional email. Everything user-facing goes through
/// `send_detached`: the send happens after the handler has produced its
/// result and a failure is only ever logged.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    support_email: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Result<Self, MailerError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: format!("Conference Team <{}>", config.app_email),
            support_email: config.support_email.clone(),
        })
    }

    pub async fn send(&self, to: &str, subject: &str, body: String) -> Result<(), MailerError> {
        let message = Message::builder()
            .from(self
                .from
                .parse()
                .map_err(|e| MailerError::Address(format!("from: {e}")))?)
            .to(to
                .parse()
                .map_err(|e| MailerError::Address(format!("to: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }

    /// Schedule a send without tying it to the request lifecycle.
    pub fn send_detached(&self, to: String, subject: impl Into<String>, body: String) {
        let mailer = self.clone();
        let subject = subject.into();
        tokio::spawn(async move {
            if let Err(e) = mailer.send(&to, &subject, body).await {
                tracing::warn!(error = %e, to = %to, subject = %subject, "Email send failed");
            }
        });
    }

    pub fn support_email(&self) -> &str {
        &self.support_email
    }
}

pub fn verification_body(full_name: &str, link: &str, expires_minutes: i64) -> String {
    format!(
        "Hi {full_name},\n\n\
         Confirm your email address by opening the link below. It expires in \
         {expires_minutes} minutes.\n\n{link}\n\n\
         If you did not create this account you can ignore this message.\n"
    )
}

pub fn login_notice_body(full_name: &str, support_email: &str) -> String {
    format!(
        "Hi {full_name},\n\n\
         A new login to your dashboard account just happened. If this was not \
         you, contact {support_email} immediately.\n"
    )
}

pub fn password_reset_body(full_name: &str, code: &str, expires_minutes: i64) -> String {
    format!(
        "Hi {full_name},\n\n\
         Your password reset code is {code}. It expires in {expires_minutes} \
         minutes.\n\n\
         If you did not request a reset you can ignore this message.\n"
    )
}

pub fn ticket_confirmation_body(first_name: &str, ticket_name: &str, ticket_url: &str) -> String {
    format!(
        "Hi {first_name},\n\n\
         Your registration is confirmed! Your {ticket_name} ticket is ready. \
         Download it here:\n\n{ticket_url}\n\n\
         Present the QR code on your ticket at the entrance.\n\n\
         See you at the conference!\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_body_carries_the_link_and_ttl() {
        let body = verification_body("Ada", "https://conf.example.com/verify?token=t", 30);
        assert!(body.contains("https://conf.example.com/verify?token=t"));
        assert!(body.contains("30 minutes"));
    }

    #[test]
    fn reset_body_carries_the_code() {
        let body = password_reset_body("Ada", "834120", 30);
        assert!(body.contains("834120"));
    }

    #[test]
    fn confirmation_body_carries_the_download_url() {
        let body = ticket_confirmation_body("Ada", "Standard", "https://c.example.com/tickets/x");
        assert!(body.contains("https://c.example.com/tickets/x"));
        assert!(body.contains("Standard"));
    }
}
