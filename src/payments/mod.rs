use async_trait::async_trait;
use thiserror::Error;

pub mod hosted;
#[cfg(test)]
pub mod mock;

pub use hosted::HostedCheckoutClient;

/// The event sells in a single currency. XOF has no minor unit, so amounts
/// are plain integers.
pub const CURRENCY: &str = "XOF";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway rejected the request with status {status}")]
    Remote { status: u16, body: String },

    #[error("gateway response carried no usable redirect URL")]
    MissingRedirect,

    #[error("unexpected gateway response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub description: String,
    pub amount: i64,
    pub currency: String,
    pub callback_url: String,
    pub customer: Customer,
}

/// Outcome of creating a remote transaction: the gateway's id for it plus
/// the hosted payment page the browser is sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRedirect {
    pub transaction_id: String,
    pub redirect_url: String,
}

/// Normalized view over whichever status vocabulary the remote side uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Approved,
    Pending,
    Other(String),
}

impl TransactionStatus {
    pub fn from_remote(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" | "accepted" | "completed" | "success" | "successful" => Self::Approved,
            "pending" | "created" | "initiated" => Self::Pending,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Approved => "approved".to_string(),
            Self::Pending => "pending".to_string(),
            Self::Other(raw) => raw.clone(),
        }
    }
}

/// Seam between the registration workflow and the remote provider. The
/// adapter owns no durable state; the transaction id stored on the
/// registration is the only link.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<PaymentRedirect, GatewayError>;

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_synonyms_normalize() {
        for raw in ["approved", "ACCEPTED", " Completed ", "success", "successful"] {
            assert!(TransactionStatus::from_remote(raw).is_approved(), "{raw}");
        }
    }

    #[test]
    fn pending_synonyms_normalize() {
        for raw in ["pending", "created", "INITIATED"] {
            assert_eq!(TransactionStatus::from_remote(raw), TransactionStatus::Pending);
        }
    }

    #[test]
    fn unknown_statuses_are_preserved_verbatim() {
        assert_eq!(
            TransactionStatus::from_remote(" declined "),
            TransactionStatus::Other("declined".to_string())
        );
        assert!(!TransactionStatus::from_remote("declined").is_approved());
    }
}
