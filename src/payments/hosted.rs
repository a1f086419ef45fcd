use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{Config, GatewayEnvironment};
use crate::payments::{
    GatewayError, PaymentGateway, PaymentRedirect, TransactionRequest, TransactionStatus,
};

/// REST client for the provider's hosted payment page API. Creating a
/// transaction returns its id and a redirect URL; status is polled back by
/// id from the browser callback.
#[derive(Clone)]
pub struct HostedCheckoutClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    environment: GatewayEnvironment,
}

impl HostedCheckoutClient {
    pub fn from_config(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.gateway_base_url.clone(),
            api_key: config.gateway_api_key.clone(),
            environment: config.gateway_environment,
        }
    }

    fn transactions_url(&self) -> String {
        format!("{}/v1/transactions", self.base_url)
    }

    fn transaction_url(&self, transaction_id: &str) -> String {
        format!("{}/v1/transactions/{transaction_id}", self.base_url)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        response.json::<Value>().await.map_err(GatewayError::from)
    }
}

#[async_trait]
impl PaymentGateway for HostedCheckoutClient {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<PaymentRedirect, GatewayError> {
        let body = json!({
            "description": request.description,
            "amount": request.amount,
            "currency": request.currency,
            "callback_url": request.callback_url,
            "environment": self.environment.as_str(),
            "customer": {
                "first_name": request.customer.first_name,
                "last_name": request.customer.last_name,
                "email": request.customer.email,
                "phone": request.customer.phone,
            },
        });

        let response = self
            .http
            .post(self.transactions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        redirect_from_response(&Self::read_json(response).await?)
    }

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, GatewayError> {
        let response = self
            .http
            .get(self.transaction_url(transaction_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        status_from_response(&Self::read_json(response).await?)
    }
}

fn redirect_from_response(body: &Value) -> Result<PaymentRedirect, GatewayError> {
    let transaction_id = body
        .get("id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GatewayError::Malformed("transaction id missing".to_string()))?;

    let redirect_url = body
        .get("redirect_url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| url.starts_with("http://") || url.starts_with("https://"))
        .ok_or(GatewayError::MissingRedirect)?;

    Ok(PaymentRedirect {
        transaction_id: transaction_id.to_string(),
        redirect_url: redirect_url.to_string(),
    })
}

fn status_from_response(body: &Value) -> Result<TransactionStatus, GatewayError> {
    body.get("status")
        .and_then(Value::as_str)
        .map(TransactionStatus::from_remote)
        .ok_or_else(|| GatewayError::Malformed("status field missing".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redirect_parses_a_complete_response() {
        let body = json!({
            "id": "txn_123",
            "redirect_url": "https://pay.example.com/txn_123",
            "status": "created",
        });
        let redirect = redirect_from_response(&body).unwrap();
        assert_eq!(redirect.transaction_id, "txn_123");
        assert_eq!(redirect.redirect_url, "https://pay.example.com/txn_123");
    }

    #[test]
    fn missing_redirect_url_is_a_setup_failure() {
        let body = json!({ "id": "txn_123" });
        assert!(matches!(
            redirect_from_response(&body),
            Err(GatewayError::MissingRedirect)
        ));
    }

    #[test]
    fn non_http_redirect_url_is_a_setup_failure() {
        let body = json!({ "id": "txn_123", "redirect_url": "javascript:alert(1)" });
        assert!(matches!(
            redirect_from_response(&body),
            Err(GatewayError::MissingRedirect)
        ));
    }

    #[test]
    fn missing_transaction_id_is_malformed() {
        let body = json!({ "redirect_url": "https://pay.example.com/x" });
        assert!(matches!(
            redirect_from_response(&body),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn status_field_is_normalized() {
        let body = json!({ "id": "txn_123", "status": "Approved" });
        assert_eq!(
            status_from_response(&body).unwrap(),
            TransactionStatus::Approved
        );
    }

    #[test]
    fn absent_status_field_is_malformed() {
        let body = json!({ "id": "txn_123" });
        assert!(matches!(
            status_from_response(&body),
            Err(GatewayError::Malformed(_))
        ));
    }
}
