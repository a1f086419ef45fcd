use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    GatewayError, PaymentGateway, PaymentRedirect, TransactionRequest, TransactionStatus,
};

/// Scripted stand-in for the remote provider. Results are queued up front
/// and handed out in call order; every call is recorded so tests can assert
/// on what the workflow actually sent.
#[derive(Default)]
pub struct ScriptedGateway {
    create_results: Mutex<VecDeque<Result<PaymentRedirect, GatewayError>>>,
    status_results: Mutex<VecDeque<Result<TransactionStatus, GatewayError>>>,
    create_calls: Mutex<Vec<TransactionRequest>>,
    status_calls: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_create(self, result: Result<PaymentRedirect, GatewayError>) -> Self {
        self.create_results.lock().unwrap().push_back(result);
        self
    }

    pub fn script_status(self, result: Result<TransactionStatus, GatewayError>) -> Self {
        self.status_results.lock().unwrap().push_back(result);
        self
    }

    pub fn create_calls(&self) -> Vec<TransactionRequest> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<String> {
        self.status_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<PaymentRedirect, GatewayError> {
        self.create_calls.lock().unwrap().push(request.clone());
        self.create_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(GatewayError::Malformed(
                    "unscripted create_transaction call".to_string(),
                ))
            })
    }

    async fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, GatewayError> {
        self.status_calls
            .lock()
            .unwrap()
            .push(transaction_id.to_string());
        self.status_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(GatewayError::Malformed(
                    "unscripted transaction_status call".to_string(),
                ))
            })
    }
}
