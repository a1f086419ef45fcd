use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::mailer::Mailer;
use crate::payments::PaymentGateway;

/// Shared handler state. The config is loaded once at startup and threaded
/// through explicitly; nothing reads the environment per-request.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub mailer: Mailer,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Config,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Mailer,
    ) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            gateway,
            mailer,
        }
    }
}
