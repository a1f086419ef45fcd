use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;

use crate::services::registration;
use crate::state::AppState;
use crate::utils::error::AppError;

/// The gateway sends the browser back with `status` and `id` query
/// parameters. The `status` value is untrusted and ignored; the real
/// status is re-read from the gateway by transaction id.
#[derive(Deserialize)]
pub struct CallbackParams {
    pub id: Option<String>,
    #[allow(dead_code)]
    pub status: Option<String>,
}

pub async fn payment_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, AppError> {
    let transaction_id = params
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::NotFound("No transaction id in callback".to_string()))?;

    let ticket_url = registration::confirm_payment(
        &state.pool,
        &state.config,
        state.gateway.as_ref(),
        &state.mailer,
        transaction_id,
    )
    .await?;

    Ok(Redirect::to(&ticket_url).into_response())
}
