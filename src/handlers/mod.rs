use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod admin;
pub mod auth;
pub mod payment;
pub mod registration;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "confreg-api",
    };

    success(payload, "Health check successful").into_response()
}
