use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::services::identity::{self, LoginInput, SignupInput};
use crate::state::AppState;
use crate::utils::cookie::build_session_cookie;
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<Response, AppError> {
    identity::create_account(&state.pool, &state.config, &state.mailer, input).await?;
    Ok(empty_success(
        "Account created, check your inbox to verify your email",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Response, AppError> {
    let session = identity::login(&state.pool, &state.config, &state.mailer, input).await?;

    let cookie = build_session_cookie(&session.cookie_value);
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| AppError::Internal("invalid cookie header".to_string()))?;

    let mut response = success(session.user, "Logged in");
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

#[derive(Deserialize)]
pub struct VerifyParams {
    pub token: Uuid,
}

pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Result<Response, AppError> {
    identity::verify_account(&state.pool, params.token).await?;
    Ok(empty_success("Email verified, you can now log in"))
}

#[derive(Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<Response, AppError> {
    identity::resend_verification(&state.pool, &state.config, &state.mailer, &payload.email)
        .await?;
    Ok(empty_success("Verification email sent"))
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<Response, AppError> {
    let request_id =
        identity::request_password_reset(&state.pool, &state.mailer, &payload.email).await?;
    Ok(success(
        json!({ "request_id": request_id }),
        "A reset code has been emailed to you",
    ))
}

#[derive(Deserialize)]
pub struct ResetConfirmPayload {
    pub request_id: Uuid,
    pub code: String,
    pub password: String,
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetConfirmPayload>,
) -> Result<Response, AppError> {
    identity::confirm_password_reset(
        &state.pool,
        payload.request_id,
        &payload.code,
        &payload.password,
    )
    .await?;
    Ok(empty_success("Password updated, you can now log in"))
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let user = identity::current_user(&state.pool, &state.config, &headers)
        .await
        .ok_or_else(|| AppError::Auth("Not logged in".to_string()))?;
    Ok(success(user, "Current user"))
}
