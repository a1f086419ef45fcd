use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::models::{Registration, RegistrationsConfig, Ticket};
use crate::services::registration::{RegisterOutcome, RegistrationInput};
use crate::services::{issuance, registration, tickets};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

pub async fn list_tickets(State(state): State<AppState>) -> Result<Response, AppError> {
    let tickets = tickets::list_tickets(&state.pool).await?;
    Ok(success(tickets, "Ticket catalog"))
}

/// Public gate for the registration form: whether the window is open.
pub async fn registration_status(State(state): State<AppState>) -> Result<Response, AppError> {
    let window: RegistrationsConfig =
        sqlx::query_as("SELECT id, open, close_date FROM registrations_config WHERE id = 1")
            .fetch_one(&state.pool)
            .await?;

    Ok(success(
        json!({
            "open": window.is_open(Utc::now()),
            "close_date": window.close_date,
        }),
        "Registration status",
    ))
}

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegistrationInput>,
) -> Result<Response, AppError> {
    let outcome = registration::register(
        &state.pool,
        &state.config,
        state.gateway.as_ref(),
        &state.mailer,
        input,
    )
    .await?;

    Ok(match outcome {
        RegisterOutcome::Confirmed { ticket_url } => success(
            json!({ "ticket_url": ticket_url }),
            "Registration confirmed, your ticket has been emailed to you",
        ),
        RegisterOutcome::PaymentRequired { payment_url } => success(
            json!({ "payment_url": payment_url }),
            "Complete the payment to confirm your registration",
        ),
    })
}

/// Downloadable ticket view for a confirmed registration: attendee, ticket
/// and the QR code encoding the door-check URL.
pub async fn ticket_view(
    State(state): State<AppState>,
    Path(registration_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let registration: Option<Registration> = sqlx::query_as(
        "SELECT id, first_name, last_name, email, phone, ticket_id, transaction_id, \
                confirmed, attendance_confirmed, attended, created_at \
         FROM registrations WHERE id = $1 AND confirmed",
    )
    .bind(registration_id)
    .fetch_optional(&state.pool)
    .await?;

    let Some(registration) = registration else {
        return Err(AppError::NotFound(
            "No confirmed registration with this id".to_string(),
        ));
    };

    let ticket: Ticket = tickets::get_ticket(&state.pool, registration.ticket_id).await?;
    let qr_svg = issuance::verification_qr_svg(&state.config.base_url, registration.id)?;
    let perks: Vec<String> = ticket.perk_list().iter().map(|p| p.to_string()).collect();

    Ok(success(
        json!({
            "registration": registration,
            "ticket": ticket,
            "perks": perks,
            "qr_svg": qr_svg,
        }),
        "Your ticket",
    ))
}
