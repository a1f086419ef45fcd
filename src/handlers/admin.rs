use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Registration, RegistrationsConfig};
use crate::services::identity::require_admin;
use crate::services::registration::RegistrationInput;
use crate::services::{issuance, registration, tickets};
use crate::services::tickets::TicketInput;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};
use crate::utils::validate::ValidationErrors;

const REGISTRATION_COLUMNS: &str =
    "id, first_name, last_name, email, phone, ticket_id, transaction_id, \
     confirmed, attendance_confirmed, attended, created_at";

// ---- registrations ----

pub async fn list_registrations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let rows: Vec<Registration> = sqlx::query_as(&format!(
        "SELECT {REGISTRATION_COLUMNS} FROM registrations ORDER BY created_at DESC"
    ))
    .fetch_all(&state.pool)
    .await?;

    Ok(success(rows, "Registrations"))
}

/// Detail page backing the ticket QR code: scanning a ticket lands here.
pub async fn registration_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let row: Option<Registration> = sqlx::query_as(&format!(
        "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    let Some(registration) = row else {
        return Err(AppError::NotFound("Registration not found".to_string()));
    };

    let ticket = tickets::get_ticket(&state.pool, registration.ticket_id).await?;
    Ok(success(
        json!({ "registration": registration, "ticket": ticket }),
        "Registration detail",
    ))
}

/// Manual registration entered from the dashboard; confirmed immediately.
pub async fn create_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<RegistrationInput>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let (registration, ticket_url) =
        registration::register_manual(&state.pool, &state.config, &state.mailer, input).await?;

    Ok(created(
        json!({ "registration": registration, "ticket_url": ticket_url }),
        "Registration created",
    ))
}

#[derive(Deserialize)]
pub struct AttendancePayload {
    pub attendance_confirmed: Option<bool>,
    pub attended: Option<bool>,
}

pub async fn update_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AttendancePayload>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let row: Option<Registration> = sqlx::query_as(&format!(
        "UPDATE registrations \
         SET attendance_confirmed = COALESCE($1, attendance_confirmed), \
             attended = COALESCE($2, attended) \
         WHERE id = $3 RETURNING {REGISTRATION_COLUMNS}"
    ))
    .bind(payload.attendance_confirmed)
    .bind(payload.attended)
    .bind(id)
    .fetch_optional(&state.pool)
    .await?;

    match row {
        Some(registration) => Ok(success(registration, "Attendance updated")),
        None => Err(AppError::NotFound("Registration not found".to_string())),
    }
}

pub async fn delete_registration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Registration not found".to_string()));
    }
    Ok(empty_success("Registration deleted"))
}

/// QR payload for a registration, regenerated on demand for re-prints.
pub async fn registration_qr(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let qr_svg = issuance::verification_qr_svg(&state.config.base_url, id)?;
    Ok(success(json!({ "qr_svg": qr_svg }), "Verification QR"))
}

// ---- ticket catalog ----

pub async fn create_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<TicketInput>,
) -> Result<Response, AppError> {
    let admin = require_admin(&state.pool, &state.config, &headers).await?;
    let ticket = tickets::create_ticket(&state.pool, &admin, input).await?;
    Ok(created(ticket, "Ticket created"))
}

pub async fn update_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<TicketInput>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;
    let ticket = tickets::update_ticket(&state.pool, id, input).await?;
    Ok(success(ticket, "Ticket updated"))
}

pub async fn delete_ticket(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;
    tickets::delete_ticket(&state.pool, id).await?;
    Ok(empty_success("Ticket deleted"))
}

// ---- registration settings ----

pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let window: RegistrationsConfig =
        sqlx::query_as("SELECT id, open, close_date FROM registrations_config WHERE id = 1")
            .fetch_one(&state.pool)
            .await?;
    Ok(success(window, "Registration settings"))
}

#[derive(Deserialize)]
pub struct SettingsPayload {
    pub open: bool,
    pub close_date: Option<DateTime<Utc>>,
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SettingsPayload>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let window: RegistrationsConfig = sqlx::query_as(
        "UPDATE registrations_config SET open = $1, close_date = $2 WHERE id = 1 \
         RETURNING id, open, close_date",
    )
    .bind(payload.open)
    .bind(payload.close_date)
    .fetch_one(&state.pool)
    .await?;

    Ok(success(window, "Registration settings updated"))
}

// ---- broadcast email ----

#[derive(Deserialize)]
pub struct BroadcastPayload {
    pub subject: String,
    pub body: String,
}

/// One message to every confirmed registrant, dispatched fire-and-forget.
pub async fn broadcast(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BroadcastPayload>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let mut errors = ValidationErrors::default();
    if payload.subject.trim().is_empty() {
        errors.push("subject", "Subject is required");
    }
    if payload.body.trim().is_empty() {
        errors.push("body", "Body is required");
    }
    errors.into_result().map_err(AppError::Validation)?;

    let recipients: Vec<String> =
        sqlx::query_scalar("SELECT email FROM registrations WHERE confirmed")
            .fetch_all(&state.pool)
            .await?;

    let count = recipients.len();
    for email in recipients {
        state
            .mailer
            .send_detached(email, payload.subject.clone(), payload.body.clone());
    }

    Ok(success(
        json!({ "recipients": count }),
        "Broadcast scheduled",
    ))
}

// ---- CSV export ----

#[derive(Deserialize)]
pub struct ExportParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(FromRow)]
struct RegistrationExportRow {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    ticket_name: String,
    confirmed: bool,
    attendance_confirmed: bool,
    attended: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionExportRow {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    expired: bool,
}

pub async fn export_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    require_admin(&state.pool, &state.config, &headers).await?;

    let kind = match params.kind.as_deref() {
        Some("registrations") => "registrations",
        _ => "sessions",
    };

    let document = match kind {
        "registrations" => {
            let rows: Vec<RegistrationExportRow> = sqlx::query_as(
                "SELECT r.first_name, r.last_name, r.email, r.phone, t.name AS ticket_name, \
                        r.confirmed, r.attendance_confirmed, r.attended, r.created_at \
                 FROM registrations r JOIN tickets t ON t.id = r.ticket_id \
                 ORDER BY r.created_at DESC",
            )
            .fetch_all(&state.pool)
            .await?;
            registrations_csv(&rows)
        }
        _ => {
            let rows: Vec<SessionExportRow> = sqlx::query_as(
                "SELECT s.id, u.email, s.created_at, s.expires_at, s.expired \
                 FROM auth_sessions s JOIN users u ON u.id = s.user_id \
                 ORDER BY s.created_at DESC",
            )
            .fetch_all(&state.pool)
            .await?;
            sessions_csv(&rows)
        }
    };

    let filename = export_filename(kind, Utc::now().date_naive());
    let response_headers = [
        (
            header::CONTENT_TYPE,
            "text/csv; charset=utf-8".to_string(),
        ),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];

    Ok((response_headers, document).into_response())
}

/// Excel needs the BOM to detect UTF-8.
const UTF8_BOM: &str = "\u{feff}";

fn export_filename(kind: &str, date: NaiveDate) -> String {
    format!("{kind}-{date}.csv")
}

fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_document(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut doc = String::from(UTF8_BOM);
    doc.push_str(&header.join(","));
    doc.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| csv_escape(f)).collect();
        doc.push_str(&line.join(","));
        doc.push('\n');
    }
    doc
}

fn registrations_csv(rows: &[RegistrationExportRow]) -> String {
    csv_document(
        &[
            "first_name",
            "last_name",
            "email",
            "phone",
            "ticket",
            "confirmed",
            "attendance_confirmed",
            "attended",
            "created_at",
        ],
        rows.iter()
            .map(|r| {
                vec![
                    r.first_name.clone(),
                    r.last_name.clone(),
                    r.email.clone(),
                    r.phone.clone(),
                    r.ticket_name.clone(),
                    r.confirmed.to_string(),
                    r.attendance_confirmed.to_string(),
                    r.attended.to_string(),
                    r.created_at.to_rfc3339(),
                ]
            })
            .collect(),
    )
}

fn sessions_csv(rows: &[SessionExportRow]) -> String {
    csv_document(
        &["id", "email", "created_at", "expires_at", "expired"],
        rows.iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.email.clone(),
                    r.created_at.to_rfc3339(),
                    r.expires_at.to_rfc3339(),
                    r.expired.to_string(),
                ]
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_uses_iso_dates() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        assert_eq!(export_filename("registrations", date), "registrations-2026-08-30.csv");
        assert_eq!(export_filename("sessions", date), "sessions-2026-08-30.csv");
    }

    #[test]
    fn document_is_bom_prefixed() {
        let doc = csv_document(&["a", "b"], vec![vec!["1".to_string(), "2".to_string()]]);
        assert!(doc.starts_with('\u{feff}'));
        assert!(doc.contains("a,b\n"));
        assert!(doc.contains("1,2\n"));
    }

    #[test]
    fn fields_with_separators_are_quoted() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }
}
