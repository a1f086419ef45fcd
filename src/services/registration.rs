use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::mailer::Mailer;
use crate::models::{Registration, RegistrationsConfig, Ticket};
use crate::payments::{
    Customer, GatewayError, PaymentGateway, PaymentRedirect, TransactionRequest, CURRENCY,
};
use crate::services::issuance;
use crate::utils::error::AppError;
use crate::utils::validate::{email_is_valid, phone_is_valid, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct RegistrationInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub country_code: String,
    pub ticket_id: String,
}

/// Input that passed field validation, with the ticket id parsed and the
/// phone joined with its country code.
#[derive(Debug, Clone)]
pub struct ValidInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub ticket_id: Uuid,
}

/// Tagged outcome of a registration attempt; the two success shapes are
/// deliberately distinct variants instead of optional fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Free ticket: confirmed immediately, ticket already issued.
    Confirmed { ticket_url: String },
    /// Paid ticket: the caller must redirect the browser to the hosted
    /// payment page.
    PaymentRequired { payment_url: String },
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("validation failed")]
    Invalid(ValidationErrors),

    #[error("a confirmed registration already exists for this email")]
    AlreadyRegistered,

    #[error("registrations are closed")]
    Closed,

    #[error("the selected ticket does not exist")]
    UnknownTicket,

    #[error("payment setup failed")]
    PaymentSetup(#[source] GatewayError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<RegisterError> for AppError {
    fn from(e: RegisterError) -> Self {
        match e {
            RegisterError::Invalid(errors) => AppError::Validation(errors),
            RegisterError::AlreadyRegistered => AppError::Conflict(
                "A confirmed registration already exists for this email".to_string(),
            ),
            RegisterError::Closed => AppError::RegistrationsClosed,
            RegisterError::UnknownTicket => {
                AppError::NotFound("The selected ticket does not exist".to_string())
            }
            RegisterError::PaymentSetup(source) => AppError::Gateway(source.to_string()),
            RegisterError::Database(source) => AppError::Database(source),
        }
    }
}

pub fn validate_input(input: &RegistrationInput) -> Result<ValidInput, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let first_name = input.first_name.trim();
    if first_name.is_empty() {
        errors.push("first_name", "First name is required");
    }

    let last_name = input.last_name.trim();
    if last_name.is_empty() {
        errors.push("last_name", "Last name is required");
    }

    let email = input.email.trim();
    if !email_is_valid(email) {
        errors.push("email", "Email address is invalid");
    }

    let country_code = input.country_code.trim();
    if !country_code_is_valid(country_code) {
        errors.push("country_code", "Country code is invalid");
    }

    if !phone_is_valid(&input.phone) {
        errors.push("phone", "Phone number is invalid");
    }

    let ticket_id = match input.ticket_id.trim().parse::<Uuid>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.push("ticket_id", "Ticket id is invalid");
            None
        }
    };

    match ticket_id {
        Some(ticket_id) if errors.is_empty() => Ok(ValidInput {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            phone: format!("{country_code} {}", input.phone.trim()),
            ticket_id,
        }),
        _ => Err(errors),
    }
}

fn country_code_is_valid(code: &str) -> bool {
    let digits = code.strip_prefix('+').unwrap_or(code);
    (1..=4).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

/// How a fresh registration proceeds, decided by the ticket price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentPlan {
    /// Free ticket: confirmed on insert, issued immediately.
    ConfirmNow,
    /// Paid ticket: inserted unconfirmed, awaits the gateway callback.
    AwaitPayment,
}

pub fn payment_plan(ticket: &Ticket) -> PaymentPlan {
    if ticket.is_free() {
        PaymentPlan::ConfirmNow
    } else {
        PaymentPlan::AwaitPayment
    }
}

/// Register an attendee.
///
/// The supersede-check-insert sequence runs inside one transaction so two
/// concurrent submissions for the same email cannot interleave; the partial
/// unique index on confirmed emails backs the invariant at the database
/// level as well.
pub async fn register(
    pool: &PgPool,
    config: &Config,
    gateway: &dyn PaymentGateway,
    mailer: &Mailer,
    input: RegistrationInput,
) -> Result<RegisterOutcome, RegisterError> {
    let input = validate_input(&input).map_err(RegisterError::Invalid)?;

    let mut tx = pool.begin().await?;

    let already_confirmed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM registrations WHERE LOWER(email) = LOWER($1) AND confirmed)",
    )
    .bind(&input.email)
    .fetch_one(&mut *tx)
    .await?;
    if already_confirmed {
        return Err(RegisterError::AlreadyRegistered);
    }

    // Supersede stale unconfirmed attempts for this email
    sqlx::query("DELETE FROM registrations WHERE LOWER(email) = LOWER($1) AND NOT confirmed")
        .bind(&input.email)
        .execute(&mut *tx)
        .await?;

    let window: RegistrationsConfig =
        sqlx::query_as("SELECT id, open, close_date FROM registrations_config WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;
    if !window.is_open(Utc::now()) {
        return Err(RegisterError::Closed);
    }

    let ticket: Option<Ticket> = sqlx::query_as(
        "SELECT id, kind, name, description, perks, gradient_from, gradient_to, price, \
         created_by, sold_out, created_at FROM tickets WHERE id = $1",
    )
    .bind(input.ticket_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(ticket) = ticket else {
        return Err(RegisterError::UnknownTicket);
    };

    let registration: Registration = sqlx::query_as(
        "INSERT INTO registrations (id, first_name, last_name, email, phone, ticket_id, confirmed) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, first_name, last_name, email, phone, ticket_id, transaction_id, \
                   confirmed, attendance_confirmed, attended, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(ticket.id)
    .bind(payment_plan(&ticket) == PaymentPlan::ConfirmNow)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if payment_plan(&ticket) == PaymentPlan::ConfirmNow {
        let ticket_url = issuance::issue(config, mailer, &registration, &ticket);
        return Ok(RegisterOutcome::Confirmed { ticket_url });
    }

    start_payment(pool, config, gateway, &registration, &ticket).await
}

fn build_transaction_request(
    config: &Config,
    registration: &Registration,
    ticket: &Ticket,
) -> TransactionRequest {
    TransactionRequest {
        description: transaction_description(registration, ticket),
        amount: ticket.price,
        currency: CURRENCY.to_string(),
        callback_url: config.payment_callback_url(),
        customer: Customer {
            first_name: registration.first_name.clone(),
            last_name: registration.last_name.clone(),
            email: registration.email.clone(),
            phone: registration.phone.clone(),
        },
    }
}

/// Result of asking the gateway for a hosted payment page.
#[derive(Debug)]
enum PaymentSetup {
    Ready(PaymentRedirect),
    Failed(GatewayError),
}

async fn request_payment_redirect(
    gateway: &dyn PaymentGateway,
    request: &TransactionRequest,
) -> PaymentSetup {
    match gateway.create_transaction(request).await {
        Ok(redirect) => PaymentSetup::Ready(redirect),
        Err(e) => PaymentSetup::Failed(e),
    }
}

/// Open a gateway transaction for a paid registration. Any failure deletes
/// the just-created row so no partial paid registration survives.
async fn start_payment(
    pool: &PgPool,
    config: &Config,
    gateway: &dyn PaymentGateway,
    registration: &Registration,
    ticket: &Ticket,
) -> Result<RegisterOutcome, RegisterError> {
    let request = build_transaction_request(config, registration, ticket);

    let redirect = match request_payment_redirect(gateway, &request).await {
        PaymentSetup::Ready(redirect) => redirect,
        PaymentSetup::Failed(e) => {
            delete_registration(pool, registration.id).await?;
            return Err(RegisterError::PaymentSetup(e));
        }
    };

    sqlx::query("UPDATE registrations SET transaction_id = $1 WHERE id = $2")
        .bind(&redirect.transaction_id)
        .bind(registration.id)
        .execute(pool)
        .await?;

    Ok(RegisterOutcome::PaymentRequired {
        payment_url: redirect.redirect_url,
    })
}

/// Admin-entered registration: bypasses the public window and payment,
/// inserted already confirmed, issuance triggered immediately.
pub async fn register_manual(
    pool: &PgPool,
    config: &Config,
    mailer: &Mailer,
    input: RegistrationInput,
) -> Result<(Registration, String), RegisterError> {
    let input = validate_input(&input).map_err(RegisterError::Invalid)?;

    let mut tx = pool.begin().await?;

    let already_confirmed: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM registrations WHERE LOWER(email) = LOWER($1) AND confirmed)",
    )
    .bind(&input.email)
    .fetch_one(&mut *tx)
    .await?;
    if already_confirmed {
        return Err(RegisterError::AlreadyRegistered);
    }

    sqlx::query("DELETE FROM registrations WHERE LOWER(email) = LOWER($1) AND NOT confirmed")
        .bind(&input.email)
        .execute(&mut *tx)
        .await?;

    let ticket: Option<Ticket> = sqlx::query_as(
        "SELECT id, kind, name, description, perks, gradient_from, gradient_to, price, \
         created_by, sold_out, created_at FROM tickets WHERE id = $1",
    )
    .bind(input.ticket_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(ticket) = ticket else {
        return Err(RegisterError::UnknownTicket);
    };

    let registration: Registration = sqlx::query_as(
        "INSERT INTO registrations (id, first_name, last_name, email, phone, ticket_id, confirmed) \
         VALUES ($1, $2, $3, $4, $5, $6, TRUE) \
         RETURNING id, first_name, last_name, email, phone, ticket_id, transaction_id, \
                   confirmed, attendance_confirmed, attended, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(&input.first_name)
    .bind(&input.last_name)
    .bind(&input.email)
    .bind(&input.phone)
    .bind(ticket.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let ticket_url = issuance::issue(config, mailer, &registration, &ticket);
    Ok((registration, ticket_url))
}

fn transaction_description(registration: &Registration, ticket: &Ticket) -> String {
    format!(
        "{} ticket for {} {}",
        ticket.name, registration.first_name, registration.last_name
    )
}

async fn delete_registration(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM registrations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfirmError {
    #[error("payment was not approved: {status}")]
    NotApproved { status: String },

    #[error("no registration matches that transaction")]
    UnknownTransaction,

    #[error("could not look up the transaction")]
    Gateway(#[source] GatewayError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<ConfirmError> for AppError {
    fn from(e: ConfirmError) -> Self {
        match e {
            ConfirmError::NotApproved { status } => {
                AppError::Conflict(format!("Payment was not approved (status: {status})"))
            }
            ConfirmError::UnknownTransaction => {
                AppError::NotFound("No registration matches that transaction".to_string())
            }
            ConfirmError::Gateway(source) => AppError::Gateway(source.to_string()),
            ConfirmError::Database(source) => AppError::Database(source),
        }
    }
}

/// What the callback should do with the local row, decided solely from the
/// gateway's answer.
#[derive(Debug)]
enum Reconciliation {
    Confirm,
    Discard { status: String },
    LeaveUntouched(GatewayError),
}

async fn reconcile_transaction(
    gateway: &dyn PaymentGateway,
    transaction_id: &str,
) -> Reconciliation {
    match gateway.transaction_status(transaction_id).await {
        Ok(status) if status.is_approved() => Reconciliation::Confirm,
        Ok(status) => Reconciliation::Discard {
            status: status.describe(),
        },
        Err(e) => Reconciliation::LeaveUntouched(e),
    }
}

/// A discard only ever removes an unconfirmed row; a stale or replayed
/// callback for an already-confirmed registration must not destroy it.
const DISCARD_UNAPPROVED: &str =
    "DELETE FROM registrations WHERE transaction_id = $1 AND NOT confirmed";

/// Reconcile a payment attempt from the gateway's browser callback.
///
/// The status is always re-read from the gateway by transaction id; the
/// `status` query parameter the browser carries is untrusted. A lookup
/// failure leaves the row untouched: ambiguous external state must not
/// destroy local state.
pub async fn confirm_payment(
    pool: &PgPool,
    config: &Config,
    gateway: &dyn PaymentGateway,
    mailer: &Mailer,
    transaction_id: &str,
) -> Result<String, ConfirmError> {
    match reconcile_transaction(gateway, transaction_id).await {
        Reconciliation::Confirm => {}
        Reconciliation::Discard { status } => {
            sqlx::query(DISCARD_UNAPPROVED)
                .bind(transaction_id)
                .execute(pool)
                .await?;
            return Err(ConfirmError::NotApproved { status });
        }
        Reconciliation::LeaveUntouched(e) => return Err(ConfirmError::Gateway(e)),
    }

    let registration: Option<Registration> = sqlx::query_as(
        "UPDATE registrations SET confirmed = TRUE WHERE transaction_id = $1 \
         RETURNING id, first_name, last_name, email, phone, ticket_id, transaction_id, \
                   confirmed, attendance_confirmed, attended, created_at",
    )
    .bind(transaction_id)
    .fetch_optional(pool)
    .await?;
    let Some(registration) = registration else {
        return Err(ConfirmError::UnknownTransaction);
    };

    let ticket: Ticket = sqlx::query_as(
        "SELECT id, kind, name, description, perks, gradient_from, gradient_to, price, \
         created_by, sold_out, created_at FROM tickets WHERE id = $1",
    )
    .bind(registration.ticket_id)
    .fetch_one(pool)
    .await?;

    Ok(issuance::issue(config, mailer, &registration, &ticket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayEnvironment;
    use crate::payments::mock::ScriptedGateway;
    use crate::payments::TransactionStatus;

    fn input() -> RegistrationInput {
        RegistrationInput {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: "77 123 45 67".to_string(),
            country_code: "+221".to_string(),
            ticket_id: Uuid::new_v4().to_string(),
        }
    }

    #[test]
    fn valid_input_passes_and_joins_the_phone() {
        let valid = validate_input(&input()).unwrap();
        assert_eq!(valid.phone, "+221 77 123 45 67");
        assert_eq!(valid.email, "ada@example.com");
    }

    #[test]
    fn missing_names_are_field_errors() {
        let mut bad = input();
        bad.first_name = "  ".to_string();
        bad.last_name = String::new();
        let errors = validate_input(&bad).unwrap_err();
        let fields: Vec<_> = errors.fields.iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["first_name", "last_name"]);
    }

    #[test]
    fn bad_email_and_ticket_are_rejected_together() {
        let mut bad = input();
        bad.email = "not-an-email".to_string();
        bad.ticket_id = "not-a-uuid".to_string();
        let errors = validate_input(&bad).unwrap_err();
        let fields: Vec<_> = errors.fields.iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["email", "ticket_id"]);
    }

    #[test]
    fn country_codes_must_be_short_digit_runs() {
        assert!(country_code_is_valid("+221"));
        assert!(country_code_is_valid("1"));
        assert!(!country_code_is_valid(""));
        assert!(!country_code_is_valid("+12345"));
        assert!(!country_code_is_valid("+2a1"));
    }

    fn registration() -> Registration {
        let valid = validate_input(&input()).unwrap();
        Registration {
            id: Uuid::new_v4(),
            first_name: valid.first_name,
            last_name: valid.last_name,
            email: valid.email,
            phone: valid.phone,
            ticket_id: valid.ticket_id,
            transaction_id: None,
            confirmed: false,
            attendance_confirmed: false,
            attended: false,
            created_at: Utc::now(),
        }
    }

    fn ticket(price: i64) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            kind: "standard".to_string(),
            name: "Standard".to_string(),
            description: String::new(),
            perks: String::new(),
            gradient_from: String::new(),
            gradient_to: String::new(),
            price,
            created_by: Uuid::new_v4(),
            sold_out: false,
            created_at: Utc::now(),
        }
    }

    fn config() -> Config {
        Config {
            database_url: String::new(),
            base_url: "https://conf.example.com".to_string(),
            smtp_host: String::new(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            app_email: String::new(),
            support_email: String::new(),
            gateway_base_url: String::new(),
            gateway_api_key: String::new(),
            gateway_environment: GatewayEnvironment::Sandbox,
            allowed_emails: Vec::new(),
            cookie_secret: String::new(),
        }
    }

    #[test]
    fn description_names_the_ticket_and_attendee() {
        let registration = registration();
        assert_eq!(
            transaction_description(&registration, &ticket(5000)),
            "Standard ticket for Ada Lovelace"
        );
    }

    #[test]
    fn free_tickets_confirm_immediately_and_paid_tickets_wait() {
        assert_eq!(payment_plan(&ticket(0)), PaymentPlan::ConfirmNow);
        assert_eq!(payment_plan(&ticket(5000)), PaymentPlan::AwaitPayment);
    }

    #[test]
    fn transaction_request_carries_the_single_currency_and_callback() {
        let registration = registration();
        let request = build_transaction_request(&config(), &registration, &ticket(5000));
        assert_eq!(request.currency, "XOF");
        assert_eq!(request.amount, 5000);
        assert_eq!(
            request.callback_url,
            "https://conf.example.com/payments/callback"
        );
        assert_eq!(request.customer.email, registration.email);
    }

    #[tokio::test]
    async fn successful_setup_yields_the_redirect_and_sends_one_request() {
        let gateway = ScriptedGateway::new().script_create(Ok(PaymentRedirect {
            transaction_id: "tx-1".to_string(),
            redirect_url: "https://pay.example.com/tx-1".to_string(),
        }));
        let request = build_transaction_request(&config(), &registration(), &ticket(5000));

        let setup = request_payment_redirect(&gateway, &request).await;
        let PaymentSetup::Ready(redirect) = setup else {
            panic!("expected a ready redirect, got {setup:?}");
        };
        assert_eq!(redirect.transaction_id, "tx-1");
        assert_eq!(redirect.redirect_url, "https://pay.example.com/tx-1");

        let sent = gateway.create_calls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].currency, "XOF");
        assert_eq!(sent[0].amount, 5000);
    }

    #[tokio::test]
    async fn failed_setup_is_reported_so_the_row_gets_removed() {
        let gateway = ScriptedGateway::new().script_create(Err(GatewayError::Remote {
            status: 503,
            body: "unavailable".to_string(),
        }));
        let request = build_transaction_request(&config(), &registration(), &ticket(5000));

        let setup = request_payment_redirect(&gateway, &request).await;
        assert!(matches!(setup, PaymentSetup::Failed(_)));
    }

    #[tokio::test]
    async fn approved_status_confirms_the_registration() {
        let gateway = ScriptedGateway::new().script_status(Ok(TransactionStatus::Approved));
        let decision = reconcile_transaction(&gateway, "tx-1").await;
        assert!(matches!(decision, Reconciliation::Confirm));
        assert_eq!(gateway.status_calls(), vec!["tx-1".to_string()]);
    }

    #[tokio::test]
    async fn declined_status_discards_the_attempt_with_its_reason() {
        let gateway = ScriptedGateway::new()
            .script_status(Ok(TransactionStatus::Other("declined".to_string())));
        let decision = reconcile_transaction(&gateway, "tx-1").await;
        let Reconciliation::Discard { status } = decision else {
            panic!("expected a discard, got {decision:?}");
        };
        assert_eq!(status, "declined");
    }

    #[tokio::test]
    async fn pending_status_counts_as_non_approval() {
        let gateway = ScriptedGateway::new().script_status(Ok(TransactionStatus::Pending));
        let decision = reconcile_transaction(&gateway, "tx-1").await;
        assert!(matches!(decision, Reconciliation::Discard { .. }));
    }

    #[tokio::test]
    async fn lookup_failure_never_touches_the_row() {
        let gateway = ScriptedGateway::new().script_status(Err(GatewayError::Remote {
            status: 500,
            body: "boom".to_string(),
        }));
        let decision = reconcile_transaction(&gateway, "tx-1").await;
        assert!(matches!(decision, Reconciliation::LeaveUntouched(_)));
    }

    #[test]
    fn discarding_spares_confirmed_registrations() {
        assert!(DISCARD_UNAPPROVED.contains("NOT confirmed"));
    }
}
