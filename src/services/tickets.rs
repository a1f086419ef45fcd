use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Ticket, User};
use crate::utils::error::AppError;
use crate::utils::validate::ValidationErrors;

#[derive(Debug, Deserialize)]
pub struct TicketInput {
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub perks: String,
    #[serde(default)]
    pub gradient_from: String,
    #[serde(default)]
    pub gradient_to: String,
    pub price: i64,
    #[serde(default)]
    pub sold_out: bool,
}

pub fn validate_ticket(input: &TicketInput) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if input.kind.trim().is_empty() {
        errors.push("kind", "Ticket kind is required");
    }
    if input.name.trim().is_empty() {
        errors.push("name", "Ticket name is required");
    }
    if input.price < 0 {
        errors.push("price", "Price cannot be negative");
    }

    errors.into_result()
}

const TICKET_COLUMNS: &str = "id, kind, name, description, perks, gradient_from, gradient_to, \
                              price, created_by, sold_out, created_at";

/// Public catalog, cheapest first, for the registration form.
pub async fn list_tickets(pool: &PgPool) -> Result<Vec<Ticket>, AppError> {
    let tickets = sqlx::query_as(&format!(
        "SELECT {TICKET_COLUMNS} FROM tickets ORDER BY price ASC, created_at ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(tickets)
}

pub async fn get_ticket(pool: &PgPool, id: Uuid) -> Result<Ticket, AppError> {
    let ticket: Option<Ticket> =
        sqlx::query_as(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    ticket.ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
}

pub async fn create_ticket(
    pool: &PgPool,
    admin: &User,
    input: TicketInput,
) -> Result<Ticket, AppError> {
    validate_ticket(&input).map_err(AppError::Validation)?;

    let ticket = sqlx::query_as(&format!(
        "INSERT INTO tickets (id, kind, name, description, perks, gradient_from, gradient_to, \
                              price, created_by, sold_out) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {TICKET_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.kind.trim())
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(&input.perks)
    .bind(&input.gradient_from)
    .bind(&input.gradient_to)
    .bind(input.price)
    .bind(admin.id)
    .bind(input.sold_out)
    .fetch_one(pool)
    .await?;

    Ok(ticket)
}

/// Edits show through to existing registrations since they reference the
/// ticket rather than snapshotting it.
pub async fn update_ticket(
    pool: &PgPool,
    id: Uuid,
    input: TicketInput,
) -> Result<Ticket, AppError> {
    validate_ticket(&input).map_err(AppError::Validation)?;

    let ticket: Option<Ticket> = sqlx::query_as(&format!(
        "UPDATE tickets SET kind = $1, name = $2, description = $3, perks = $4, \
                            gradient_from = $5, gradient_to = $6, price = $7, sold_out = $8 \
         WHERE id = $9 RETURNING {TICKET_COLUMNS}"
    ))
    .bind(input.kind.trim())
    .bind(input.name.trim())
    .bind(&input.description)
    .bind(&input.perks)
    .bind(&input.gradient_from)
    .bind(&input.gradient_to)
    .bind(input.price)
    .bind(input.sold_out)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    ticket.ok_or_else(|| AppError::NotFound("Ticket not found".to_string()))
}

/// Deleting a ticket cascades onto its registrations.
pub async fn delete_ticket(pool: &PgPool, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Ticket not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(price: i64) -> TicketInput {
        TicketInput {
            kind: "standard".to_string(),
            name: "Standard".to_string(),
            description: String::new(),
            perks: "Lunch;Swag".to_string(),
            gradient_from: "#1d4ed8".to_string(),
            gradient_to: "#9333ea".to_string(),
            price,
            sold_out: false,
        }
    }

    #[test]
    fn free_tickets_are_valid() {
        assert!(validate_ticket(&input(0)).is_ok());
    }

    #[test]
    fn negative_prices_are_rejected() {
        let errors = validate_ticket(&input(-1)).unwrap_err();
        assert_eq!(errors.fields[0].field, "price");
    }

    #[test]
    fn blank_name_and_kind_are_rejected() {
        let mut bad = input(1000);
        bad.kind = String::new();
        bad.name = "  ".to_string();
        let errors = validate_ticket(&bad).unwrap_err();
        let fields: Vec<_> = errors.fields.iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["kind", "name"]);
    }
}
