use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Admin-managed catalog ticket. Prices are integer XOF; the currency has no
/// subdivision. Registrations reference a ticket by id, they do not snapshot
/// it, so admin edits show through.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Ticket {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub description: String,
    pub perks: String,
    pub gradient_from: String,
    pub gradient_to: String,
    pub price: i64,
    pub created_by: Uuid,
    pub sold_out: bool,
    pub created_at: DateTime<Utc>,
}

impl Ticket {
    pub fn is_free(&self) -> bool {
        self.price == 0
    }

    /// Perks are stored as a single `;`-delimited text column.
    pub fn perk_list(&self) -> Vec<&str> {
        self.perks
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(price: i64, perks: &str) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            kind: "standard".to_string(),
            name: "Standard".to_string(),
            description: String::new(),
            perks: perks.to_string(),
            gradient_from: "#1d4ed8".to_string(),
            gradient_to: "#9333ea".to_string(),
            price,
            created_by: Uuid::new_v4(),
            sold_out: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn zero_price_is_free() {
        assert!(ticket(0, "").is_free());
        assert!(!ticket(5000, "").is_free());
    }

    #[test]
    fn perk_list_splits_and_trims() {
        let t = ticket(0, "Lunch; Swag ;;T-shirt");
        assert_eq!(t.perk_list(), vec!["Lunch", "Swag", "T-shirt"]);
    }
}
