//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The balance-holding record owned by exactly one user
///
/// Created atomically with its owner at registration, seeded with the
/// configured starting balance. The balance is a two-decimal fixed-precision
/// amount and is never negative; it is mutated only inside the transfer
/// engine's transaction, never through a standalone setter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new account seeded with a starting balance
    pub fn new(id: Uuid, user_id: Uuid, starting_balance: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            balance: starting_balance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.balance.is_sign_negative() {
            return Err("balance cannot be negative");
        }
        if self.balance.normalize().scale() > 2 {
            return Err("balance must have at most two decimal places");
        }
        Ok(())
    }
}
