//! Transfer domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of transfer
///
/// Only `Send` is produced by the engine today. `Request` exists so the
/// schema's lookup table matches a future request/approve workflow; nothing
/// creates one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Request,
    Send,
}

impl TransferType {
    /// Numeric code used in the transfers table.
    /// The mapping lives only at the persistence edge; business logic
    /// never sees these numbers.
    pub fn storage_code(self) -> i32 {
        match self {
            TransferType::Request => 1,
            TransferType::Send => 2,
        }
    }

    pub fn from_storage_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TransferType::Request),
            2 => Some(TransferType::Send),
            _ => None,
        }
    }

    /// Human-readable label, matching the seeded lookup table
    pub fn label(self) -> &'static str {
        match self {
            TransferType::Request => "Request",
            TransferType::Send => "Send",
        }
    }
}

/// Lifecycle status of a transfer
///
/// The engine only ever produces `Approved`: a send is effective
/// immediately or not at all. `Pending` and `Rejected` are reserved for
/// the request/approve workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransferStatus {
    pub fn storage_code(self) -> i32 {
        match self {
            TransferStatus::Pending => 1,
            TransferStatus::Approved => 2,
            TransferStatus::Rejected => 3,
        }
    }

    pub fn from_storage_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TransferStatus::Pending),
            2 => Some(TransferStatus::Approved),
            3 => Some(TransferStatus::Rejected),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransferStatus::Pending => "Pending",
            TransferStatus::Approved => "Approved",
            TransferStatus::Rejected => "Rejected",
        }
    }
}

/// One atomic movement of funds between two accounts
///
/// Immutable once recorded: transfers are only ever inserted, never updated
/// or deleted. The ledger of transfers is the source of truth for balance
/// reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    pub transfer_type: TransferType,
    pub status: TransferStatus,
    pub from_account: Uuid,
    pub to_account: Uuid,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// Create an immediately-effective send between two accounts
    pub fn send(from_account: Uuid, to_account: Uuid, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            transfer_type: TransferType::Send,
            status: TransferStatus::Approved,
            from_account,
            to_account,
            amount,
            created_at: Utc::now(),
        }
    }

    /// Validate transfer data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.amount <= Decimal::ZERO {
            return Err("transfer amount must be positive");
        }
        if self.amount.normalize().scale() > 2 {
            return Err("transfer amount must have at most two decimal places");
        }
        if self.from_account == self.to_account {
            return Err("transfer cannot go to the sending account");
        }
        Ok(())
    }
}

/// A transfer joined with display metadata for history output:
/// type/status labels and the usernames on each side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferView {
    pub id: Uuid,
    pub transfer_type: TransferType,
    pub type_label: String,
    pub status: TransferStatus,
    pub status_label: String,
    pub from_account: Uuid,
    pub from_username: String,
    pub to_account: Uuid,
    pub to_username: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}
