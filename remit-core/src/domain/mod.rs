//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod transfer;
mod user;
pub mod result;

pub use account::Account;
pub use transfer::{Transfer, TransferStatus, TransferType, TransferView};
pub use user::{User, UserSummary};
