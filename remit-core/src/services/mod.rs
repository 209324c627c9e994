//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and repository access. Each service
//! focuses on a specific use case or feature area.

mod account;
mod directory;
pub mod migration;
mod transfer;

pub use account::AccountService;
pub use directory::DirectoryService;
pub use migration::{MigrationResult, MigrationService};
pub use transfer::TransferService;
