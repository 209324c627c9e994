//! Remit Core - Account ledger and transfer engine
//!
//! This crate implements the core ledger logic for peer-to-peer payments:
//!
//! - **domain**: Core business entities (User, Account, Transfer)
//! - **services**: Business logic orchestration (transfers, accounts, directory)
//! - **adapters**: Concrete persistence (DuckDB)
//!
//! Identity verification, transport, and presentation are external
//! collaborators: callers pass an already-verified username into every
//! operation, and nothing here speaks a wire protocol.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::{AccountService, DirectoryService, TransferService};

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result as LedgerResult};
pub use domain::{Account, Transfer, TransferStatus, TransferType, TransferView, User, UserSummary};

/// Main context for Remit operations
///
/// This is the primary entry point for all business logic. It holds the
/// database connection and all services.
pub struct RemitContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub account_service: AccountService,
    pub transfer_service: TransferService,
    pub directory_service: DirectoryService,
}

impl RemitContext {
    /// Create a new Remit context rooted at the given data directory
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let db_path = data_dir.join(&config.db_filename);
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);
        repository.ensure_schema()?;

        let account_service = AccountService::new(Arc::clone(&repository));
        let transfer_service = TransferService::new(Arc::clone(&repository));
        let directory_service =
            DirectoryService::new(Arc::clone(&repository), config.starting_balance);

        Ok(Self {
            config,
            repository,
            account_service,
            transfer_service,
            directory_service,
        })
    }
}
