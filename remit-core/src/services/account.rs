//! Account service - balance lookups and account provisioning

use std::sync::Arc;

use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::Account;

/// Read access to account state plus the one-time provisioning hook.
///
/// There is deliberately no public "set balance" or "adjust balance"
/// operation: balances change only inside the transfer engine's
/// transaction.
pub struct AccountService {
    repository: Arc<DuckDbRepository>,
}

impl AccountService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Current balance for the caller's own account
    pub fn balance(&self, username: &str) -> Result<Decimal> {
        let account = self
            .repository
            .get_account_by_username(username)?
            .ok_or_else(|| Error::not_found(format!("no account for user {}", username)))?;
        Ok(account.balance)
    }

    /// Resolve a user identity to their account handle
    pub fn account_id(&self, username: &str) -> Result<Uuid> {
        let account = self
            .repository
            .get_account_by_username(username)?
            .ok_or_else(|| Error::not_found(format!("no account for user {}", username)))?;
        Ok(account.id)
    }

    /// Provision an account for a newly created user
    ///
    /// Invoked once per user at registration time by the registration
    /// collaborator. Rejects a negative or sub-cent starting balance.
    pub fn open_account(&self, user_id: Uuid, starting_balance: Decimal) -> Result<Account> {
        let account = Account::new(Uuid::new_v4(), user_id, starting_balance);
        account.validate().map_err(Error::validation)?;
        self.repository.insert_account(&account)?;
        debug!(
            "opened account {} for user {} with balance {}",
            account.id, user_id, starting_balance
        );
        Ok(account)
    }
}
