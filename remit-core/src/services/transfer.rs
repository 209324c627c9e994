//! Transfer service - the transfer engine and history query
//!
//! A transfer validates against current state, then atomically debits the
//! sender, credits the recipient, and appends one ledger entry. Concurrent
//! transfers over the same accounts are serialized by per-account locks;
//! transfers over disjoint account pairs do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Transfer, TransferView};

/// Transfer engine and history query
pub struct TransferService {
    repository: Arc<DuckDbRepository>,
    /// One lock per account ever touched by a transfer. Acquired in
    /// ascending account-id order so two opposite-direction transfers
    /// between the same pair cannot deadlock.
    account_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TransferService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self {
            repository,
            account_locks: Mutex::new(HashMap::new()),
        }
    }

    fn account_lock(&self, account_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.account_locks.lock().unwrap();
        Arc::clone(locks.entry(account_id).or_default())
    }

    /// Send funds from the caller's account to another account
    ///
    /// Validation order (fail fast, no partial effects):
    /// 1. amount must be positive with at most two decimal places
    /// 2. the sender must have an account
    /// 3. the recipient account must exist and differ from the sender's
    /// 4. the sender's balance must cover the amount
    ///
    /// Only then are the debit, the credit, and the ledger insertion
    /// executed, as a single database transaction. Returns the sender's
    /// post-transfer balance. Failures are terminal for this call; the
    /// engine never retries a money movement on its own.
    pub fn transfer(
        &self,
        sender_username: &str,
        recipient_account: Uuid,
        amount: Decimal,
    ) -> Result<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation("transfer amount must be positive"));
        }
        if amount.normalize().scale() > 2 {
            return Err(Error::validation(
                "transfer amount must have at most two decimal places",
            ));
        }

        let sender_account_id = self
            .repository
            .get_account_by_username(sender_username)?
            .ok_or_else(|| Error::not_found(format!("no account for user {}", sender_username)))?
            .id;

        // Reject self-transfers before taking locks: the two lock handles
        // below must refer to distinct accounts.
        if recipient_account == sender_account_id {
            return Err(Error::invalid_recipient(
                "cannot transfer to your own account",
            ));
        }

        // Lock both accounts in ascending id order, then re-read state
        // under the locks. This closes the read-then-write race between
        // two transfers touching the same account.
        let (first, second) = if sender_account_id < recipient_account {
            (sender_account_id, recipient_account)
        } else {
            (recipient_account, sender_account_id)
        };
        let first_lock = self.account_lock(first);
        let second_lock = self.account_lock(second);
        let _first_guard = first_lock.lock().unwrap();
        let _second_guard = second_lock.lock().unwrap();

        let sender = self
            .repository
            .get_account_by_id(sender_account_id)?
            .ok_or_else(|| Error::not_found(format!("no account for user {}", sender_username)))?;
        let recipient = self
            .repository
            .get_account_by_id(recipient_account)?
            .ok_or_else(|| {
                Error::invalid_recipient(format!("account {} does not exist", recipient_account))
            })?;

        if sender.balance < amount {
            debug!(
                "rejecting transfer from {}: balance {} below requested {}",
                sender_username, sender.balance, amount
            );
            return Err(Error::InsufficientFunds {
                available: sender.balance,
                requested: amount,
            });
        }

        let transfer = Transfer::send(sender.id, recipient.id, amount);
        let new_balance = self.repository.execute_transfer(&transfer)?;
        info!(
            "sent {} from {} to account {}",
            amount, sender_username, recipient_account
        );
        Ok(new_balance)
    }

    /// Every transfer where the caller's account is sender or recipient,
    /// with display labels and counterpart usernames. Ordered by insertion
    /// time. Read-only.
    pub fn history(&self, username: &str) -> Result<Vec<TransferView>> {
        let account = self
            .repository
            .get_account_by_username(username)?
            .ok_or_else(|| Error::not_found(format!("no account for user {}", username)))?;
        self.repository.transfers_for_account(account.id)
    }
}
