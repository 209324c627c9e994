//! DuckDB repository implementation
//!
//! All persistence goes through this adapter. The transfer engine's
//! debit-credit-record sequence is executed here as a single database
//! transaction; nothing else in the crate mutates balances.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use duckdb::{params, Connection};
use log::{debug, warn};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Transfer, TransferStatus, TransferType, TransferView, User, UserSummary};
use crate::services::MigrationService;

/// Maximum number of retries when the database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// Parse a DECIMAL column read back as VARCHAR
fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim())
        .map_err(|_| Error::validation(format!("invalid decimal value from storage: {}", s)))
}

/// Parse a TIMESTAMP column read back as VARCHAR
fn parse_timestamp(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Format a timestamp for storage (naive UTC, unambiguous for DuckDB)
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| Error::validation(format!("invalid id from storage: {}", s)))
}

/// Map a duckdb error on user insertion to something a caller can act on
fn map_user_insert_error(e: duckdb::Error, username: &str) -> Error {
    if e.to_string().to_lowercase().contains("duplicate key") {
        Error::validation(format!("username already taken: {}", username))
    } else {
        Error::Storage(e)
    }
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
}

impl DuckDbRepository {
    /// Create a new DuckDB repository
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when multiple processes open the same database file
    /// at startup.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Connection::open(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            "database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(Error::Storage(e));
                }
            }
        }

        Err(last_error
            .map(Error::Storage)
            .unwrap_or_else(|| Error::validation("failed to open database")))
    }

    #[cfg(test)]
    fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let migration_service = MigrationService::new(&conn);
        migration_service
            .run_pending()
            .map_err(|e| Error::validation(format!("migration failed: {}", e)))?;
        Ok(())
    }

    // === User operations ===

    /// Insert a user and their seeded account as one atomic unit
    ///
    /// Registration is all-or-nothing: a user row never exists without its
    /// account row.
    pub fn create_user_with_account(&self, user: &User, account: &Account) -> Result<()> {
        user.validate().map_err(Error::validation)?;
        account.validate().map_err(Error::validation)?;

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO users (user_id, username, password_hash, created_at)
             VALUES (?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                format_timestamp(user.created_at),
            ],
        )
        .map_err(|e| map_user_insert_error(e, &user.username))?;

        tx.execute(
            "INSERT INTO accounts (account_id, user_id, balance, created_at, updated_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18,2)), ?, ?)",
            params![
                account.id.to_string(),
                account.user_id.to_string(),
                account.balance.to_string(),
                format_timestamp(account.created_at),
                format_timestamp(account.updated_at),
            ],
        )?;

        tx.commit()?;
        debug!("registered user {} with account {}", user.username, account.id);
        Ok(())
    }

    /// Look up a user by username, case-insensitively
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT user_id, username, password_hash, created_at::VARCHAR
             FROM users WHERE lower(username) = lower(?)",
        )?;

        let row = stmt
            .query_row([username], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .ok();

        match row {
            Some((id, username, password_hash, created)) => Ok(Some(User {
                id: parse_uuid(&id)?,
                username,
                password_hash,
                created_at: parse_timestamp(&created),
            })),
            None => Ok(None),
        }
    }

    /// All registered users, id and username only
    pub fn list_users(&self) -> Result<Vec<UserSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT user_id, username FROM users ORDER BY username")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, username)| {
                Ok(UserSummary {
                    id: parse_uuid(&id)?,
                    username,
                })
            })
            .collect()
    }

    // === Account operations ===

    /// Insert a standalone account (the registration collaborator's hook)
    pub fn insert_account(&self, account: &Account) -> Result<()> {
        account.validate().map_err(Error::validation)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO accounts (account_id, user_id, balance, created_at, updated_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18,2)), ?, ?)",
            params![
                account.id.to_string(),
                account.user_id.to_string(),
                account.balance.to_string(),
                format_timestamp(account.created_at),
                format_timestamp(account.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT account_id, user_id, balance::VARCHAR, created_at::VARCHAR, updated_at::VARCHAR
             FROM accounts WHERE account_id = ?",
        )?;
        let row = stmt.query_row([id.to_string()], row_to_raw_account).ok();
        row.map(raw_to_account).transpose()
    }

    /// Resolve a username to their account (one account per user)
    pub fn get_account_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT a.account_id, a.user_id, a.balance::VARCHAR,
                    a.created_at::VARCHAR, a.updated_at::VARCHAR
             FROM accounts a
             JOIN users u ON a.user_id = u.user_id
             WHERE lower(u.username) = lower(?)",
        )?;
        let row = stmt.query_row([username], row_to_raw_account).ok();
        row.map(raw_to_account).transpose()
    }

    /// Sum of all account balances (conservation checks)
    pub fn total_balance(&self) -> Result<Decimal> {
        let conn = self.conn.lock().unwrap();
        let total: String = conn.query_row(
            "SELECT COALESCE(SUM(balance), 0)::VARCHAR FROM accounts",
            [],
            |row| row.get(0),
        )?;
        parse_decimal(&total)
    }

    // === Transfer operations ===

    /// Execute a transfer as one atomic transaction: append the ledger row,
    /// debit the sender, credit the recipient. Commit only if all three
    /// succeed; any failure rolls back the lot.
    ///
    /// Returns the sender's post-transfer balance, read inside the same
    /// transaction.
    ///
    /// The accounts CHECK (balance >= 0) aborts the transaction on
    /// overdraft even if the caller skipped its own funds check, and a
    /// zero-row update means the account vanished, which likewise rolls
    /// everything back. Dropping the transaction without commit is the
    /// rollback.
    pub fn execute_transfer(&self, transfer: &Transfer) -> Result<Decimal> {
        transfer.validate().map_err(Error::validation)?;

        let amount = transfer.amount.to_string();
        let from = transfer.from_account.to_string();
        let to = transfer.to_account.to_string();
        let now = format_timestamp(Utc::now());

        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO transfers (transfer_id, transfer_type_id, transfer_status_id,
                                    account_from, account_to, amount, created_at)
             VALUES (?, ?, ?, ?, ?, CAST(? AS DECIMAL(18,2)), ?)",
            params![
                transfer.id.to_string(),
                transfer.transfer_type.storage_code(),
                transfer.status.storage_code(),
                from,
                to,
                amount,
                format_timestamp(transfer.created_at),
            ],
        )?;

        let debited = tx.execute(
            "UPDATE accounts
             SET balance = balance - CAST(? AS DECIMAL(18,2)), updated_at = ?
             WHERE account_id = ?",
            params![amount, now, from],
        )?;
        if debited == 0 {
            return Err(Error::not_found(format!(
                "sender account {} does not exist",
                transfer.from_account
            )));
        }

        let credited = tx.execute(
            "UPDATE accounts
             SET balance = balance + CAST(? AS DECIMAL(18,2)), updated_at = ?
             WHERE account_id = ?",
            params![amount, now, to],
        )?;
        if credited == 0 {
            return Err(Error::invalid_recipient(format!(
                "recipient account {} does not exist",
                transfer.to_account
            )));
        }

        let new_balance: String = tx.query_row(
            "SELECT balance::VARCHAR FROM accounts WHERE account_id = ?",
            [from],
            |row| row.get(0),
        )?;

        tx.commit()?;
        debug!(
            "transfer {} committed: {} from {} to {}",
            transfer.id, transfer.amount, transfer.from_account, transfer.to_account
        );
        parse_decimal(&new_balance)
    }

    /// Every transfer touching the given account, joined with type/status
    /// labels and the usernames on each side. Ordered by insertion time
    /// (creation timestamp, then id as a tiebreaker).
    pub fn transfers_for_account(&self, account_id: Uuid) -> Result<Vec<TransferView>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT t.transfer_id, t.transfer_type_id, tt.transfer_type_desc,
                    t.transfer_status_id, ts.transfer_status_desc,
                    t.account_from, u_from.username,
                    t.account_to, u_to.username,
                    t.amount::VARCHAR, t.created_at::VARCHAR
             FROM transfers t
             JOIN transfer_types tt ON t.transfer_type_id = tt.transfer_type_id
             JOIN transfer_statuses ts ON t.transfer_status_id = ts.transfer_status_id
             JOIN accounts a_from ON t.account_from = a_from.account_id
             JOIN users u_from ON a_from.user_id = u_from.user_id
             JOIN accounts a_to ON t.account_to = a_to.account_id
             JOIN users u_to ON a_to.user_id = u_to.user_id
             WHERE t.account_from = ? OR t.account_to = ?
             ORDER BY t.created_at, t.transfer_id",
        )?;

        let id_str = account_id.to_string();
        let rows = stmt
            .query_map([&id_str, &id_str], |row| {
                Ok(RawTransferView {
                    id: row.get(0)?,
                    type_code: row.get(1)?,
                    type_label: row.get(2)?,
                    status_code: row.get(3)?,
                    status_label: row.get(4)?,
                    from_account: row.get(5)?,
                    from_username: row.get(6)?,
                    to_account: row.get(7)?,
                    to_username: row.get(8)?,
                    amount: row.get(9)?,
                    created_at: row.get(10)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(raw_to_transfer_view).collect()
    }
}

type RawAccount = (String, String, String, String, String);

fn row_to_raw_account(row: &duckdb::Row) -> duckdb::Result<RawAccount> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn raw_to_account(raw: RawAccount) -> Result<Account> {
    let (id, user_id, balance, created, updated) = raw;
    Ok(Account {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        balance: parse_decimal(&balance)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}

struct RawTransferView {
    id: String,
    type_code: i32,
    type_label: String,
    status_code: i32,
    status_label: String,
    from_account: String,
    from_username: String,
    to_account: String,
    to_username: String,
    amount: String,
    created_at: String,
}

fn raw_to_transfer_view(raw: RawTransferView) -> Result<TransferView> {
    let transfer_type = TransferType::from_storage_code(raw.type_code)
        .ok_or_else(|| Error::validation(format!("unknown transfer type code {}", raw.type_code)))?;
    let status = TransferStatus::from_storage_code(raw.status_code).ok_or_else(|| {
        Error::validation(format!("unknown transfer status code {}", raw.status_code))
    })?;

    Ok(TransferView {
        id: parse_uuid(&raw.id)?,
        transfer_type,
        type_label: raw.type_label,
        status,
        status_label: raw.status_label,
        from_account: parse_uuid(&raw.from_account)?,
        from_username: raw.from_username,
        to_account: parse_uuid(&raw.to_account)?,
        to_username: raw.to_username,
        amount: parse_decimal(&raw.amount)?,
        created_at: parse_timestamp(&raw.created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_repo() -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn seed_user(repo: &DuckDbRepository, username: &str, balance: Decimal) -> Account {
        let user = User::new(Uuid::new_v4(), username, "$argon2id$stub");
        let account = Account::new(Uuid::new_v4(), user.id, balance);
        repo.create_user_with_account(&user, &account).unwrap();
        account
    }

    #[test]
    fn test_registration_is_atomic_on_duplicate_username() {
        let repo = test_repo();
        seed_user(&repo, "alice", dec!(1000.00));

        let dup = User::new(Uuid::new_v4(), "alice", "$argon2id$stub");
        let account = Account::new(Uuid::new_v4(), dup.id, dec!(1000.00));
        let err = repo.create_user_with_account(&dup, &account).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got: {err}");

        // The duplicate's account row must not exist either
        assert!(repo.get_account_by_id(account.id).unwrap().is_none());
        assert_eq!(repo.total_balance().unwrap(), dec!(1000.00));
    }

    #[test]
    fn test_execute_transfer_moves_funds_and_records() {
        let repo = test_repo();
        let alice = seed_user(&repo, "alice", dec!(1000.00));
        let bob = seed_user(&repo, "bob", dec!(1000.00));

        let transfer = Transfer::send(alice.id, bob.id, dec!(250.00));
        let new_balance = repo.execute_transfer(&transfer).unwrap();
        assert_eq!(new_balance, dec!(750.00));

        let bob_account = repo.get_account_by_id(bob.id).unwrap().unwrap();
        assert_eq!(bob_account.balance, dec!(1250.00));

        let history = repo.transfers_for_account(alice.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].type_label, "Send");
        assert_eq!(history[0].status_label, "Approved");
        assert_eq!(history[0].from_username, "alice");
        assert_eq!(history[0].to_username, "bob");
    }

    #[test]
    fn test_overdraft_rolls_back_everything() {
        // Bypass the engine's funds check on purpose: the schema CHECK must
        // abort the transaction, leaving no ledger row and both balances
        // untouched.
        let repo = test_repo();
        let alice = seed_user(&repo, "alice", dec!(100.00));
        let bob = seed_user(&repo, "bob", dec!(100.00));

        let transfer = Transfer::send(alice.id, bob.id, dec!(500.00));
        let err = repo.execute_transfer(&transfer).unwrap_err();
        assert!(matches!(err, Error::Storage(_)), "got: {err}");

        assert_eq!(
            repo.get_account_by_id(alice.id).unwrap().unwrap().balance,
            dec!(100.00)
        );
        assert_eq!(
            repo.get_account_by_id(bob.id).unwrap().unwrap().balance,
            dec!(100.00)
        );
        assert!(repo.transfers_for_account(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_missing_recipient_rolls_back_debit() {
        let repo = test_repo();
        let alice = seed_user(&repo, "alice", dec!(1000.00));

        let transfer = Transfer::send(alice.id, Uuid::new_v4(), dec!(50.00));
        let err = repo.execute_transfer(&transfer).unwrap_err();
        assert!(matches!(err, Error::InvalidRecipient(_)), "got: {err}");

        // Debit happened before the zero-row credit; rollback must undo it
        assert_eq!(
            repo.get_account_by_id(alice.id).unwrap().unwrap().balance,
            dec!(1000.00)
        );
        assert!(repo.transfers_for_account(alice.id).unwrap().is_empty());
    }

    #[test]
    fn test_case_insensitive_username_lookup() {
        let repo = test_repo();
        let account = seed_user(&repo, "Alice", dec!(1000.00));

        let found = repo.get_account_by_username("alice").unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(repo.find_user_by_username("ALICE").unwrap().is_some());
        assert!(repo.find_user_by_username("mallory").unwrap().is_none());
    }

    #[test]
    fn test_list_users_sorted_without_credentials() {
        let repo = test_repo();
        seed_user(&repo, "bob", dec!(1000.00));
        seed_user(&repo, "alice", dec!(1000.00));

        let users = repo.list_users().unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
