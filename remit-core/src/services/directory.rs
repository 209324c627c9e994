//! Directory service - user registration and lookup
//!
//! The server side of the registration collaborator: creating a user also
//! seeds their account, atomically. Credentials are hashed with Argon2id;
//! token/session handling lives outside this crate.

use std::sync::Arc;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use log::info;
use rand::rngs::OsRng;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, User, UserSummary};

/// User registration and directory lookups
pub struct DirectoryService {
    repository: Arc<DuckDbRepository>,
    starting_balance: Decimal,
}

impl DirectoryService {
    pub fn new(repository: Arc<DuckDbRepository>, starting_balance: Decimal) -> Self {
        Self {
            repository,
            starting_balance,
        }
    }

    /// Register a new user and seed their account with the starting balance
    ///
    /// User row and account row are inserted in one transaction: a user
    /// never exists without an account.
    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }
        if password.is_empty() {
            return Err(Error::validation("password cannot be empty"));
        }

        let password_hash = hash_password(password)?;
        let user = User::new(Uuid::new_v4(), username, password_hash);
        let account = Account::new(Uuid::new_v4(), user.id, self.starting_balance);

        self.repository.create_user_with_account(&user, &account)?;
        info!("registered user {}", username);
        Ok(user)
    }

    /// Case-insensitive username lookup
    pub fn find_by_username(&self, username: &str) -> Result<User> {
        self.repository
            .find_user_by_username(username)?
            .ok_or_else(|| Error::not_found(format!("user {} was not found", username)))
    }

    /// All registered users, for recipient selection. Never exposes
    /// credential hashes.
    pub fn list_users(&self) -> Result<Vec<UserSummary>> {
        self.repository.list_users()
    }

    /// Check a password against the stored hash
    ///
    /// A building block for the identity collaborator; an unknown user is
    /// an error, a wrong password is `Ok(false)`.
    pub fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let user = self.find_by_username(username)?;
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| Error::Credential(format!("stored hash is malformed: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Hash a password to an Argon2id PHC string
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::Credential(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}
