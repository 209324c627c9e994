//! User domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered user
///
/// Identity is immutable once created. The credential hash is an Argon2id
/// PHC string; the ledger never sees plaintext passwords except at
/// registration and verification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// PHC-format Argon2id hash, never the plaintext
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new user with an already-computed credential hash
    pub fn new(id: Uuid, username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            password_hash: password_hash.into(),
            created_at: Utc::now(),
        }
    }

    /// Validate user data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty");
        }
        if self.password_hash.is_empty() {
            return Err("credential hash cannot be empty");
        }
        Ok(())
    }
}

/// Public view of a user: id and username only, never the credential hash.
/// Returned by directory listings so clients can pick a transfer recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_validation() {
        let mut user = User::new(Uuid::new_v4(), "alice", "$argon2id$stub");
        assert!(user.validate().is_ok());

        user.username = "   ".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_summary_never_serializes_credential() {
        let user = User::new(Uuid::new_v4(), "alice", "$argon2id$stub");
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
    }
}
