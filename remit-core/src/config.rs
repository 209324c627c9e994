//! Configuration management
//!
//! Settings live in a settings.json next to the database file:
//! ```json
//! {
//!   "ledger": { "startingBalance": "1000.00", "dbFilename": "remit.duckdb" }
//! }
//! ```
//! Missing file or missing keys fall back to defaults.

use std::path::Path;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default = "default_starting_balance")]
    starting_balance: Decimal,
    #[serde(default = "default_db_filename")]
    db_filename: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            db_filename: default_db_filename(),
        }
    }
}

/// Every new account starts with 1000.00
fn default_starting_balance() -> Decimal {
    Decimal::new(100_000, 2)
}

fn default_db_filename() -> String {
    "remit.duckdb".to_string()
}

/// Remit configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub starting_balance: Decimal,
    pub db_filename: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            starting_balance: default_starting_balance(),
            db_filename: default_db_filename(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        Ok(Self {
            starting_balance: raw.ledger.starting_balance,
            db_filename: raw.ledger.db_filename,
        })
    }
}
