//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each migration is
//! tracked in the sys_migrations table so reruns are idempotent.

use anyhow::Result;
use duckdb::Connection;

use crate::migrations::MIGRATIONS;

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
}

impl<'a> MigrationService<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Run all pending migrations in order
    ///
    /// The bootstrap migration creates the sys_migrations table itself and
    /// is written with IF NOT EXISTS, so it is safe to run unconditionally
    /// before the table can be consulted.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let (bootstrap_name, bootstrap_sql) = MIGRATIONS[0];
        self.conn.execute_batch(bootstrap_sql)?;

        let applied_set = self.get_applied()?;
        let mut newly_applied = Vec::new();

        if !applied_set.contains(&bootstrap_name.to_string()) {
            self.record_migration(bootstrap_name)?;
            newly_applied.push(bootstrap_name.to_string());
        }

        for (name, sql) in MIGRATIONS.iter().skip(1) {
            if !applied_set.contains(&name.to_string()) {
                self.conn.execute_batch(sql)?;
                self.record_migration(name)?;
                newly_applied.push(name.to_string());
            }
        }

        Ok(MigrationResult {
            already_applied: applied_set.len(),
            applied: newly_applied,
        })
    }

    /// Get list of already applied migration names
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duckdb::Connection;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn);

        let result = service.run_pending().unwrap();

        // All migrations should be applied
        assert_eq!(result.applied.len(), MIGRATIONS.len());
        assert_eq!(result.already_applied, 0);

        // Running again should apply nothing
        let result2 = service.run_pending().unwrap();
        assert_eq!(result2.applied.len(), 0);
        assert_eq!(result2.already_applied, MIGRATIONS.len());
    }

    #[test]
    fn test_schema_seeds_lookup_tables() {
        let conn = Connection::open_in_memory().unwrap();
        MigrationService::new(&conn).run_pending().unwrap();

        let types: i64 = conn
            .query_row("SELECT COUNT(*) FROM transfer_types", [], |row| row.get(0))
            .unwrap();
        let statuses: i64 = conn
            .query_row("SELECT COUNT(*) FROM transfer_statuses", [], |row| {
                row.get(0)
            })
            .unwrap();

        assert_eq!(types, 2);
        assert_eq!(statuses, 3);
    }
}
