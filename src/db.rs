//! SQLite database connection management.
//!
//! Each CLI invocation opens exactly one connection, does its work, and
//! closes the pool before exiting. The pool is capped at a single
//! connection, so a transaction in progress owns the database handle for
//! its whole lifetime.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::SqliteConnection;
use std::str::FromStr;

use crate::config::Config;
use crate::error::{self, Entity, LedgerError};

/// Open the configured SQLite database.
///
/// - Creates the database file and parent directories if they don't exist.
/// - Enables WAL journal mode and foreign-key enforcement.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open a database that `init` has already created.
pub async fn open(config: &Config) -> Result<SqlitePool> {
    if !config.db.path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run: rledger init",
            config.db.path.display()
        );
    }
    connect(config).await
}

/// Resolve a country by name or ISO code, ignoring case.
pub async fn country_id(conn: &mut SqliteConnection, name: &str) -> error::Result<i64> {
    Ok(resolve_country(conn, name).await?.0)
}

/// Like [`country_id`], also returning the canonical `countries.name`.
pub async fn resolve_country(
    conn: &mut SqliteConnection,
    name: &str,
) -> error::Result<(i64, String)> {
    let row: Option<(i64, String)> = sqlx::query_as(
        "SELECT id, name FROM countries WHERE name = ?1 COLLATE NOCASE OR code = ?1 COLLATE NOCASE",
    )
    .bind(name.trim())
    .fetch_optional(&mut *conn)
    .await?;

    row.ok_or_else(|| LedgerError::not_found(Entity::Country, name))
}
