//! Error taxonomy for ledger operations.
//!
//! Library operations return [`Result`]. The CLI layer converts these into
//! `anyhow` errors, so every variant surfaces as a non-zero exit status with
//! an `Error: …` line on stderr.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// The kind of record a [`LedgerError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Job,
    Country,
    Pathway,
    Source,
    TrailEntry,
    ArtifactFile,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Job => "job",
            Entity::Country => "country",
            Entity::Pathway => "pathway",
            Entity::Source => "source",
            Entity::TrailEntry => "trail entry",
            Entity::ArtifactFile => "artifact file",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: Entity, key: String },

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job {id} is already {status}")]
    JobClosed { id: i64, status: String },

    /// A step of the pathway transaction failed; every write of the call
    /// has been rolled back.
    #[error("transaction failed, rolled back: {0}")]
    TransactionFailed(#[source] Box<LedgerError>),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    pub fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        LedgerError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// The error that caused a [`LedgerError::TransactionFailed`], or `self`.
    pub fn root_cause(&self) -> &LedgerError {
        match self {
            LedgerError::TransactionFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// Map a unique-constraint violation from SQLite to
/// [`LedgerError::AlreadyExists`]; any other error passes through.
pub fn map_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return LedgerError::AlreadyExists(what());
        }
    }
    LedgerError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity() {
        let err = LedgerError::not_found(Entity::Country, "Atlantis");
        assert_eq!(err.to_string(), "country not found: Atlantis");
    }

    #[test]
    fn root_cause_unwraps_nested_transaction_failures() {
        let err = LedgerError::TransactionFailed(Box::new(LedgerError::InvalidInput(
            "bad".to_string(),
        )));
        assert!(matches!(err.root_cause(), LedgerError::InvalidInput(_)));
        assert!(err.to_string().starts_with("transaction failed, rolled back"));
    }

    #[test]
    fn map_unique_passes_through_other_errors() {
        let err = map_unique(sqlx::Error::RowNotFound, || "x".to_string());
        assert!(matches!(err, LedgerError::Database(sqlx::Error::RowNotFound)));
    }
}
