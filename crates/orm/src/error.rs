//! Error types for the migration and seeding layer
//!
//! Every failure carries the file, path or operation needed to diagnose it
//! and re-run safely. Nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

/// ORM result type alias
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for ORM operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// Directory or file could not be read or written
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ledger table creation, query, or lock failure
    #[error("Storage error while {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },

    /// A single migration file failed to apply; its transaction was rolled back
    #[error("Migration {file} failed: {cause}")]
    Migration {
        file: String,
        #[source]
        cause: MigrationFailure,
    },

    /// Two migration files share the same version token
    #[error("Duplicate migration version '{version}' in '{first}' and '{second}'")]
    DuplicateVersion {
        version: String,
        first: String,
        second: String,
    },

    /// A table name that cannot be safely interpolated into SQL
    #[error("Invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    /// A seed file failed to execute
    #[error("Seed file {file} failed: {source}")]
    Seed {
        file: String,
        #[source]
        source: sqlx::Error,
    },

    /// Connection pool creation or health check failure
    #[error("Connection error: {0}")]
    Connection(String),
}

impl OrmError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn storage(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Storage { operation, source }
    }

    /// The migration filename involved in the failure, when there is one
    pub fn migration_file(&self) -> Option<&str> {
        match self {
            OrmError::Migration { file, .. } => Some(file),
            _ => None,
        }
    }
}

/// The step at which applying a migration failed
#[derive(Debug, Error)]
pub enum MigrationFailure {
    #[error("failed to read migration file: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to begin transaction: {0}")]
    Begin(#[source] sqlx::Error),

    #[error("failed to execute migration script: {0}")]
    Execute(#[source] sqlx::Error),

    #[error("failed to record version {version}: {source}")]
    Record {
        version: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to commit migration {version}: {source}")]
    Commit {
        version: String,
        #[source]
        source: sqlx::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_names_file() {
        let err = OrmError::Migration {
            file: "002_add_col.sql".to_string(),
            cause: MigrationFailure::Execute(sqlx::Error::RowNotFound),
        };

        assert_eq!(err.migration_file(), Some("002_add_col.sql"));
        let message = err.to_string();
        assert!(message.starts_with("Migration 002_add_col.sql failed"));
        assert!(message.contains("failed to execute migration script"));
    }

    #[test]
    fn test_duplicate_version_message() {
        let err = OrmError::DuplicateVersion {
            version: "001".to_string(),
            first: "001_a.sql".to_string(),
            second: "001_b.sql".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate migration version '001' in '001_a.sql' and '001_b.sql'"
        );
        assert_eq!(err.migration_file(), None);
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = OrmError::io(
            "migrations",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("'migrations'"));
    }
}
