//! Migration Definitions - Core types shared by discovery, the ledger and the runner

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Extension recognised for migration and seed scripts
pub const MIGRATION_EXTENSION: &str = "sql";

/// Default name of the applied-version ledger table
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Advisory lock key taken on PostgreSQL while `up`/`down` run
pub const MIGRATION_LOCK_KEY: i64 = 0x6563_6f6d_6d69_67; // "ecommig"

/// A migration script discovered on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    /// File name including extension, e.g. `001_init.sql`
    pub filename: String,
    /// Version token: the text before the first `_`, or the whole stem
    pub version: String,
    /// Descriptive suffix after the version token
    pub name: String,
    #[serde(skip)]
    pub path: PathBuf,
}

impl fmt::Display for MigrationFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filename)
    }
}

/// A row of the ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedRecord {
    pub version: String,
    /// Timestamp as rendered by the database
    pub applied_at: String,
}

/// Configuration for the migration system
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking applied versions
    pub migrations_table: String,
    /// Take a PostgreSQL advisory lock around `up` and `down`
    pub use_lock: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            use_lock: true,
        }
    }
}

impl MigrationConfig {
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }
}

/// Result of running migrations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationRunResult {
    /// Number of migrations that were applied
    pub applied_count: usize,
    /// Filenames of migrations that were applied, in order
    pub applied_migrations: Vec<String>,
    /// Number of migrations that were skipped (already applied)
    pub skipped_count: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: String,
    },
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied { .. })
    }
}

/// One line of the `status` report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatusEntry {
    pub file: MigrationFile,
    pub status: MigrationStatus,
}

impl fmt::Display for MigrationStatusEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            MigrationStatus::Applied { .. } => write!(f, "✅ {} (applied)", self.file.filename),
            MigrationStatus::Pending => write!(f, "⏳ {} (pending)", self.file.filename),
        }
    }
}

/// Lifecycle of a [`MigrationRunner`](super::runner::MigrationRunner)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Ledger table not yet ensured
    Uninitialized,
    /// Ledger table exists; idle
    Ready,
    Applying,
    RollingBack,
    Reporting,
    /// The last operation failed; the runner may be used again
    Failed,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Uninitialized => "uninitialized",
            RunnerState::Ready => "ready",
            RunnerState::Applying => "applying",
            RunnerState::RollingBack => "rolling back",
            RunnerState::Reporting => "reporting",
            RunnerState::Failed => "failed",
        };
        f.write_str(name)
    }
}
