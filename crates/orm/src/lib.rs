//! # ecom-orm: Database layer for the ecom backend
//!
//! Connection management, the schema migration runner and the seed runner.
//! Everything takes an explicit [`Database`] handle; there is no global pool.
//!
//! ```no_run
//! use ecom_orm::{Database, MigrationConfig, MigrationRunner, PoolConfig};
//!
//! # async fn run() -> ecom_orm::OrmResult<()> {
//! let db = Database::connect("postgres://localhost/ecom", &PoolConfig::default()).await?;
//! let mut runner = MigrationRunner::new(db, MigrationConfig::default())?;
//! let result = runner.up().await?;
//! println!("applied {} migration(s)", result.applied_count);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod error;
pub mod migrations;
pub mod security;
pub mod seeding;

pub use database::{Database, PoolConfig};
pub use error::{MigrationFailure, OrmError, OrmResult};
pub use migrations::{
    list_migrations, AppliedRecord, Ledger, MigrationConfig, MigrationExecutor, MigrationFile,
    MigrationManager, MigrationRunResult, MigrationRunner, MigrationStatus, MigrationStatusEntry,
    RunnerState,
};
pub use seeding::{ClearReport, Seeder, DEFAULT_CLEAR_ORDER};
