//! Migration Runner - orchestrates `up`, `down` and `status`
//!
//! Each operation acquires one connection from the pool and does all of its
//! work on it: ensuring the ledger table, locking, reading the ledger and
//! applying files.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use sqlx::AnyConnection;

use super::definitions::{
    MigrationConfig, MigrationFile, MigrationRunResult, MigrationStatus, MigrationStatusEntry,
    RunnerState,
};
use super::executor::MigrationExecutor;
use super::ledger::Ledger;
use super::lock::MigrationLock;
use super::manager::MigrationManager;
use crate::database::Database;
use crate::error::{OrmError, OrmResult};

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    database: Database,
    manager: MigrationManager,
    ledger: Ledger,
    executor: MigrationExecutor,
    use_lock: bool,
    state: RunnerState,
}

impl MigrationRunner {
    /// Create a new migration runner. Fails if the ledger table name is unsafe.
    pub fn new(database: Database, config: MigrationConfig) -> OrmResult<Self> {
        let ledger = Ledger::new(&config.migrations_table)?;
        Ok(Self {
            database,
            executor: MigrationExecutor::new(ledger.clone()),
            ledger,
            use_lock: config.use_lock,
            manager: MigrationManager::with_config(config),
            state: RunnerState::Uninitialized,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> RunnerState {
        self.state
    }

    /// Get the migration manager
    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    /// Get the database handle
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Apply every pending migration in filename order, stopping at the first failure
    pub async fn up(&mut self) -> OrmResult<MigrationRunResult> {
        let start_time = Instant::now();
        let mut conn = self.acquire().await?;

        let lock = match MigrationLock::acquire(&mut conn, self.use_lock).await {
            Ok(lock) => lock,
            Err(e) => return self.settle(Err(e)),
        };
        let outcome = match self.prepare(&mut conn).await {
            Ok(()) => {
                self.state = RunnerState::Applying;
                self.apply_pending(&mut conn).await
            }
            Err(e) => Err(e),
        };
        let outcome = finish(outcome, lock.release(&mut conn).await);

        self.settle(outcome.map(|(applied, skipped_count)| MigrationRunResult {
            applied_count: applied.len(),
            applied_migrations: applied,
            skipped_count,
            execution_time_ms: start_time.elapsed().as_millis(),
        }))
    }

    /// Forget the most recently applied migration.
    ///
    /// Only the ledger record is deleted. No SQL from the migration is
    /// reversed, so the schema keeps whatever the file created. Returns the
    /// forgotten file, or `None` when nothing is applied.
    pub async fn down(&mut self) -> OrmResult<Option<MigrationFile>> {
        let mut conn = self.acquire().await?;

        let lock = match MigrationLock::acquire(&mut conn, self.use_lock).await {
            Ok(lock) => lock,
            Err(e) => return self.settle(Err(e)),
        };
        let outcome = match self.prepare(&mut conn).await {
            Ok(()) => {
                self.state = RunnerState::RollingBack;
                self.forget_latest(&mut conn).await
            }
            Err(e) => Err(e),
        };
        let outcome = finish(outcome, lock.release(&mut conn).await);

        self.settle(outcome)
    }

    /// Report every discovered migration as applied or pending, in filename order
    pub async fn status(&mut self) -> OrmResult<Vec<MigrationStatusEntry>> {
        let mut conn = self.acquire().await?;

        let outcome = match self.prepare(&mut conn).await {
            Ok(()) => {
                self.state = RunnerState::Reporting;
                self.collect_status(&mut conn).await
            }
            Err(e) => Err(e),
        };

        self.settle(outcome)
    }

    async fn acquire(&mut self) -> OrmResult<sqlx::pool::PoolConnection<sqlx::Any>> {
        let conn = self.database.pool().acquire().await.map_err(|e| {
            OrmError::Connection(format!("Could not acquire connection for migrations: {}", e))
        });
        if conn.is_err() {
            self.state = RunnerState::Failed;
        }
        conn
    }

    async fn prepare(&mut self, conn: &mut AnyConnection) -> OrmResult<()> {
        self.ledger.ensure_table(conn).await?;
        if self.state == RunnerState::Uninitialized {
            tracing::debug!("Migrations table '{}' is ready", self.ledger.table());
        }
        self.state = RunnerState::Ready;
        Ok(())
    }

    async fn apply_pending(&self, conn: &mut AnyConnection) -> OrmResult<(Vec<String>, usize)> {
        let applied = self.ledger.load_applied(conn).await?;
        let migrations = self.manager.list_migrations()?;

        let mut newly_applied = Vec::new();
        let mut skipped_count = 0;

        for migration in &migrations {
            if applied.contains(&migration.version) {
                tracing::debug!("Skipping already applied migration: {}", migration.filename);
                skipped_count += 1;
                continue;
            }

            tracing::info!("Applying migration: {}", migration.filename);
            self.executor.apply(conn, migration).await?;
            newly_applied.push(migration.filename.clone());
        }

        if newly_applied.is_empty() {
            tracing::info!("No pending migrations");
        } else {
            tracing::info!("Applied {} migration(s)", newly_applied.len());
        }

        Ok((newly_applied, skipped_count))
    }

    async fn forget_latest(&self, conn: &mut AnyConnection) -> OrmResult<Option<MigrationFile>> {
        let applied = self.ledger.load_applied(conn).await?;
        if applied.is_empty() {
            tracing::info!("No migrations to roll back");
            return Ok(None);
        }

        let migrations = self.manager.list_migrations()?;
        let Some(latest) = latest_applied(migrations, &applied) else {
            tracing::warn!(
                "Applied versions {:?} have no matching migration files; nothing rolled back",
                applied
            );
            return Ok(None);
        };

        self.ledger.remove_applied(conn, &latest.version).await?;

        tracing::warn!(
            "Rolled back migration record: {} (version {})",
            latest.filename,
            latest.version
        );
        tracing::warn!(
            "Schema changes from {} were NOT reverted; only the ledger record was removed",
            latest.filename
        );

        Ok(Some(latest))
    }

    async fn collect_status(
        &self,
        conn: &mut AnyConnection,
    ) -> OrmResult<Vec<MigrationStatusEntry>> {
        let records: HashMap<String, String> = self
            .ledger
            .load_records(conn)
            .await?
            .into_iter()
            .map(|record| (record.version, record.applied_at))
            .collect();

        let migrations = self.manager.list_migrations()?;
        Ok(migrations
            .into_iter()
            .map(|file| {
                let status = match records.get(&file.version) {
                    Some(applied_at) => MigrationStatus::Applied {
                        applied_at: applied_at.clone(),
                    },
                    None => MigrationStatus::Pending,
                };
                MigrationStatusEntry { file, status }
            })
            .collect())
    }

    fn settle<T>(&mut self, outcome: OrmResult<T>) -> OrmResult<T> {
        self.state = if outcome.is_ok() {
            RunnerState::Ready
        } else {
            RunnerState::Failed
        };
        outcome
    }
}

/// The lexicographically last file whose version is in the ledger
fn latest_applied(
    migrations: Vec<MigrationFile>,
    applied: &BTreeSet<String>,
) -> Option<MigrationFile> {
    migrations
        .into_iter()
        .rev()
        .find(|m| applied.contains(&m.version))
}

/// Combine an operation's outcome with the lock release; the operation's error wins
fn finish<T>(outcome: OrmResult<T>, released: OrmResult<()>) -> OrmResult<T> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            tracing::warn!("Failed to release migration lock: {}", release_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(filename: &str) -> MigrationFile {
        MigrationFile {
            filename: filename.to_string(),
            version: filename[..3].to_string(),
            name: String::new(),
            path: PathBuf::from(filename),
        }
    }

    #[test]
    fn test_latest_applied_picks_highest_applied_file() {
        let migrations = vec![file("001_a.sql"), file("002_b.sql"), file("003_c.sql")];
        let applied: BTreeSet<String> = ["001", "002"].iter().map(|s| s.to_string()).collect();

        let latest = latest_applied(migrations.clone(), &applied).unwrap();
        assert_eq!(latest.filename, "002_b.sql");

        assert!(latest_applied(migrations, &BTreeSet::new()).is_none());
    }

    #[test]
    fn test_finish_prefers_operation_error() {
        let op_err: OrmResult<()> = Err(OrmError::Connection("op".to_string()));
        let lock_err: OrmResult<()> = Err(OrmError::Connection("lock".to_string()));

        match finish(op_err, lock_err) {
            Err(OrmError::Connection(msg)) => assert_eq!(msg, "op"),
            other => panic!("unexpected {:?}", other),
        }

        let released_err: OrmResult<()> = Err(OrmError::Connection("lock".to_string()));
        assert!(finish(Ok(1), released_err).is_err());
        assert_eq!(finish(Ok(1), Ok(())).unwrap(), 1);
    }
}
