//! Cross-process migration lock
//!
//! On PostgreSQL a session-level advisory lock serialises concurrent
//! `up`/`down` invocations. Other backends have no equivalent and run
//! unlocked.

use sqlx::AnyConnection;

use super::definitions::MIGRATION_LOCK_KEY;
use crate::error::{OrmError, OrmResult};

const POSTGRES_BACKEND: &str = "PostgreSQL";

/// A held (or skipped) migration lock. Must be released on the same connection.
#[derive(Debug)]
#[must_use = "the lock must be released with `release`"]
pub(crate) struct MigrationLock {
    key: i64,
    held: bool,
}

impl MigrationLock {
    /// Block until the advisory lock is held, or skip when disabled or unsupported
    pub(crate) async fn acquire(conn: &mut AnyConnection, enabled: bool) -> OrmResult<Self> {
        let key = MIGRATION_LOCK_KEY;
        if !enabled || conn.backend_name() != POSTGRES_BACKEND {
            return Ok(Self { key, held: false });
        }

        tracing::debug!("Waiting for migration lock {}", key);
        // pg_advisory_lock returns void, which has no portable decoding
        sqlx::query("SELECT CAST(pg_advisory_lock($1) AS TEXT)")
            .bind(key)
            .execute(conn)
            .await
            .map_err(|e| OrmError::storage("acquiring the migration lock", e))?;

        tracing::debug!("Acquired migration lock {}", key);
        Ok(Self { key, held: true })
    }

    pub(crate) async fn release(self, conn: &mut AnyConnection) -> OrmResult<()> {
        if !self.held {
            return Ok(());
        }

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(conn)
            .await
            .map_err(|e| OrmError::storage("releasing the migration lock", e))?;

        tracing::debug!("Released migration lock {}", self.key);
        Ok(())
    }
}
