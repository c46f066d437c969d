//! Migration Executor - applies a single migration file atomically

use sqlx::{AnyConnection, Connection, Executor};

use super::definitions::MigrationFile;
use super::ledger::Ledger;
use crate::error::{MigrationFailure, OrmError, OrmResult};

/// Applies migration files inside a transaction and records them in the ledger
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    ledger: Ledger,
}

impl MigrationExecutor {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Apply `file` and record its version in the same transaction.
    ///
    /// The script is executed as one batch, so files may hold any number of
    /// statements. On any failure the transaction is dropped, which rolls
    /// back both the script and the ledger insert.
    pub async fn apply(&self, conn: &mut AnyConnection, file: &MigrationFile) -> OrmResult<()> {
        let failed = |cause| OrmError::Migration {
            file: file.filename.clone(),
            cause,
        };

        let script = tokio::fs::read_to_string(&file.path)
            .await
            .map_err(|e| failed(MigrationFailure::Read(e)))?;

        let mut tx = conn
            .begin()
            .await
            .map_err(|e| failed(MigrationFailure::Begin(e)))?;

        if !script.trim().is_empty() {
            (&mut *tx)
                .execute(script.as_str())
                .await
                .map_err(|e| failed(MigrationFailure::Execute(e)))?;
        }

        self.ledger
            .record_applied(&mut tx, &file.version)
            .await
            .map_err(|source| {
                failed(MigrationFailure::Record {
                    version: file.version.clone(),
                    source,
                })
            })?;

        tx.commit().await.map_err(|source| {
            failed(MigrationFailure::Commit {
                version: file.version.clone(),
                source,
            })
        })?;

        tracing::info!("Applied migration: {}", file.filename);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, PoolConfig};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, filename: &str, sql: &str) -> MigrationFile {
        let path = dir.path().join(filename);
        std::fs::write(&path, sql).unwrap();
        MigrationFile {
            filename: filename.to_string(),
            version: filename[..3].to_string(),
            name: String::new(),
            path,
        }
    }

    async fn setup() -> (Database, Ledger) {
        let db = Database::connect("sqlite::memory:", &PoolConfig::single_connection())
            .await
            .unwrap();
        let ledger = Ledger::new("schema_migrations").unwrap();
        let mut conn = db.pool().acquire().await.unwrap();
        ledger.ensure_table(&mut conn).await.unwrap();
        (db, ledger)
    }

    #[tokio::test]
    async fn test_apply_multi_statement_script() {
        let temp_dir = TempDir::new().unwrap();
        let (db, ledger) = setup().await;
        let executor = MigrationExecutor::new(ledger.clone());
        let file = write_file(
            &temp_dir,
            "001_init.sql",
            "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
             INSERT INTO categories (name) VALUES ('books');\n",
        );

        let mut conn = db.pool().acquire().await.unwrap();
        executor.apply(&mut conn, &file).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(ledger.load_applied(&mut conn).await.unwrap().contains("001"));
    }

    #[tokio::test]
    async fn test_failed_script_rolls_back() {
        let temp_dir = TempDir::new().unwrap();
        let (db, ledger) = setup().await;
        let executor = MigrationExecutor::new(ledger.clone());
        let file = write_file(
            &temp_dir,
            "001_broken.sql",
            "CREATE TABLE partial (id INTEGER);\nTHIS IS NOT SQL;\n",
        );

        let mut conn = db.pool().acquire().await.unwrap();
        let err = executor.apply(&mut conn, &file).await.unwrap_err();
        assert_eq!(err.migration_file(), Some("001_broken.sql"));
        assert!(matches!(
            err,
            OrmError::Migration {
                cause: MigrationFailure::Execute(_),
                ..
            }
        ));

        assert!(ledger.load_applied(&mut conn).await.unwrap().is_empty());
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'partial'",
        )
        .fetch_one(&mut *conn)
        .await
        .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_failure() {
        let (db, ledger) = setup().await;
        let executor = MigrationExecutor::new(ledger);
        let file = MigrationFile {
            filename: "009_gone.sql".to_string(),
            version: "009".to_string(),
            name: "gone".to_string(),
            path: PathBuf::from("/nonexistent/009_gone.sql"),
        };

        let mut conn = db.pool().acquire().await.unwrap();
        let err = executor.apply(&mut conn, &file).await.unwrap_err();
        assert!(matches!(
            err,
            OrmError::Migration {
                cause: MigrationFailure::Read(_),
                ..
            }
        ));
    }
}
