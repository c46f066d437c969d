//! Applied-version ledger
//!
//! The ledger table is the single source of truth for which migrations have
//! run. It is read fresh on every call; nothing is cached.

use std::collections::BTreeSet;

use sqlx::{AnyConnection, Row};

use super::definitions::AppliedRecord;
use crate::error::{OrmError, OrmResult};
use crate::security::{escape_identifier, validate_identifier};

/// Access to the table recording applied migration versions
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
    quoted: String,
}

impl Ledger {
    /// Create a ledger over `table`, which must be a plain SQL identifier
    pub fn new(table: &str) -> OrmResult<Self> {
        validate_identifier(table)?;
        Ok(Self {
            table: table.to_string(),
            quoted: escape_identifier(table),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                 version VARCHAR(255) PRIMARY KEY,\n    \
                 applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP\n\
             )",
            self.quoted
        )
    }

    /// Create the ledger table if it does not exist yet
    pub async fn ensure_table(&self, conn: &mut AnyConnection) -> OrmResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(conn)
            .await
            .map_err(|e| OrmError::storage("creating the migrations table", e))?;
        Ok(())
    }

    /// All recorded versions
    pub async fn load_applied(&self, conn: &mut AnyConnection) -> OrmResult<BTreeSet<String>> {
        let sql = format!("SELECT version FROM {}", self.quoted);
        let versions: Vec<String> = sqlx::query_scalar(&sql)
            .fetch_all(conn)
            .await
            .map_err(|e| OrmError::storage("loading applied migrations", e))?;
        Ok(versions.into_iter().collect())
    }

    /// All records ordered by version, with `applied_at` rendered as text
    pub async fn load_records(&self, conn: &mut AnyConnection) -> OrmResult<Vec<AppliedRecord>> {
        let sql = format!(
            "SELECT version, CAST(applied_at AS VARCHAR(64)) AS applied_at \
             FROM {} ORDER BY version",
            self.quoted
        );
        let rows = sqlx::query(&sql)
            .fetch_all(conn)
            .await
            .map_err(|e| OrmError::storage("loading migration records", e))?;

        rows.iter()
            .map(|row| -> OrmResult<AppliedRecord> {
                Ok(AppliedRecord {
                    version: row
                        .try_get("version")
                        .map_err(|e| OrmError::storage("reading migration version", e))?,
                    applied_at: row
                        .try_get("applied_at")
                        .map_err(|e| OrmError::storage("reading migration timestamp", e))?,
                })
            })
            .collect()
    }

    /// Record `version` as applied. Recording an existing version is a no-op.
    pub async fn record_applied(
        &self,
        conn: &mut AnyConnection,
        version: &str,
    ) -> Result<(), sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (version) VALUES ($1) ON CONFLICT (version) DO NOTHING",
            self.quoted
        );
        sqlx::query(&sql).bind(version).execute(conn).await?;
        Ok(())
    }

    /// Forget `version`. Returns whether a record was removed.
    pub async fn remove_applied(&self, conn: &mut AnyConnection, version: &str) -> OrmResult<bool> {
        let sql = format!("DELETE FROM {} WHERE version = $1", self.quoted);
        let result = sqlx::query(&sql)
            .bind(version)
            .execute(conn)
            .await
            .map_err(|e| OrmError::storage("removing migration record", e))?;
        Ok(result.rows_affected() > 0)
    }
}
