//! Database seeding from `.sql` files
//!
//! Seed files live in their own directory (`seeds/` by default) and are run
//! in filename order, each as one batch. Unlike migrations they are not
//! tracked, so running them twice inserts twice; `clear` empties the
//! e-commerce tables first.

use std::path::Path;

use sqlx::Executor;

use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::migrations::manager::sql_files;
use crate::security::{escape_identifier, validate_identifier};

/// Tables emptied by [`Seeder::clear`], children before parents
pub const DEFAULT_CLEAR_ORDER: &[&str] = &[
    "order_items",
    "order_coupons",
    "payments",
    "orders",
    "wishlist_items",
    "wishlists",
    "product_reviews",
    "shipping_details",
    "inventory_movements",
    "product_images",
    "customer_addresses",
    "products",
    "customers",
    "coupons",
    "categories",
];

/// Outcome of [`Seeder::clear`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub cleared: Vec<String>,
    /// Tables whose `DELETE` failed, e.g. because they do not exist yet
    pub skipped: Vec<String>,
}

/// Runs seed scripts against a database
#[derive(Debug, Clone)]
pub struct Seeder {
    database: Database,
}

impl Seeder {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Delete all rows from `tables`, in the given order.
    ///
    /// A failing table is logged and skipped. Unsafe table names are rejected
    /// before anything is deleted.
    pub async fn clear(&self, tables: &[&str]) -> OrmResult<ClearReport> {
        for table in tables {
            validate_identifier(table)?;
        }

        let mut conn = self
            .database
            .pool()
            .acquire()
            .await
            .map_err(|e| {
                OrmError::Connection(format!("Could not acquire connection for seeding: {}", e))
            })?;

        let mut report = ClearReport::default();
        for table in tables {
            let sql = format!("DELETE FROM {}", escape_identifier(table));
            match sqlx::query(&sql).execute(&mut *conn).await {
                Ok(result) => {
                    tracing::debug!("Cleared {} row(s) from {}", result.rows_affected(), table);
                    report.cleared.push(table.to_string());
                }
                Err(e) => {
                    tracing::warn!("Could not clear table {}: {}", table, e);
                    report.skipped.push(table.to_string());
                }
            }
        }

        tracing::info!("Cleared {} table(s)", report.cleared.len());
        Ok(report)
    }

    /// Run every `.sql` file in `dir` in filename order, stopping at the first failure.
    ///
    /// Returns the filenames that ran. An empty directory is not an error.
    pub async fn run(&self, dir: impl AsRef<Path>) -> OrmResult<Vec<String>> {
        let files = sql_files(dir.as_ref())?;
        if files.is_empty() {
            tracing::warn!("No seed files found in {}", dir.as_ref().display());
            return Ok(Vec::new());
        }

        let mut conn = self
            .database
            .pool()
            .acquire()
            .await
            .map_err(|e| {
                OrmError::Connection(format!("Could not acquire connection for seeding: {}", e))
            })?;

        let mut executed = Vec::with_capacity(files.len());
        for (filename, path) in files {
            let script = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| OrmError::io(&path, e))?;

            tracing::info!("Running seed file: {}", filename);
            (&mut *conn)
                .execute(script.as_str())
                .await
                .map_err(|source| OrmError::Seed {
                    file: filename.clone(),
                    source,
                })?;

            executed.push(filename);
        }

        tracing::info!("Seeding completed ({} file(s))", executed.len());
        Ok(executed)
    }
}
