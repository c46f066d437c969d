pub mod db;
pub mod migrate;
pub mod seed;

use anyhow::Context;
use ecom_core::AppConfig;
use ecom_orm::{Database, PoolConfig};

/// Open the configured database. Migrations and seeds run sequentially, so
/// a single connection is enough.
pub(crate) async fn connect(config: &AppConfig) -> anyhow::Result<Database> {
    let url = config.database.url()?;
    Database::connect(&url, &PoolConfig::single_connection())
        .await
        .with_context(|| format!("Could not connect to {}", config.database.masked_url()))
}
