//! Database connection management
//!
//! Provides the explicit [`Database`] handle that the migration runner and
//! seeder are constructed with. The pool is an `sqlx` `AnyPool`, so the same
//! code runs against PostgreSQL in production and SQLite in tests.

use std::time::{Duration, Instant};

use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;

use crate::error::{OrmError, OrmResult};

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    /// Seconds to wait for a connection before giving up
    pub acquire_timeout: u64,
    pub idle_timeout: Option<u64>,
    pub max_lifetime: Option<u64>,
    pub test_before_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 0,
            acquire_timeout: 30,
            idle_timeout: Some(600),  // 10 minutes
            max_lifetime: Some(1800), // 30 minutes
            test_before_acquire: true,
        }
    }
}

impl PoolConfig {
    /// A single-connection pool. Required for `sqlite::memory:`, where every
    /// connection would otherwise see its own empty database.
    pub fn single_connection() -> Self {
        Self {
            max_connections: 1,
            min_connections: 1,
            idle_timeout: None,
            max_lifetime: None,
            ..Self::default()
        }
    }
}

/// Database handle owning the connection pool
#[derive(Debug, Clone)]
pub struct Database {
    pool: AnyPool,
    config: PoolConfig,
}

impl Database {
    /// Open a pool for `database_url` and verify it with a ping
    pub async fn connect(database_url: &str, config: &PoolConfig) -> OrmResult<Self> {
        install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout))
            .test_before_acquire(config.test_before_acquire);

        if let Some(idle_timeout) = config.idle_timeout {
            options = options.idle_timeout(Duration::from_secs(idle_timeout));
        }
        if let Some(max_lifetime) = config.max_lifetime {
            options = options.max_lifetime(Duration::from_secs(max_lifetime));
        }

        let pool = options
            .connect(database_url)
            .await
            .map_err(|e| {
                OrmError::Connection(format!("Failed to open database connection: {}", e))
            })?;

        let database = Self {
            pool,
            config: config.clone(),
        };
        database.health_check().await?;

        tracing::info!("Database connected successfully");
        Ok(database)
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Get connection pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Name of the driver behind the pool, e.g. "PostgreSQL" or "SQLite"
    pub async fn backend_name(&self) -> OrmResult<String> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| OrmError::Connection(format!("Could not acquire connection: {}", e)))?;
        Ok(conn.backend_name().to_string())
    }

    /// Run a trivial query and report how long the round trip took
    pub async fn health_check(&self) -> OrmResult<Duration> {
        let start = Instant::now();

        let mut conn = self.pool.acquire().await.map_err(|e| {
            OrmError::Connection(format!(
                "Health check failed: could not acquire connection: {}",
                e
            ))
        })?;

        sqlx::query("SELECT 1").execute(&mut *conn).await.map_err(|e| {
            OrmError::Connection(format!("Health check failed: query failed: {}", e))
        })?;

        let duration = start.elapsed();
        tracing::debug!("Database health check passed in {:?}", duration);
        Ok(duration)
    }

    /// Close the connection pool, waiting for checked-out connections to return
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
