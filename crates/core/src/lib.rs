//! # ecom-core
//!
//! Configuration and logging shared by the ecom backend binaries.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, ConfigError, ConfigOverrides, ConfigSource, DatabaseConfig, Environment,
};
pub use logging::{init_logging, LoggingConfig};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
