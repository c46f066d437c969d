use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use super::database::DatabaseConfig;
use super::sources::ConfigSource;
use super::validation::{validate_one_of, ConfigError, VALID_LOG_LEVELS, VALID_SSL_MODES};

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::invalid_value(
                "environment",
                s,
                "development, testing, or production",
            )),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let env_str = match self {
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Production => "production",
        };
        write!(f, "{}", env_str)
    }
}

impl Environment {
    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Application configuration shared by the `ecom` binaries
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            host: "localhost".to_string(),
            port: 8080,
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

/// Values given on the command line, replacing their environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Replaces `DATABASE_URL`
    pub database_url: Option<String>,
    /// Replaces `LOG_LEVEL`
    pub log_level: Option<String>,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is loaded first when present;
    /// variables already set in the environment take precedence over it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(&ConfigOverrides::default())
    }

    /// Load configuration from the process environment, with command-line
    /// overrides taking precedence. Validation runs once, after the overrides.
    pub fn from_env_with(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment file {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ConfigError::EnvironmentFile {
                    message: e.to_string(),
                })
            }
        }

        Self::from_lookup_with(|key| env::var(key).ok(), overrides)
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_lookup_with(lookup, &ConfigOverrides::default())
    }

    /// Like [`AppConfig::from_lookup`], with `overrides` replacing the
    /// corresponding variables before anything is parsed or validated.
    ///
    /// When a database URL is in effect the `DB_*` parts are not read, so a
    /// malformed part cannot block an explicit URL.
    pub fn from_lookup_with<F>(lookup: F, overrides: &ConfigOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            let overridden = match key {
                "LOG_LEVEL" => overrides.log_level.clone(),
                "DATABASE_URL" => overrides.database_url.clone(),
                _ => None,
            };
            overridden
                .or_else(|| lookup(key))
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(env_str) = get("ENV") {
            config.environment = env_str.parse()?;
        }
        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_port("port", &port)?;
        }
        if let Some(log_level) = get("LOG_LEVEL") {
            config.log_level = log_level.to_lowercase();
        }

        config.database.url_override = get("DATABASE_URL");
        if config.database.url_override.is_some() {
            config.validate()?;
            return Ok(config);
        }

        let db = &mut config.database;

        if let Some(host) = get("DB_HOST") {
            db.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            db.port = parse_port("db_port", &port)?;
        }
        if let Some(user) = get("DB_USER") {
            db.user = user;
        }
        if let Some(password) = get("DB_PASSWORD") {
            db.password = password;
        }
        if let Some(name) = get("DB_NAME") {
            db.name = name;
        }
        if let Some(ssl_mode) = get("DB_SSLMODE") {
            db.ssl_mode = ssl_mode;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_one_of("log_level", &self.log_level, VALID_LOG_LEVELS)?;

        // An explicit URL replaces the DB_* parts entirely
        if self.database.url_override.is_some() {
            return Ok(());
        }

        validate_one_of("db_sslmode", &self.database.ssl_mode, VALID_SSL_MODES)?;

        if self.database.name.is_empty() {
            return Err(ConfigError::missing_required(
                "db_name",
                "set DB_NAME or DATABASE_URL",
            ));
        }

        // Fail early on parts that cannot form a URL
        self.database.url()?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Report where each value came from, for `ecom db check`
    pub fn config_sources(&self) -> HashMap<String, ConfigSource> {
        Self::sources_with(|key| env::var(key).ok())
    }

    fn sources_with<F>(lookup: F) -> HashMap<String, ConfigSource>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let entries: [(&str, &str, String); 10] = [
            ("environment", "ENV", defaults.environment.to_string()),
            ("host", "HOST", defaults.host.clone()),
            ("port", "PORT", defaults.port.to_string()),
            ("log_level", "LOG_LEVEL", defaults.log_level.clone()),
            ("db_host", "DB_HOST", defaults.database.host.clone()),
            ("db_port", "DB_PORT", defaults.database.port.to_string()),
            ("db_user", "DB_USER", defaults.database.user.clone()),
            ("db_password", "DB_PASSWORD", "***".to_string()),
            ("db_name", "DB_NAME", defaults.database.name.clone()),
            ("db_sslmode", "DB_SSLMODE", defaults.database.ssl_mode.clone()),
        ];

        let is_set = |key: &str| lookup(key).is_some_and(|value| !value.is_empty());

        let mut sources: HashMap<String, ConfigSource> = entries
            .into_iter()
            .map(|(field, var, default)| {
                let source = if is_set(var) {
                    ConfigSource::EnvVar(var.to_string())
                } else {
                    ConfigSource::Default(default)
                };
                (field.to_string(), source)
            })
            .collect();

        let url_source = if is_set("DATABASE_URL") {
            ConfigSource::EnvVar("DATABASE_URL".to_string())
        } else {
            ConfigSource::Derived("DB_* settings".to_string())
        };
        sources.insert("database_url".to_string(), url_source);

        sources
    }
}

fn parse_port(field: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::invalid_value(field, value, "port between 1 and 65535"))
}
