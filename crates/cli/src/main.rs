mod commands;

use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use ecom_core::{init_logging, AppConfig, ConfigOverrides, LoggingConfig};

use commands::*;

#[derive(Parser)]
#[command(name = "ecom")]
#[command(about = "Schema migrations, seeding and database checks for the ecom backend")]
#[command(version)]
struct Cli {
    /// Database URL; overrides DATABASE_URL and the DB_* variables
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides LOG_LEVEL
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: MigrateCommands,
    },

    /// Run the seed files
    Seed {
        /// Delete existing data from the e-commerce tables first
        #[arg(long)]
        clear: bool,

        /// Allow --clear in the production environment
        #[arg(long)]
        force: bool,

        /// Directory containing seed files
        #[arg(long, default_value = "seeds")]
        dir: PathBuf,
    },

    /// Database connectivity
    Db {
        #[command(subcommand)]
        db_command: DbCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Apply all pending migrations
    Up {
        /// Directory containing migration files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },

    /// Forget the most recently applied migration (schema is left unchanged)
    Down {
        /// Directory containing migration files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },

    /// Show which migrations are applied and which are pending
    Status {
        /// Directory containing migration files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new, empty migration file
    Create {
        /// Migration name
        name: String,

        /// Directory containing migration files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Connect to the database and report its health
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        database_url: cli.database_url,
        log_level: cli.log_level,
    };
    let config = AppConfig::from_env_with(&overrides)?;

    init_logging(&LoggingConfig::from_app_config(&config))
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Migrate { migrate_command } => match migrate_command {
            MigrateCommands::Up { dir } => {
                migrate::up(&config, dir).await?;
            }
            MigrateCommands::Down { dir } => {
                migrate::down(&config, dir).await?;
            }
            MigrateCommands::Status { dir, json } => {
                migrate::status(&config, dir, json).await?;
            }
            MigrateCommands::Create { name, dir } => {
                migrate::create(&name, dir)?;
            }
        },
        Commands::Seed { clear, force, dir } => {
            seed::run(&config, seed::SeedOptions { clear, force, dir }).await?;
        }
        Commands::Db { db_command } => match db_command {
            DbCommands::Check => db::check(&config).await?,
        },
    }

    Ok(())
}
