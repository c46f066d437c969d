use std::path::PathBuf;

use ecom_core::AppConfig;
use ecom_orm::{
    MigrationConfig, MigrationFile, MigrationManager, MigrationRunResult, MigrationRunner,
    MigrationStatusEntry,
};

use super::connect;

fn migration_config(dir: PathBuf) -> MigrationConfig {
    MigrationConfig::default().with_dir(dir)
}

async fn runner(config: &AppConfig, dir: PathBuf) -> anyhow::Result<MigrationRunner> {
    let database = connect(config).await?;
    Ok(MigrationRunner::new(database, migration_config(dir))?)
}

pub async fn up(config: &AppConfig, dir: PathBuf) -> anyhow::Result<MigrationRunResult> {
    let mut runner = runner(config, dir).await?;
    let outcome = runner.up().await;
    runner.database().close().await;
    let result = outcome?;

    if result.applied_count == 0 {
        println!("No pending migrations ({} already applied)", result.skipped_count);
    } else {
        for filename in &result.applied_migrations {
            println!("Applied migration: {}", filename);
        }
        println!(
            "Applied {} migration(s) in {}ms",
            result.applied_count, result.execution_time_ms
        );
    }
    Ok(result)
}

pub async fn down(config: &AppConfig, dir: PathBuf) -> anyhow::Result<Option<MigrationFile>> {
    let mut runner = runner(config, dir).await?;
    let outcome = runner.down().await;
    runner.database().close().await;
    let forgotten = outcome?;

    match &forgotten {
        Some(file) => {
            println!("Rolled back migration: {}", file.filename);
            println!("NOTE: only the ledger record was removed; schema changes were not reverted");
        }
        None => println!("No migrations to roll back"),
    }
    Ok(forgotten)
}

pub async fn status(
    config: &AppConfig,
    dir: PathBuf,
    json: bool,
) -> anyhow::Result<Vec<MigrationStatusEntry>> {
    let mut runner = runner(config, dir).await?;
    let outcome = runner.status().await;
    runner.database().close().await;
    let entries = outcome?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_status(&entries);
    }
    Ok(entries)
}

fn print_status(entries: &[MigrationStatusEntry]) {
    println!("Migration Status:");
    println!("=================");

    if entries.is_empty() {
        println!("No migrations found");
        return;
    }

    for entry in entries {
        println!("{}", entry);
    }

    let applied = entries.iter().filter(|e| e.status.is_applied()).count();
    println!("\n{} applied, {} pending", applied, entries.len() - applied);
}

pub fn create(name: &str, dir: PathBuf) -> anyhow::Result<MigrationFile> {
    let manager = MigrationManager::with_config(migration_config(dir));
    let file = manager.create_migration(name)?;
    println!("Created migration: {}", file.path.display());
    Ok(file)
}
