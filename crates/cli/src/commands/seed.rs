use std::path::PathBuf;

use anyhow::bail;
use ecom_core::{AppConfig, Environment};
use ecom_orm::{Seeder, DEFAULT_CLEAR_ORDER};

use super::connect;

pub struct SeedOptions {
    pub clear: bool,
    pub force: bool,
    pub dir: PathBuf,
}

pub async fn run(config: &AppConfig, options: SeedOptions) -> anyhow::Result<()> {
    if options.clear {
        check_clear_allowed(&config.environment, options.force)?;
    }

    let database = connect(config).await?;
    let seeder = Seeder::new(database.clone());
    let outcome = seed(&seeder, &options).await;
    database.close().await;
    outcome
}

async fn seed(seeder: &Seeder, options: &SeedOptions) -> anyhow::Result<()> {
    if options.clear {
        println!("Clearing existing data...");
        let report = seeder.clear(DEFAULT_CLEAR_ORDER).await?;
        println!(
            "Cleared {} table(s), skipped {}",
            report.cleared.len(),
            report.skipped.len()
        );
    }

    let executed = seeder.run(&options.dir).await?;
    if executed.is_empty() {
        println!("No seed files found in {}", options.dir.display());
    } else {
        for filename in &executed {
            println!("Seeded: {}", filename);
        }
        println!("Seeding completed ({} file(s))", executed.len());
    }
    Ok(())
}

fn check_clear_allowed(environment: &Environment, force: bool) -> anyhow::Result<()> {
    if environment.is_production() && !force {
        bail!("Refusing to clear data in the production environment; pass --force to override");
    }
    if environment.is_production() {
        tracing::warn!("Clearing data in the production environment (--force)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_requires_force_in_production() {
        assert!(check_clear_allowed(&Environment::Production, false).is_err());
        assert!(check_clear_allowed(&Environment::Production, true).is_ok());
        assert!(check_clear_allowed(&Environment::Development, false).is_ok());
    }
}
