use ecom_core::AppConfig;

use super::connect;

pub async fn check(config: &AppConfig) -> anyhow::Result<()> {
    println!("Environment: {}", config.environment);
    println!("Database:    {}", config.database.masked_url());

    let database = connect(config).await?;
    let outcome = async {
        let latency = database.health_check().await?;
        let backend = database.backend_name().await?;
        Ok::<_, ecom_orm::OrmError>((backend, latency))
    }
    .await;
    database.close().await;

    let (backend, latency) = outcome?;
    println!("Status:      healthy ({}, {:?})", backend, latency);

    let mut sources: Vec<_> = config.config_sources().into_iter().collect();
    sources.sort_by(|a, b| a.0.cmp(&b.0));
    println!("\nConfiguration sources:");
    for (field, source) in sources {
        println!("  {:<12} {}", field, source);
    }

    Ok(())
}
