use herald_common::config::AppConfig;
use herald_common::db;
use herald_engine::NotificationService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_sweeper=info,herald_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("Herald sweeper starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    if !config.delivery.scheduling_enabled {
        tracing::warn!("SCHEDULING_ENABLED is false, nothing to run");
        return Ok(());
    }

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::migrate(&pool).await?;

    let service = NotificationService::postgres(pool, &config);
    let scheduler = service.scheduler();

    tracing::info!(
        jobs = ?scheduler.job_names(),
        retry_eligibility = ?config.delivery.retry_eligibility,
        "Starting periodic jobs"
    );

    let handle = scheduler.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping gracefully...");

    handle.shutdown().await;

    tracing::info!("Herald sweeper stopped.");
    Ok(())
}
