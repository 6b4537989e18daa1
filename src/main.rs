use corsair_alerts::config::AppConfig;
use corsair_alerts::processor::feed_state::FeedState;
use corsair_alerts::{db, kafka};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting CORSAIR alert delivery service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");

    // Shared feed state
    let state = Arc::new(Mutex::new(
        FeedState::new(config.notification_retention_days)
            .with_session_idle_hours(config.session_idle_hours),
    ));

    // Start Kafka
    kafka::start_kafka_consumer(&config, pool, state).await?;

    Ok(())
}
