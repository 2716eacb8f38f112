/// Annotation Ledger server
use annotation_ledger::{config::DEFAULT_LOG_FILTER, server, AnnoResult, AppContext, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> AnnoResult<()> {
    let config = ServerConfig::from_env()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(&config.logging.level)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = %config.service.version,
        database = %config.storage.database.display(),
        log_filter = %config.logging.level,
        "starting annotation ledger"
    );

    let ctx = AppContext::new(config).await?;

    server::serve(ctx).await?;

    Ok(())
}
