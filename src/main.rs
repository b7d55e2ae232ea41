use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resume_api::api::{create_router, AppState};
use resume_api::config::Config;
use resume_api::db::{create_redis_client, InMemoryProgressStore, ProgressStore, RedisProgressStore};
use resume_api::services::providers::{CatalogProvider, TmdbProvider};
use resume_api::services::ContinueWatchingService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resume_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Progress storage: shared Redis when configured, process memory otherwise
    let (store, bridge) = match &config.redis_url {
        Some(redis_url) => {
            let client = create_redis_client(redis_url)?;
            let (store, bridge) = RedisProgressStore::connect(client).await?;
            (Arc::new(store) as Arc<dyn ProgressStore>, Some(bridge))
        }
        None => {
            tracing::warn!("REDIS_URL not set, progress is kept in memory only");
            (
                Arc::new(InMemoryProgressStore::new()) as Arc<dyn ProgressStore>,
                None,
            )
        }
    };

    let catalog: Arc<dyn CatalogProvider> = Arc::new(TmdbProvider::new(
        config.tmdb_api_key.clone(),
        config.tmdb_api_url.clone(),
    ));

    tracing::info!(
        store = store.name(),
        catalog = catalog.name(),
        debounce_ms = config.refresh_debounce_ms,
        "Continue-watching pipeline configured"
    );

    let service = ContinueWatchingService::new(store, catalog)
        .with_debounce(Duration::from_millis(config.refresh_debounce_ms));

    let state = AppState::new(service);
    let watcher = state.start_watcher();

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %config.bind_addr(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    watcher.abort();
    if let Some(bridge) = bridge {
        bridge.shutdown().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
