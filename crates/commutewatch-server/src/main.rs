use std::net::SocketAddr;
use std::sync::Arc;

use commutewatch_server::{router, AppState};

use commutewatch_core::{
    Config, EventStore, GoogleDirectionsClient, KeyedLocks, MemoryStore, RealtimeSweep, Registry,
    SqliteStore, SweepSettings, TriggerService,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.bind.parse()?;

    let (registry, events): (Arc<dyn Registry>, Arc<dyn EventStore>) = match &config.database_path
    {
        Some(path) => {
            tracing::info!(path = %path.display(), "using sqlite store");
            let store = Arc::new(SqliteStore::open(path)?);
            (store.clone(), store)
        }
        None => {
            tracing::info!("using in-memory store; state is lost on restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let locks = Arc::new(KeyedLocks::new());
    let directions = Arc::new(GoogleDirectionsClient::new(config.google_maps_key.clone()));
    let service = TriggerService::new(
        registry.clone(),
        events,
        directions,
        locks.clone(),
    );

    RealtimeSweep::new(
        registry,
        locks,
        SweepSettings {
            realtime_url: config.realtime_url.clone(),
            service_key: config.ifttt_service_key.clone(),
            interval: config.sweep_interval,
        },
    )
    .spawn();

    let state = Arc::new(AppState {
        service,
        service_key: config.ifttt_service_key.clone(),
    });

    tracing::info!(
        %addr,
        sweep_interval_secs = config.sweep_interval.as_secs(),
        "commutewatch-server listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}
