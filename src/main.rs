use lams::store::{FileStore, RecordStore, RestStore};
use lams::{AppConfig, AppState, router};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn RecordStore> = match &config.store {
        Some(store_config) => {
            let store = RestStore::new(store_config.clone())?;
            info!("using hosted record store at {}", store.endpoint());
            Arc::new(store)
        }
        None => {
            let store = FileStore::open(config.data_path.clone()).await?;
            info!("using local record store at {}", store.path().display());
            Arc::new(store)
        }
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = router(AppState::new(config, store));

    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down");
}
