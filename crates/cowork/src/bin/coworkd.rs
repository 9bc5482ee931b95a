//! Resource API daemon.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cowork::{CoworkConfig, FileResourceStore, ResourceRegistry};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = CoworkConfig::from_env();
    let store = Arc::new(FileResourceStore::new(config.store_dir.clone()));
    let registry = Arc::new(ResourceRegistry::new(store, &config));

    if let Err(error) = registry.load().await {
        tracing::warn!(%error, "failed to load persisted resources");
    }

    if let Err(error) = cowork::server::serve(registry, &config.bind_addr).await {
        tracing::error!(%error, "server exited");
        std::process::exit(1);
    }
}
