//! HTTP surface over the resource registry.

pub mod resources;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::error::{CoreError, CoreResult};
use crate::registry::ResourceRegistry;

pub struct ServerState {
    pub registry: Arc<ResourceRegistry>,
}

/// Builds the router with all resource routes.
pub fn router(registry: Arc<ResourceRegistry>) -> Router {
    let state = Arc::new(ServerState { registry });
    Router::new()
        .route(
            "/resources",
            get(resources::list_resources).post(resources::add_resource),
        )
        .route("/resources/remove", post(resources::remove_resource))
        .route("/resources/invoke", post(resources::invoke_action))
        .route("/resources/status", get(resources::index_status))
        .route("/resources/events", get(resources::resource_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until the process exits.
pub async fn serve(registry: Arc<ResourceRegistry>, bind_addr: &str) -> CoreResult<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|error| CoreError::Internal(format!("failed to bind {bind_addr}: {error}")))?;
    tracing::info!(%bind_addr, "serving resource API");
    axum::serve(listener, router(registry))
        .await
        .map_err(|error| CoreError::Internal(format!("server error: {error}")))
}
