//! Axum server setup and router configuration.

use crate::api::{avatar, webhook, ws};
use crate::state::AppState;
use axum::{
    extract::State, http::StatusCode, response::IntoResponse, routing::get, routing::post, Json,
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;

/// Build the main application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/ws", get(ws::ws_handler))
        .route("/webhook/github", post(webhook::github_webhook))
        .nest("/api/avatar", avatar::router())
        // Overlay pages are served from other origins (OBS browser
        // sources, local dev servers), so the API is wide open.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    connected_clients: usize,
}

/// Simple health check - returns OK if the server is running.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            connected_clients: state.hub.client_count().await,
        }),
    )
}

/// Run the server until the shutdown flag flips.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // Closed sender counts as shutdown too.
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
        })
        .await
}
