//! API Server - HTTP server for the classification endpoints

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState};
use crate::config::ServerConfig;

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    max_body_bytes: usize,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: AppState, config: &ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            addr: config.listen_addr.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        // CORS configuration
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route("/", get(handlers::health))
            .route("/health", get(handlers::health))
            .route("/predict", post(handlers::predict))
            .route("/predict-image", post(handlers::predict_image))
            .route("/analyze-all", post(handlers::analyze_all))
            .layer(DefaultBodyLimit::max(self.max_body_bytes))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
