//! Cricket CV video receiver and upload client.
//!
//! The receiver accepts multipart video uploads, writes them into a flat
//! uploads directory, lists what is stored and serves the files back. The
//! client side turns a finished recording into exactly one upload attempt.

pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod recording;
pub mod storage;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::{AppError, Result};

/// URL prefix under which stored videos are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

pub struct AppState {
    pub config: Config,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health_check))
        .route("/api/upload", post(handlers::upload::upload_video))
        .route("/api/videos", get(handlers::videos::list_videos))
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&state.config.uploads_dir))
        .layer(DefaultBodyLimit::max(state.config.max_request_body_bytes()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the receiver's PEM certificate chain and private key.
///
/// Installs rustls' ring provider as the process default first; reqwest and
/// axum-server share it.
pub async fn load_tls_config(cert: &Path, key: &Path) -> anyhow::Result<RustlsConfig> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    RustlsConfig::from_pem_file(cert, key).await.with_context(|| {
        format!(
            "Failed to load TLS certificate {} / key {}",
            cert.display(),
            key.display()
        )
    })
}
