use anyhow::Context;
use cricket_cv::{build_router, load_tls_config, storage, AppState, Config};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let config = Config::from_env()?;

    storage::ensure_uploads_dir(&config.uploads_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.uploads_dir.display()))?;
    let uploads_dir = config
        .uploads_dir
        .canonicalize()
        .unwrap_or_else(|_| config.uploads_dir.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;

    let state = Arc::new(AppState {
        config: config.clone(),
    });
    let app = build_router(state);

    match config.tls_paths() {
        Some((cert, key)) => {
            let tls = load_tls_config(cert, key).await?;

            tracing::info!("Starting {} on https://{}", config.server_name, addr);
            tracing::info!("Videos will be saved to: {}", uploads_dir.display());

            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            tracing::warn!("TLS_CERT_PATH/TLS_KEY_PATH not set, serving plain HTTP");
            tracing::info!("Starting {} on http://{}", config.server_name, addr);
            tracing::info!("Videos will be saved to: {}", uploads_dir.display());

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
