#![allow(dead_code)]

use axum::Router;
use cricket_cv::{build_router, AppState, Config};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A receiver bound to an ephemeral local port with its own uploads directory.
pub struct TestApp {
    pub base_url: String,
    pub uploads_dir: PathBuf,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Names of the video files currently in the uploads directory.
    pub fn stored_videos(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.uploads_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| cricket_cv::storage::is_video_file(n))
            .collect();
        names.sort();
        names
    }
}

pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with_limit(100).await
}

/// Certificate fixtures: `ca.pem` signs `server.pem`, issued for
/// `localhost` and `127.0.0.1`.
pub fn tls_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/tls")
        .join(name)
}

/// Serve `app` over HTTPS with the fixture certificate, loaded the way the
/// server binary loads its own.
pub async fn serve_tls(app: Router) -> SocketAddr {
    let tls = cricket_cv::load_tls_config(&tls_fixture("server.pem"), &tls_fixture("server.key"))
        .await
        .unwrap();

    let handle = axum_server::Handle::new();
    let server = axum_server::bind_rustls("127.0.0.1:0".parse().unwrap(), tls)
        .handle(handle.clone())
        .serve(app.into_make_service());
    tokio::spawn(async move {
        server.await.unwrap();
    });

    handle.listening().await.unwrap()
}

pub async fn setup_test_app_with_limit(max_file_size_mb: u64) -> TestApp {
    let (app, uploads_dir, temp_dir) = test_router(max_file_size_mb).await;
    let addr = serve(app).await;

    TestApp {
        base_url: format!("http://{}", addr),
        uploads_dir,
        _temp_dir: temp_dir,
    }
}

pub async fn setup_tls_test_app() -> TestApp {
    let (app, uploads_dir, temp_dir) = test_router(100).await;
    let addr = serve_tls(app).await;

    TestApp {
        base_url: format!("https://{}", addr),
        uploads_dir,
        _temp_dir: temp_dir,
    }
}

async fn test_router(max_file_size_mb: u64) -> (Router, PathBuf, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let uploads_dir = temp_dir.path().join("uploads");
    cricket_cv::storage::ensure_uploads_dir(&uploads_dir)
        .await
        .unwrap();

    let config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        uploads_dir: uploads_dir.clone(),
        max_file_size_mb,
        ..Config::default()
    };

    (build_router(Arc::new(AppState { config })), uploads_dir, temp_dir)
}

/// A local port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn video_form(data: Vec<u8>, filename: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().part(
        "video",
        reqwest::multipart::Part::bytes(data).file_name(filename.to_string()),
    )
}
