//! Record a local media file through a recording session and upload it once.
//!
//! Reads SERVER_URL (and optionally CA_CERT_PATH) from the environment or
//! `.env`; `--server` overrides the URL.

use cricket_cv::client::{ClientError, UploadClient};
use cricket_cv::recording::{recording_filename, CameraSource, FacingMode, Recorder, RecordingError};
use std::env;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
struct Args {
    server_url: Option<String>,
    check_only: bool,
    chunk_size: usize,
    file: Option<PathBuf>,
}

fn help_text() -> String {
    [
        "Usage: upload_clip [--server <url>] [--chunk-size <bytes>] <file>",
        "       upload_clip [--server <url>] --check",
        "",
        "Environment: SERVER_URL, CA_CERT_PATH",
    ]
    .join("\n")
}

fn parse_args() -> Result<Args, String> {
    let mut server_url = None;
    let mut check_only = false;
    let mut chunk_size = DEFAULT_CHUNK_SIZE;
    let mut file = None;

    let mut it = env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--server" => {
                server_url = Some(
                    it.next()
                        .ok_or_else(|| "--server requires a value".to_string())?,
                );
            }
            "--chunk-size" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--chunk-size requires a value".to_string())?;
                chunk_size = v
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| "--chunk-size must be a positive integer".to_string())?;
            }
            "--check" => check_only = true,
            "-h" | "--help" => return Err(help_text()),
            other if other.starts_with('-') => {
                return Err(format!("Unknown option: {}\n\n{}", other, help_text()));
            }
            other => file = Some(PathBuf::from(other)),
        }
    }

    if !check_only && file.is_none() {
        return Err(help_text());
    }

    Ok(Args {
        server_url,
        check_only,
        chunk_size,
        file,
    })
}

/// A media file standing in for a camera.
struct FileSource {
    path: PathBuf,
}

impl CameraSource for FileSource {
    fn acquire(&mut self, _facing: FacingMode) -> Result<(), RecordingError> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(RecordingError::CameraUnavailable(format!(
                "{} is not a readable file",
                self.path.display()
            )))
        }
    }

    fn release(&mut self) {}

    fn supported_mime_types(&self) -> Vec<String> {
        mime_guess::from_path(&self.path)
            .iter()
            .map(|m| m.essence_str().to_string())
            .collect()
    }
}

fn build_client(args: &Args) -> anyhow::Result<UploadClient> {
    let Some(server_url) = &args.server_url else {
        return UploadClient::from_env();
    };

    match env::var("CA_CERT_PATH") {
        Ok(path) => {
            let pem = std::fs::read(&path)?;
            Ok(UploadClient::with_trusted_certificate(server_url, &pem)?)
        }
        Err(_) => Ok(UploadClient::new(server_url)?),
    }
}

async fn record(path: PathBuf, chunk_size: usize) -> anyhow::Result<cricket_cv::recording::Blob> {
    let mut recorder = Recorder::open(FileSource { path: path.clone() }, FacingMode::Environment)?;
    recorder.start()?;

    let mut file = tokio::fs::File::open(&path).await?;
    loop {
        let mut buf = vec![0u8; chunk_size];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        buf.truncate(n);
        recorder.push_chunk(buf)?;
    }

    let blob = recorder.stop()?;
    recorder.close();
    Ok(blob)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match parse_args() {
        Ok(a) => a,
        Err(msg) => {
            eprintln!("{}", msg);
            std::process::exit(2);
        }
    };

    let client = match build_client(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    if args.check_only {
        if client.check_server_connection().await {
            println!("Server is reachable: {}", client.base_url());
        } else {
            eprintln!("Cannot connect to server at {}", client.base_url());
            eprintln!("If using HTTPS, trust the server certificate (CA_CERT_PATH) and try again");
            std::process::exit(1);
        }
        return;
    }

    let Some(path) = args.file.clone() else {
        eprintln!("{}", help_text());
        std::process::exit(2);
    };

    let blob = match record(path, args.chunk_size).await {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Failed to process recording: {:#}", e);
            std::process::exit(1);
        }
    };

    let filename = recording_filename(blob.mime_type());
    let size_mb = blob.len() as f64 / 1024.0 / 1024.0;

    match client.upload_video(blob, &filename).await {
        Ok(result) => {
            println!("Upload successful! {}", result.message);
            println!(
                "Stored as {} ({} bytes, captured {})",
                result.video.filename, result.video.size, result.video.timestamp
            );
        }
        Err(e) => {
            eprintln!("Upload failed:");
            eprintln!("  Error: {}", e);
            eprintln!("  Server: {}", client.base_url());
            eprintln!("  Video size: {:.2} MB", size_mb);
            eprintln!();
            eprintln!("{}", e.remediation());
            if matches!(e, ClientError::Status { .. }) {
                std::process::exit(3);
            }
            std::process::exit(1);
        }
    }
}
