//! Upload client for the receiver.
//!
//! One call is one attempt: there is no retry and no timeout override beyond
//! reqwest's defaults. Transport failures are classified from the error's
//! source chain so callers can tell an unreachable server apart from a
//! certificate the client does not trust.

use crate::models::{iso_timestamp, UploadResponse};
use crate::recording::{mime_essence, Blob};
use anyhow::Context;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::{Certificate, Client};
use std::error::Error as StdError;
use std::io::ErrorKind;
use thiserror::Error;

const NO_ERROR_DETAILS: &str = "No error details";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP {status}: {reason}. {body}")]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Cannot reach server: {0}")]
    Unreachable(String),

    #[error("TLS handshake failed, certificate likely not trusted: {0}")]
    UntrustedCertificate(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl ClientError {
    /// What the user should check before trying again.
    pub fn remediation(&self) -> &'static str {
        match self {
            ClientError::Status { .. } => {
                "The server rejected the upload. Check the recording and the server logs."
            }
            ClientError::Unreachable(_) => {
                "Cannot reach server. Check: (1) Server is running, (2) URL is correct, (3) Both devices are on the same network"
            }
            ClientError::UntrustedCertificate(_) => {
                "The server certificate is not trusted. Set CA_CERT_PATH to the server certificate, or open the server URL in a browser once and accept it"
            }
            ClientError::Request(_) => "Unexpected client error. Try again.",
        }
    }
}

fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Whether `err` or anything under it is a TLS failure.
///
/// hyper and the rustls connector wrap handshake errors in `io::Error`s
/// whose payload is reachable only through `get_ref()`, so each `io::Error`
/// is opened as well as followed through `source()`.
fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(inner) = current {
        if inner.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if io.kind() == ErrorKind::InvalidData {
                return true;
            }
            if let Some(payload) = io.get_ref() {
                if is_tls_failure(payload) {
                    return true;
                }
            }
        }
        current = inner.source();
    }
    false
}

/// Whether `err` or anything under it is a connection-level `io::Error`.
fn is_connection_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(inner) = current {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::NotConnected
                    | ErrorKind::AddrNotAvailable
                    | ErrorKind::TimedOut
            ) {
                return true;
            }
            if let Some(payload) = io.get_ref() {
                if is_connection_failure(payload) {
                    return true;
                }
            }
        }
        current = inner.source();
    }
    false
}

/// Sort a transport error into the class that tells the user what to fix.
///
/// A certificate failure is also a connect error, so TLS is checked first.
pub fn classify(err: reqwest::Error) -> ClientError {
    let detail = describe_chain(&err);

    if is_tls_failure(&err) {
        ClientError::UntrustedCertificate(detail)
    } else if is_connection_failure(&err) || err.is_connect() || err.is_timeout() {
        ClientError::Unreachable(detail)
    } else {
        ClientError::Request(err)
    }
}

#[derive(Clone, Debug)]
pub struct UploadClient {
    client: Client,
    base_url: String,
}

impl UploadClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        Self::with_client(server_url, Client::builder().build()?)
    }

    /// Client that additionally trusts the given PEM certificate, e.g. the
    /// receiver's locally generated one.
    pub fn with_trusted_certificate(server_url: &str, pem: &[u8]) -> Result<Self, ClientError> {
        let certificate = Certificate::from_pem(pem)?;
        let client = Client::builder()
            .add_root_certificate(certificate)
            .build()?;
        Self::with_client(server_url, client)
    }

    fn with_client(server_url: &str, client: Client) -> Result<Self, ClientError> {
        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create client from environment: SERVER_URL and optional CA_CERT_PATH.
    pub fn from_env() -> anyhow::Result<Self> {
        let server_url = std::env::var("SERVER_URL").context("Missing SERVER_URL")?;

        match std::env::var("CA_CERT_PATH") {
            Ok(path) => {
                let pem = std::fs::read(&path)
                    .with_context(|| format!("Failed to read certificate: {}", path))?;
                Ok(Self::with_trusted_certificate(&server_url, &pem)?)
            }
            Err(_) => Ok(Self::new(&server_url)?),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a finished recording as the `video` part of one multipart POST.
    pub async fn upload_video(
        &self,
        blob: Blob,
        filename: &str,
    ) -> Result<UploadResponse, ClientError> {
        let size = blob.len();
        let mime_type = mime_essence(blob.mime_type()).to_string();

        let part = Part::bytes(blob.into_bytes())
            .file_name(filename.to_string())
            .mime_str(&mime_type)?;
        let form = Form::new()
            .part("video", part)
            .text("timestamp", iso_timestamp(Utc::now()));

        let url = self.build_url("/api/upload");
        tracing::info!(
            "Uploading {} ({:.2} MB) to {}",
            filename,
            size as f64 / 1024.0 / 1024.0,
            url
        );

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .ok()
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| NO_ERROR_DETAILS.to_string());
            return Err(ClientError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown Status").to_string(),
                body,
            });
        }

        Ok(response.json::<UploadResponse>().await?)
    }

    /// Whether `/api/health` answers with a success status.
    pub async fn check_server_connection(&self) -> bool {
        let result = self
            .client
            .get(self.build_url("/api/health"))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!("Connection check failed: {}", describe_chain(&e));
                false
            }
        }
    }
}
