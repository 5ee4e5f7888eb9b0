use serde::Deserialize;
use std::path::PathBuf;

/// Extra room on top of the per-file limit for multipart boundaries and the
/// text fields that travel alongside the video.
const MULTIPART_OVERHEAD_MB: u64 = 10;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,

    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,

    // Locally generated certificate pair. Both must be set to serve HTTPS.
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,

    #[serde(default = "default_server_name")]
    pub server_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_max_file_size() -> u64 {
    100
}

fn default_server_name() -> String {
    "Cricket CV Server".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            uploads_dir: default_uploads_dir(),
            max_file_size_mb: default_max_file_size(),
            tls_cert_path: None,
            tls_key_path: None,
            server_name: default_server_name(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    /// Saturates instead of wrapping for absurdly large limits.
    pub fn max_request_body_bytes(&self) -> usize {
        let bytes = self
            .max_file_size_mb
            .saturating_add(MULTIPART_OVERHEAD_MB)
            .saturating_mul(1024 * 1024);
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Certificate and key paths, if HTTPS is configured.
    pub fn tls_paths(&self) -> Option<(&PathBuf, &PathBuf)> {
        match (&self.tls_cert_path, &self.tls_key_path) {
            (Some(cert), Some(key)) => Some((cert, key)),
            _ => None,
        }
    }

    pub fn running_message(&self) -> String {
        format!("{} is running", self.server_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_receiver_contract() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5001);
        assert_eq!(config.max_file_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.max_request_body_bytes(), 110 * 1024 * 1024);
        assert!(config.tls_paths().is_none());
    }

    #[test]
    fn huge_limits_saturate() {
        let config = Config {
            max_file_size_mb: u64::MAX / 1024,
            ..Config::default()
        };
        assert_eq!(config.max_file_size_bytes(), u64::MAX);
        assert_eq!(config.max_request_body_bytes(), usize::MAX);

        let config = Config {
            max_file_size_mb: u64::MAX,
            ..Config::default()
        };
        assert_eq!(config.max_request_body_bytes(), usize::MAX);
    }

    #[test]
    fn tls_requires_both_paths() {
        let mut config = Config {
            tls_cert_path: Some(PathBuf::from("cert.pem")),
            ..Config::default()
        };
        assert!(config.tls_paths().is_none());

        config.tls_key_path = Some(PathBuf::from("key.pem"));
        let (cert, key) = config.tls_paths().unwrap();
        assert_eq!(cert, &PathBuf::from("cert.pem"));
        assert_eq!(key, &PathBuf::from("key.pem"));
    }
}
