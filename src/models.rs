use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// ISO 8601 in UTC with millisecond precision, e.g. `2024-05-01T10:20:30.123Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A video persisted in the uploads directory. Created once per completed
/// upload and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct StoredVideo {
    pub filename: String,
    pub original_name: String,
    pub size: u64,
    pub path: PathBuf,
    /// Capture time as sent by the client, free-form.
    pub timestamp: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub video: UploadedVideo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedVideo {
    pub filename: String,
    pub size: u64,
    pub timestamp: String,
}

impl From<&StoredVideo> for UploadedVideo {
    fn from(video: &StoredVideo) -> Self {
        Self {
            filename: video.filename.clone(),
            size: video.size,
            timestamp: video.timestamp.clone(),
        }
    }
}

/// One entry of the uploads directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEntry {
    pub filename: String,
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoListResponse {
    pub count: usize,
    pub videos: Vec<VideoEntry>,
}
