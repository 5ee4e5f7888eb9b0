//! Uploads directory: naming, persistence and enumeration of stored videos.
//!
//! The directory is flat and append-only. Files are only ever created, with
//! exclusive-create semantics, so concurrent uploads never need a lock and
//! never overwrite one another.

use crate::models::VideoEntry;
use crate::{AppError, Result};
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

pub const FILENAME_PREFIX: &str = "bowling";
pub const DEFAULT_EXTENSION: &str = "webm";
pub const VIDEO_EXTENSIONS: &[&str] = &[".webm", ".mp4"];

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Extension of the client-supplied filename, or the default container when
/// there is none usable.
pub fn extract_ext(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_EXTENSION)
        .to_string()
}

/// ISO 8601 with `:` and `.` replaced by `-`, e.g. `2024-05-01T10-20-30-123Z`.
pub fn filename_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

fn build_name(stem: &str, attempt: u32, ext: &str) -> String {
    if attempt == 0 {
        format!("{}.{}", stem, ext)
    } else {
        format!("{}-{}.{}", stem, attempt, ext)
    }
}

pub fn is_video_file(filename: &str) -> bool {
    VIDEO_EXTENSIONS.iter().any(|ext| filename.ends_with(ext))
}

pub async fn ensure_uploads_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir).await
}

/// A video file being streamed into the uploads directory.
#[derive(Debug)]
pub struct VideoWriter {
    filename: String,
    path: PathBuf,
    size: u64,
    file: Option<File>,
    keep: bool,
}

impl VideoWriter {
    /// Create a new file for an upload received at `at`.
    ///
    /// When the timestamped name is taken, a `-1`, `-2`, ... suffix is
    /// appended before the extension until an unused name is found.
    pub async fn create(dir: &Path, at: DateTime<Utc>, original_filename: &str) -> Result<Self> {
        let stem = format!("{}-{}", FILENAME_PREFIX, filename_timestamp(at));
        let ext = extract_ext(original_filename);

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = build_name(&stem, attempt, &ext);
            let path = dir.join(&filename);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    if attempt > 0 {
                        tracing::debug!("Name collision resolved with suffix {}", attempt);
                    }
                    return Ok(Self {
                        filename,
                        path,
                        size: 0,
                        file: Some(file),
                        keep: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(AppError::Upload(format!(
                        "Failed to create {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(AppError::Upload(format!(
            "No free filename for {} after {} attempts",
            stem, MAX_NAME_ATTEMPTS
        )))
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| AppError::Upload("Video file already closed".to_string()))?;
        file.write_all(data)
            .await
            .map_err(|e| AppError::Upload(format!("Failed to write video: {}", e)))?;
        self.size += data.len() as u64;
        Ok(())
    }

    /// Flush and close the file, returning its final size.
    pub async fn finish(mut self) -> Result<u64> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| AppError::Upload(format!("Failed to flush video: {}", e)))?;
            file.sync_all()
                .await
                .map_err(|e| AppError::Upload(format!("Failed to sync video: {}", e)))?;
        }
        self.keep = true;
        Ok(self.size)
    }

    /// Close and remove a partially written file.
    pub async fn discard(mut self) {
        drop(self.file.take());
        self.keep = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove partial upload {:?}: {}", self.path, e);
        }
    }
}

// Covers handlers dropped mid-stream, e.g. when the client disconnects.
impl Drop for VideoWriter {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        drop(self.file.take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::warn!("Removed abandoned upload {:?}", self.path),
            Err(e) => tracing::warn!("Failed to remove abandoned upload {:?}: {}", self.path, e),
        }
    }
}

/// Videos in `dir`, newest first by creation time.
///
/// Creation time falls back to modification time on filesystems that do not
/// record it.
pub async fn list_videos(dir: &Path) -> Result<Vec<VideoEntry>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| AppError::Listing(format!("Failed to read {}: {}", dir.display(), e)))?;

    let mut videos = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::Listing(format!("Failed to read {}: {}", dir.display(), e)))?
    {
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !is_video_file(&filename) {
            continue;
        }

        let metadata = entry
            .metadata()
            .await
            .map_err(|e| AppError::Listing(format!("Failed to stat {}: {}", filename, e)))?;
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .map_err(|e| AppError::Listing(format!("Failed to stat {}: {}", filename, e)))?;
        let created = metadata.created().unwrap_or(modified);

        videos.push(VideoEntry {
            filename,
            size: metadata.len(),
            created: DateTime::<Utc>::from(created),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    videos.sort_by(|a, b| {
        b.created
            .cmp(&a.created)
            .then_with(|| b.filename.cmp(&a.filename))
    });

    Ok(videos)
}
