use crate::models::{iso_timestamp, StoredVideo, UploadResponse, UploadedVideo};
use crate::storage::VideoWriter;
use crate::{AppError, AppState, Result};
use axum::{
    extract::{multipart::MultipartError, multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

const VIDEO_FIELD: &str = "video";
const TIMESTAMP_FIELD: &str = "timestamp";
const MISSING_VIDEO: &str = "No video file uploaded";

struct IncomingVideo {
    writer: VideoWriter,
    original_name: String,
}

fn field_error(max_mb: u64) -> impl Fn(MultipartError) -> AppError {
    move |e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::FileTooLarge(max_mb)
        } else {
            AppError::Validation(format!("Failed to read form field: {}", e))
        }
    }
}

/// `POST /api/upload`: stream the `video` part into the uploads directory.
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Upload without a multipart body: {}", e);
        AppError::Validation(MISSING_VIDEO.to_string())
    })?;

    let received_at = Utc::now();
    let mut video: Option<IncomingVideo> = None;
    let mut timestamp: Option<String> = None;

    if let Err(e) = read_form(
        &state,
        &mut multipart,
        received_at,
        &mut video,
        &mut timestamp,
    )
    .await
    {
        if let Some(incoming) = video.take() {
            incoming.writer.discard().await;
        }
        return Err(e);
    }

    let Some(IncomingVideo {
        writer,
        original_name,
    }) = video
    else {
        return Err(AppError::Validation(MISSING_VIDEO.to_string()));
    };

    let filename = writer.filename().to_string();
    let path = writer.path().to_path_buf();
    let size = writer.finish().await?;

    let stored = StoredVideo {
        filename,
        original_name,
        size,
        path,
        timestamp: timestamp.unwrap_or_else(|| iso_timestamp(received_at)),
        uploaded_at: received_at,
    };

    tracing::info!(
        "Video received: {} (original: {:?}, captured: {}, received: {})",
        stored.filename,
        stored.original_name,
        stored.timestamp,
        iso_timestamp(stored.uploaded_at)
    );
    tracing::info!(
        "Size: {:.2} MB, saved to: {}",
        stored.size as f64 / 1024.0 / 1024.0,
        stored.path.display()
    );

    Ok(Json(UploadResponse {
        success: true,
        message: "Video uploaded successfully".to_string(),
        video: UploadedVideo::from(&stored),
    }))
}

async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    received_at: DateTime<Utc>,
    video: &mut Option<IncomingVideo>,
    timestamp: &mut Option<String>,
) -> Result<()> {
    let max_mb = state.config.max_file_size_mb;
    let max_size = state.config.max_file_size_bytes();

    while let Some(mut field) = multipart.next_field().await.map_err(field_error(max_mb))? {
        let name = field.name().unwrap_or("").to_string();
        tracing::debug!("Processing field: {}", name);

        match name.as_str() {
            VIDEO_FIELD if field.file_name().is_none() => {
                tracing::debug!("Ignoring {} field without a filename", VIDEO_FIELD);
            }
            VIDEO_FIELD => {
                if video.is_some() {
                    return Err(AppError::Validation(format!(
                        "Unexpected field: {}",
                        VIDEO_FIELD
                    )));
                }

                let original_name = field.file_name().unwrap_or_default().to_string();
                let writer =
                    VideoWriter::create(&state.config.uploads_dir, received_at, &original_name)
                        .await?;
                let incoming = video.insert(IncomingVideo {
                    writer,
                    original_name,
                });

                while let Some(chunk) = field.chunk().await.map_err(field_error(max_mb))? {
                    if incoming.writer.size() + chunk.len() as u64 > max_size {
                        return Err(AppError::FileTooLarge(max_mb));
                    }
                    incoming.writer.write_chunk(&chunk).await?;
                }
            }
            TIMESTAMP_FIELD => {
                let value = field.text().await.map_err(field_error(max_mb))?;
                *timestamp = Some(value).filter(|s| !s.trim().is_empty());
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", name);
            }
        }
    }

    Ok(())
}
