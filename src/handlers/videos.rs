use crate::models::VideoListResponse;
use crate::{storage, AppState, Result};
use axum::{extract::State, Json};
use std::sync::Arc;

/// `GET /api/videos`: stored videos, newest first.
pub async fn list_videos(State(state): State<Arc<AppState>>) -> Result<Json<VideoListResponse>> {
    let videos = storage::list_videos(&state.config.uploads_dir).await?;

    Ok(Json(VideoListResponse {
        count: videos.len(),
        videos,
    }))
}
