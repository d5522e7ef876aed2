//! Participant save endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vanno_common::RatingEvent;

use crate::access::Viewer;
use crate::error::ApiError;
use crate::AppState;

/// One slider reading (or several, for multi-slider pages)
#[derive(Debug, Deserialize)]
pub struct SaveRatingRequest {
    pub video_id: String,
    /// Playback position in seconds
    pub timestamp: f64,
    pub date: Option<String>,
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

/// One 2D slider reading
#[derive(Debug, Deserialize)]
pub struct Save2dRatingRequest {
    pub video_id: String,
    pub timestamp: f64,
    pub date: Option<String>,
    pub value: f64,
    pub value2: f64,
}

#[derive(Debug, Serialize)]
pub struct SaveRatingResponse {
    pub status: String,
    pub video_id: String,
}

/// POST /api/ratings
pub async fn save_rating(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<SaveRatingRequest>,
) -> Result<(StatusCode, Json<SaveRatingResponse>), ApiError> {
    let username = require_display_name(&viewer)?;
    let event = RatingEvent::from_submission(
        &request.video_id,
        username,
        request.timestamp,
        &request.names,
        &request.values,
        request.date,
    )?;
    store_event(&state, event).await
}

/// POST /api/ratings/2d
pub async fn save_rating_2d(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<Save2dRatingRequest>,
) -> Result<(StatusCode, Json<SaveRatingResponse>), ApiError> {
    let username = require_display_name(&viewer)?;
    let event = RatingEvent::from_submission(
        &request.video_id,
        username,
        request.timestamp,
        &["value".to_string(), "value2".to_string()],
        &[request.value, request.value2],
        request.date,
    )?;
    store_event(&state, event).await
}

fn require_display_name(viewer: &Viewer) -> Result<&str, ApiError> {
    viewer
        .display_name
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("username not set".to_string()))
}

async fn store_event(
    state: &AppState,
    event: RatingEvent,
) -> Result<(StatusCode, Json<SaveRatingResponse>), ApiError> {
    event.check_timestamp_limit(state.config.analysis.max_timestamp)?;
    let store = state.active_store().await;
    store.insert(&event).await?;
    state.cache.invalidate(&event.video_id).await;
    debug!(
        "Stored rating of {} for video {} at {}s",
        event.username, event.video_id, event.timestamp
    );

    Ok((
        StatusCode::CREATED,
        Json(SaveRatingResponse {
            status: "saved".to_string(),
            video_id: event.video_id,
        }),
    ))
}
