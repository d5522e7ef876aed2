//! Video and slider configuration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vanno_common::registry::{SliderDefinition, SliderKind, VideoEntry};

use crate::access::{assert_role_not, Role, Viewer, HOME_LOCATION};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddVideoRequest {
    /// Numeric id or video URL
    pub video: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<VideoEntry>,
    /// Video shown to participants by default
    pub default: Option<VideoEntry>,
}

#[derive(Debug, Serialize)]
pub struct SliderListResponse {
    pub sliders: Vec<SliderDefinition>,
    pub variables: Vec<String>,
}

/// GET /api/videos
pub async fn list_videos(State(state): State<AppState>) -> Json<VideoListResponse> {
    let videos = state.videos.read().await;
    Json(VideoListResponse {
        videos: videos.list().to_vec(),
        default: videos.first().cloned(),
    })
}

/// POST /api/videos
pub async fn add_video(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<AddVideoRequest>,
) -> Result<(StatusCode, Json<VideoEntry>), ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;
    let entry = state.videos.write().await.add(&request.video, &request.name)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// DELETE /api/videos/:id
pub async fn remove_video(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;
    if state.videos.write().await.remove(&id)? {
        Ok(Json(json!({ "removed": id })))
    } else {
        Err(vanno_common::Error::NotFound(format!("video {}", id)).into())
    }
}

/// GET /api/sliders
pub async fn list_sliders(State(state): State<AppState>) -> Json<SliderListResponse> {
    let sliders = state.sliders.read().await;
    Json(SliderListResponse {
        sliders: sliders.list().to_vec(),
        variables: sliders.variable_names().into_iter().map(str::to_string).collect(),
    })
}

/// POST /api/sliders
///
/// Body is a tagged slider, e.g.
/// `{"kind": "one_dimensional", "min": 0, "max": 100, "default": 50, "name": "valence"}`.
pub async fn add_slider(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(kind): Json<SliderKind>,
) -> Result<(StatusCode, Json<SliderDefinition>), ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let slider = match kind {
        SliderKind::OneDimensional {
            min,
            max,
            default,
            name,
        } => SliderDefinition::one_dimensional(min, max, default, &name)?,
        SliderKind::TwoDimensional {
            min,
            min2,
            max,
            max2,
            default,
            default2,
            name,
            name2,
        } => SliderDefinition::two_dimensional(min, min2, max, max2, default, default2, &name, &name2)?,
    };

    state.sliders.write().await.add(slider.clone())?;
    Ok((StatusCode::CREATED, Json(slider)))
}

/// DELETE /api/sliders/:name
pub async fn remove_slider(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;
    if state.sliders.write().await.remove(&name)? {
        Ok(Json(json!({ "removed": name })))
    } else {
        Err(vanno_common::Error::NotFound(format!("slider {}", name)).into())
    }
}
