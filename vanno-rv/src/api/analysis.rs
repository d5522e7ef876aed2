//! Chart and cluster endpoints of the researcher view

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::access::{assert_role_not, Role, Viewer, HOME_LOCATION};
use crate::analysis::pipeline::{self, ChartRequest, ClusterRequest};
use crate::analysis::{ChartData, ClusterReport, ExtentPolicy};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    /// Variable to plot
    pub var: Option<String>,
    /// `global` (default) or `per_user`
    pub extent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub k: Option<i64>,
    pub var: Option<String>,
    /// Pin the RNG seed for a reproducible clustering
    pub seed: Option<u64>,
}

/// GET /api/chart/:video_id
pub async fn get_chart(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(video_id): Path<String>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<Arc<ChartData>>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let extent = query
        .extent
        .as_deref()
        .map(str::parse::<ExtentPolicy>)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let request = ChartRequest {
        video_id,
        variable: non_empty(query.var),
        extent,
    };

    let store = state.active_store().await;
    let chart = pipeline::chart(store.as_ref(), &state.cache, &request, &state.defaults).await?;
    Ok(Json(chart))
}

/// GET /api/clusters/:video_id
pub async fn get_clusters(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(video_id): Path<String>,
    Query(query): Query<ClusterQuery>,
) -> Result<Json<Arc<ClusterReport>>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let request = ClusterRequest {
        video_id,
        variable: non_empty(query.var),
        k: query.k,
        seed: query.seed,
    };

    let store = state.active_store().await;
    let report =
        pipeline::clusters(store.as_ref(), &state.cache, &request, &state.defaults).await?;
    Ok(Json(report))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
