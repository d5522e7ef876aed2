//! Data management endpoints

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vanno_common::db::EventFilter;

use crate::access::{assert_role_not, Role, Viewer, HOME_LOCATION};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub label: String,
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct DatabaseListResponse {
    pub active: String,
    pub databases: Vec<DatabaseInfo>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchDatabaseRequest {
    pub name: String,
}

/// POST /api/admin/delete_all
///
/// Removes every rating of the active database and drops all cached results.
pub async fn delete_all(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<DeleteAllResponse>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let store = state.active_store().await;
    let deleted = store.delete_matching(&EventFilter::all()).await?;
    state.cache.clear().await;

    warn!("Deleted all {} ratings from {}", deleted, store.describe());
    Ok(Json(DeleteAllResponse { deleted }))
}

/// GET /api/admin/databases
pub async fn list_databases(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<DatabaseListResponse>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let active = state.active_database().await;
    let databases = state
        .config
        .databases
        .iter()
        .map(|(name, profile)| DatabaseInfo {
            name: name.clone(),
            label: profile.label.clone(),
            active: *name == active,
        })
        .collect();

    Ok(Json(DatabaseListResponse { active, databases }))
}

/// POST /api/admin/database
pub async fn switch_database(
    State(state): State<AppState>,
    viewer: Viewer,
    Json(request): Json<SwitchDatabaseRequest>,
) -> Result<Json<DatabaseListResponse>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    state.switch_database(&request.name).await?;
    info!("Database switched to '{}' by request", request.name);

    list_databases(State(state), viewer).await
}
