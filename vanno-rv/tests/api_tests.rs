//! Integration tests for vanno-rv API endpoints
//!
//! Tests cover:
//! - Health endpoint (no role required)
//! - Participant saves and cache invalidation
//! - Role redirects on researcher endpoints
//! - Charts, clusters and exports
//! - Video and slider registries
//! - Database listing, switching and bulk delete

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use vanno_common::config::TomlConfig;
use vanno_common::db::{EventStore, MemoryEventStore};
use vanno_common::registry::{SliderRegistry, VideoRegistry};
use vanno_rv::access::{ROLE_HEADER, USER_HEADER};
use vanno_rv::{build_router, ActiveStore, AppState};

/// Test helper: App state on an in-memory store with registries in a temp dir
fn setup_state(root: &TempDir) -> AppState {
    let config = TomlConfig::default();
    let videos = VideoRegistry::load(&config.videos_path(root.path())).unwrap();
    let sliders = SliderRegistry::load(&config.sliders_path(root.path())).unwrap();
    AppState::new(
        config,
        root.path().to_path_buf(),
        ActiveStore::new("local", Arc::new(MemoryEventStore::new())),
        videos,
        sliders,
    )
}

/// Test helper: Request with optional role and display name headers
fn test_request(method: &str, uri: &str, role: Option<&str>, user: Option<&str>) -> Request<Body> {
    json_request(method, uri, role, user, None)
}

fn json_request(
    method: &str,
    uri: &str,
    role: Option<&str>,
    user: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        builder = builder.header(ROLE_HEADER, role);
    }
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

/// Test helper: Store one rating as participant `user`
async fn save(state: &AppState, user: &str, video: &str, timestamp: f64, value: f64) {
    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/ratings",
            Some("user"),
            Some(user),
            Some(json!({
                "video_id": video,
                "timestamp": timestamp,
                "names": ["value"],
                "values": [value],
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

async fn seed_scenario(state: &AppState) {
    save(state, "A", "42", 0.0, 50.0).await;
    save(state, "A", "42", 10.0, 80.0).await;
    save(state, "B", "42", 2.0, 30.0).await;
    save(state, "B", "42", 8.0, 60.0).await;
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_role_required() {
    let root = TempDir::new().unwrap();
    let app = build_router(setup_state(&root));

    let response = app
        .oneshot(test_request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vanno-rv");
    assert!(body["version"].is_string());
}

// =============================================================================
// Participant saves
// =============================================================================

#[tokio::test]
async fn test_save_without_display_name_rejected() {
    let root = TempDir::new().unwrap();
    let app = build_router(setup_state(&root));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/ratings",
            Some("user"),
            None,
            Some(json!({"video_id": "42", "timestamp": 1.0, "names": ["value"], "values": [10]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "username not set");
}

#[tokio::test]
async fn test_save_with_mismatched_values_rejected() {
    let root = TempDir::new().unwrap();
    let app = build_router(setup_state(&root));

    let response = app
        .oneshot(json_request(
            "POST",
            "/api/ratings",
            Some("user"),
            Some("A"),
            Some(json!({"video_id": "42", "timestamp": 1.0, "names": ["value", "value2"], "values": [10]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_save_beyond_max_timestamp_rejected() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    save(&state, "A", "42", 0.0, 50.0).await;

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/ratings",
            Some("user"),
            Some("A"),
            Some(json!({"video_id": "42", "timestamp": 1e20, "names": ["value"], "values": [80]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["kind"], "invalid_input");

    // Nothing was stored, so the video still has only one rating
    let stored = state.active_store().await.fetch_video("42").await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_save_2d_rating() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/ratings/2d",
            Some("user"),
            Some("A"),
            Some(json!({"video_id": "5", "timestamp": 3.5, "value": 20, "value2": 70})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "saved");
    assert_eq!(body["video_id"], "5");

    let stored = state.active_store().await.fetch_video("5").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0]["value2"], json!(70.0));
}

// =============================================================================
// Role redirects
// =============================================================================

#[tokio::test]
async fn test_participant_redirected_from_researcher_pages() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);

    for uri in ["/api/chart/42", "/api/clusters/42", "/api/export", "/api/admin/databases"] {
        for role in [None, Some("user")] {
            let response = build_router(state.clone())
                .oneshot(test_request("GET", uri, role, Some("A")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", uri);
            assert_eq!(response.headers()[header::LOCATION], "/");
        }
    }
}

#[tokio::test]
async fn test_test_role_may_view_charts() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/chart/42", Some("test"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Charts and clusters
// =============================================================================

#[tokio::test]
async fn test_chart_for_saved_ratings() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/chart/42", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["video_id"], "42");
    assert_eq!(body["variable"], "value");
    assert_eq!(body["lines"].as_array().unwrap().len(), 2);
    assert_eq!(body["lines"][0]["label"], "A");
    assert_eq!(body["lines"][0]["x"].as_array().unwrap().len(), 12);
    assert_eq!(body["mean"]["label"], "mean");
}

#[tokio::test]
async fn test_chart_reflects_new_rating() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let chart = |state: AppState| async move {
        let response = build_router(state)
            .oneshot(test_request("GET", "/api/chart/42", Some("researcher"), None))
            .await
            .unwrap();
        extract_json(response.into_body()).await
    };

    assert_eq!(chart(state.clone()).await["lines"].as_array().unwrap().len(), 2);

    save(&state, "C", "42", 1.0, 10.0).await;
    save(&state, "C", "42", 5.0, 20.0).await;

    assert_eq!(chart(state.clone()).await["lines"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_chart_per_user_extent() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request(
            "GET",
            "/api/chart/42?extent=per_user",
            Some("researcher"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["mean"].is_null());
    // B is only drawn over its own support [2, 8]
    let b_x = body["lines"][1]["x"].as_array().unwrap();
    assert_eq!(b_x.first().unwrap().as_f64(), Some(2.0));
}

#[tokio::test]
async fn test_chart_bad_extent_rejected() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request(
            "GET",
            "/api/chart/42?extent=sideways",
            Some("researcher"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chart_unknown_video_not_found() {
    let root = TempDir::new().unwrap();
    let app = build_router(setup_state(&root));

    let response = app
        .oneshot(test_request("GET", "/api/chart/999", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["kind"], "no_data");
}

#[tokio::test]
async fn test_chart_single_point_series_is_insufficient() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    save(&state, "A", "3", 4.0, 40.0).await;

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/chart/3", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["kind"], "insufficient_series");
}

#[tokio::test]
async fn test_clusters_with_pinned_seed() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request(
            "GET",
            "/api/clusters/42?k=2&seed=7",
            Some("researcher"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["effective_k"], 2);
    assert_eq!(body["seed"], 7);
    let clusters = body["clusters"].as_array().unwrap();
    assert_eq!(clusters.len(), 2);
    for cluster in clusters {
        assert_eq!(cluster["n"], 1);
        assert!(cluster["label"].as_str().unwrap().starts_with("C#"));
    }
}

// =============================================================================
// Export
// =============================================================================

#[tokio::test]
async fn test_export_csv() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/export", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/csv"));
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("vanno_ratings_"));

    let csv = extract_text(response.into_body()).await;
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "video_id,username,timestamp,value,date");
    assert_eq!(lines.len(), 5);
}

#[tokio::test]
async fn test_export_json() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/export/json", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["objects"].as_array().unwrap().len(), 4);
}

// =============================================================================
// Registries
// =============================================================================

#[tokio::test]
async fn test_video_registry_round_trip() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/videos",
            Some("researcher"),
            None,
            Some(json!({"video": "https://vimeo.com/76979871", "name": "Timelapse"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["id"], "76979871");

    // Listing is open to participants
    let response = build_router(state.clone())
        .oneshot(test_request("GET", "/api/videos", None, None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["videos"].as_array().unwrap().len(), 1);
    assert_eq!(body["default"]["name"], "Timelapse");

    let response = build_router(state.clone())
        .oneshot(test_request("DELETE", "/api/videos/76979871", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(test_request("DELETE", "/api/videos/76979871", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_slider_registry_round_trip() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);

    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/sliders",
            Some("researcher"),
            None,
            Some(json!({
                "kind": "one_dimensional",
                "min": 0, "max": 100, "default": 50,
                "name": "valence"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Inverted range
    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/sliders",
            Some("researcher"),
            None,
            Some(json!({
                "kind": "one_dimensional",
                "min": 100, "max": 0, "default": 50,
                "name": "arousal"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = build_router(state.clone())
        .oneshot(test_request("GET", "/api/sliders", None, None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["variables"], json!(["valence"]));

    let written = std::fs::read_to_string(root.path().join("input_conf.txt")).unwrap();
    assert_eq!(written, "slider:0:100:50:valence\n");

    let response = build_router(state)
        .oneshot(test_request("DELETE", "/api/sliders/valence", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Data management
// =============================================================================

#[tokio::test]
async fn test_delete_all() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state.clone())
        .oneshot(test_request("POST", "/api/admin/delete_all", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deleted"], 4);

    let response = build_router(state)
        .oneshot(test_request("GET", "/api/chart/42", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_and_switch_database() {
    let root = TempDir::new().unwrap();
    let state = setup_state(&root);
    seed_scenario(&state).await;

    let response = build_router(state.clone())
        .oneshot(test_request("GET", "/api/admin/databases", Some("researcher"), None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["active"], "local");
    assert_eq!(body["databases"][0]["name"], "local");
    assert_eq!(body["databases"][0]["active"], true);

    // Switching opens the profile's SQLite file, which starts empty
    let response = build_router(state.clone())
        .oneshot(json_request(
            "POST",
            "/api/admin/database",
            Some("researcher"),
            None,
            Some(json!({"name": "local"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(root.path().join("vanno.db").exists());

    let response = build_router(state.clone())
        .oneshot(test_request("GET", "/api/chart/42", Some("researcher"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = build_router(state)
        .oneshot(json_request(
            "POST",
            "/api/admin/database",
            Some("researcher"),
            None,
            Some(json!({"name": "nope"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
