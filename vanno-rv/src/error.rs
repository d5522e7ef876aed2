//! Error types for the researcher view
//!
//! `AnalysisError` covers everything that can stop a chart or clustering run
//! for one video. `ApiError` is what handlers return; it owns the mapping to
//! HTTP status codes.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::access::AccessDenied;

/// Failure of one analysis run
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Nothing has been recorded for the video yet
    #[error("no ratings recorded for video {video_id}")]
    NoData { video_id: String },

    /// A stored record is missing a field or holds an uncastable value
    #[error("malformed rating data in row {row}, column '{column}': {reason}")]
    MalformedData {
        row: usize,
        column: String,
        reason: String,
    },

    /// Not a single participant left with a usable series
    #[error("video {video_id} has {usable} usable rating series")]
    InsufficientSeries { video_id: String, usable: usize },

    /// The rating extent needs a longer chart grid than allowed
    #[error("ratings of video {video_id} extend to {max_t}s, too long to chart")]
    ExtentTooLarge { video_id: String, max_t: f64 },

    /// The event store failed
    #[error("event store error: {0}")]
    Store(#[from] vanno_common::Error),
}

impl AnalysisError {
    pub fn malformed(row: usize, column: &str, reason: impl Into<String>) -> Self {
        AnalysisError::MalformedData {
            row,
            column: column.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag used in API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::NoData { .. } => "no_data",
            AnalysisError::MalformedData { .. } => "malformed_data",
            AnalysisError::InsufficientSeries { .. } => "insufficient_series",
            AnalysisError::ExtentTooLarge { .. } => "extent_too_large",
            AnalysisError::Store(_) => "store",
        }
    }
}

/// Errors returned by HTTP handlers
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Common(vanno_common::Error),
    BadRequest(String),
    Redirect(AccessDenied),
}

impl From<AnalysisError> for ApiError {
    fn from(e: AnalysisError) -> Self {
        ApiError::Analysis(e)
    }
}

impl From<vanno_common::Error> for ApiError {
    fn from(e: vanno_common::Error) -> Self {
        ApiError::Common(e)
    }
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self {
        ApiError::Redirect(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::Redirect(denied) => {
                return (
                    StatusCode::SEE_OTHER,
                    [(header::LOCATION, denied.location.clone())],
                    Json(json!({
                        "error": denied.message,
                        "kind": "redirect",
                        "location": denied.location,
                    })),
                )
                    .into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg),
            ApiError::Analysis(e) => {
                let status = match &e {
                    AnalysisError::NoData { .. } => StatusCode::NOT_FOUND,
                    AnalysisError::MalformedData { .. } => {
                        warn!("{}", e);
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    AnalysisError::InsufficientSeries { .. }
                    | AnalysisError::ExtentTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    AnalysisError::Store(_) => {
                        error!("{}", e);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.kind(), e.to_string())
            }
            ApiError::Common(e) => match e {
                vanno_common::Error::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "invalid_input", msg)
                }
                vanno_common::Error::NotFound(msg) => {
                    (StatusCode::NOT_FOUND, "not_found", format!("Not found: {}", msg))
                }
                other => {
                    error!("Request failed: {}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal", other.to_string())
                }
            },
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
