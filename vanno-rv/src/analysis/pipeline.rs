//! Chart and clustering runs for one video
//!
//! Each run reads a full snapshot of the video's ratings from the store it is
//! handed and recomputes from scratch. Only the default view is cached; any
//! request that changes the variable, extent, cluster count or seed bypasses
//! the cache in both directions.

use std::sync::Arc;
use tracing::{debug, info};
use vanno_common::config::AnalysisConfig;
use vanno_common::db::EventStore;

use super::cluster::{cluster_curves, ClusterParams, ClusterReport};
use super::normalize::normalize_within;
use super::plot::{build_chart, resampled_matrix, ChartData};
use super::resample::{resample, ExtentPolicy};
use crate::cache::{Artifact, ArtifactKind, CacheLookup, CacheTicket, ResultCache};
use crate::error::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisDefaults {
    pub default_clusters: usize,
    pub neutral_value: f64,
    /// Stored ratings past this many seconds are malformed
    pub max_timestamp: f64,
}

impl Default for AnalysisDefaults {
    fn default() -> Self {
        Self {
            default_clusters: 3,
            neutral_value: 50.0,
            max_timestamp: 86_400.0,
        }
    }
}

impl From<&AnalysisConfig> for AnalysisDefaults {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            default_clusters: config.default_clusters,
            neutral_value: config.neutral_value,
            max_timestamp: config.max_timestamp,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartRequest {
    pub video_id: String,
    /// Variable to plot; first discovered variable when unset
    pub variable: Option<String>,
    pub extent: Option<ExtentPolicy>,
}

impl ChartRequest {
    pub fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_default_view(&self) -> bool {
        self.variable.is_none() && self.extent.unwrap_or_default() == ExtentPolicy::Global
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterRequest {
    pub video_id: String,
    pub variable: Option<String>,
    /// Requested cluster count; configured default when unset
    pub k: Option<i64>,
    pub seed: Option<u64>,
}

impl ClusterRequest {
    pub fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            ..Self::default()
        }
    }

    pub fn is_default_view(&self, defaults: &AnalysisDefaults) -> bool {
        self.variable.is_none()
            && self.seed.is_none()
            && self
                .k
                .map_or(true, |k| k == defaults.default_clusters as i64)
    }
}

/// Chart of a video's ratings
pub async fn chart(
    store: &dyn EventStore,
    cache: &ResultCache,
    request: &ChartRequest,
    defaults: &AnalysisDefaults,
) -> Result<Arc<ChartData>, AnalysisError> {
    let video_id = request.video_id.as_str();
    let mut ticket: Option<CacheTicket> = None;

    if request.is_default_view() {
        let (lookup, current) = cache.lookup_for_update(video_id, ArtifactKind::Chart).await;
        match lookup {
            CacheLookup::Fresh(artifact) => {
                if let Some(chart) = artifact.into_chart() {
                    debug!("Chart cache hit for video {}", video_id);
                    return Ok(chart);
                }
            }
            CacheLookup::Stale(_) => debug!("Chart for video {} is stale", video_id),
            CacheLookup::Missing => {}
        }
        ticket = Some(current);
    } else {
        debug!("Chart request for video {} bypasses the cache", video_id);
    }

    let records = store.fetch_video(video_id).await?;
    let table = normalize_within(
        &records,
        video_id,
        request.variable.as_deref(),
        defaults.max_timestamp,
    )?;
    let set = resample(
        &table,
        &table.selected,
        request.extent.unwrap_or_default(),
        defaults.neutral_value,
    )?;
    let chart = Arc::new(build_chart(video_id, &table, &set)?);

    info!(
        "Computed {} chart for video {}: {} series, {} dropped",
        set.policy,
        video_id,
        set.users.len(),
        set.dropped.len()
    );

    if let Some(ticket) = ticket {
        cache
            .set(video_id, Artifact::Chart(Arc::clone(&chart)), ticket)
            .await;
    }
    Ok(chart)
}

/// Clustering of a video's rating curves
///
/// Always runs on the global extent so that every curve has the same length.
pub async fn clusters(
    store: &dyn EventStore,
    cache: &ResultCache,
    request: &ClusterRequest,
    defaults: &AnalysisDefaults,
) -> Result<Arc<ClusterReport>, AnalysisError> {
    let video_id = request.video_id.as_str();
    let mut ticket: Option<CacheTicket> = None;

    if request.is_default_view(defaults) {
        let (lookup, current) = cache
            .lookup_for_update(video_id, ArtifactKind::Clusters)
            .await;
        match lookup {
            CacheLookup::Fresh(artifact) => {
                if let Some(report) = artifact.into_clusters() {
                    debug!("Cluster cache hit for video {}", video_id);
                    return Ok(report);
                }
            }
            CacheLookup::Stale(_) => debug!("Clusters for video {} are stale", video_id),
            CacheLookup::Missing => {}
        }
        ticket = Some(current);
    } else {
        debug!("Cluster request for video {} bypasses the cache", video_id);
    }

    let records = store.fetch_video(video_id).await?;
    let table = normalize_within(
        &records,
        video_id,
        request.variable.as_deref(),
        defaults.max_timestamp,
    )?;
    let set = resample(
        &table,
        &table.selected,
        ExtentPolicy::Global,
        defaults.neutral_value,
    )?;
    let (grid, curves) = resampled_matrix(video_id, &set)?;
    let labels: Vec<String> = set.users.iter().map(|u| u.username.clone()).collect();

    let params = ClusterParams {
        k: request.k.unwrap_or(defaults.default_clusters as i64),
        seed: request.seed,
        ..ClusterParams::default()
    };
    let clustering = cluster_curves(video_id, &labels, &curves, &params)?;

    info!(
        "Clustered {} series of video {} into {} clusters (seed {}, {} iterations)",
        curves.len(),
        video_id,
        clustering.effective_k,
        clustering.seed,
        clustering.iterations
    );

    let report = Arc::new(ClusterReport {
        video_id: video_id.to_string(),
        variable: set.variable.clone(),
        grid,
        clustering,
    });

    if let Some(ticket) = ticket {
        cache
            .set(video_id, Artifact::Clusters(Arc::clone(&report)), ticket)
            .await;
    }
    Ok(report)
}
