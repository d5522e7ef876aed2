//! Render-agnostic chart data
//!
//! Turns a resampled set into plain x/y series. The frontend decides how to
//! draw them.

use serde::Serialize;

use super::normalize::RatingTable;
use super::resample::{ExtentPolicy, ResampledSet};
use crate::error::AnalysisError;

/// Label of the aggregate series
pub const MEAN_LABEL: &str = "mean";

/// One named x/y series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Everything needed to draw the ratings chart of one video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub video_id: String,
    pub variable: String,
    pub variables: Vec<String>,
    pub extent: ExtentPolicy,
    pub max_t: f64,
    /// Resampled curve per user
    pub lines: Vec<Series>,
    /// Observed (unpadded) points per user
    pub points: Vec<Series>,
    /// Pointwise mean across users, global extent only
    pub mean: Option<Series>,
    pub dropped_users: Vec<String>,
}

/// Longest grid a chart is allowed to allocate
pub const MAX_GRID_POINTS: u64 = 1_000_000;

/// Whole second at or below `t` as a grid index, if it fits the grid bound
fn grid_index(t: f64) -> Option<u64> {
    let second = t.floor();
    if !second.is_finite() || second < 0.0 || second >= MAX_GRID_POINTS as f64 {
        return None;
    }
    Some(second as u64)
}

/// Integer seconds `0, 1, ..., floor(max_t) + 1`
///
/// `None` when the grid would exceed [`MAX_GRID_POINTS`].
pub fn global_grid(max_t: f64) -> Option<Vec<f64>> {
    let end = grid_index(max_t.max(0.0))?.checked_add(1)?;
    if end >= MAX_GRID_POINTS {
        return None;
    }
    Some((0..=end).map(|s| s as f64).collect())
}

/// Integer seconds inside `[start, end]`, or the two endpoints if none
pub fn support_grid(start: f64, end: f64) -> Option<Vec<f64>> {
    let first = start.ceil();
    let last = grid_index(end)?;
    if first > last as f64 {
        return Some(vec![start, end]);
    }
    let first = grid_index(first)?;
    Some((first..=last).map(|s| s as f64).collect())
}

fn too_large(video_id: &str, set: &ResampledSet) -> AnalysisError {
    AnalysisError::ExtentTooLarge {
        video_id: video_id.to_string(),
        max_t: set.max_t,
    }
}

pub fn build_chart(
    video_id: &str,
    table: &RatingTable,
    set: &ResampledSet,
) -> Result<ChartData, AnalysisError> {
    let global = global_grid(set.max_t).ok_or_else(|| too_large(video_id, set))?;

    let lines: Vec<Series> = set
        .users
        .iter()
        .map(|user| -> Result<Series, AnalysisError> {
            let grid = match set.policy {
                ExtentPolicy::Global => global.clone(),
                ExtentPolicy::PerUser => {
                    let (start, end) = user.interpolator.support();
                    support_grid(start, end).ok_or_else(|| too_large(video_id, set))?
                }
            };
            let (x, y) = grid
                .iter()
                .filter_map(|&t| user.interpolator.evaluate(t).map(|v| (t, v)))
                .unzip();
            Ok(Series {
                label: user.username.clone(),
                x,
                y,
            })
        })
        .collect::<Result<_, AnalysisError>>()?;

    let points = set
        .users
        .iter()
        .map(|user| Series {
            label: user.username.clone(),
            x: user.raw.iter().map(|p| p.0).collect(),
            y: user.raw.iter().map(|p| p.1).collect(),
        })
        .collect();

    let mean = match set.policy {
        ExtentPolicy::Global => {
            let (grid, curves) = resampled_matrix(video_id, set)?;
            Some(Series {
                label: MEAN_LABEL.to_string(),
                y: pointwise_mean(&curves, grid.len()),
                x: grid,
            })
        }
        ExtentPolicy::PerUser => None,
    };

    Ok(ChartData {
        video_id: video_id.to_string(),
        variable: set.variable.clone(),
        variables: table.variables.clone(),
        extent: set.policy,
        max_t: set.max_t,
        lines,
        points,
        mean,
        dropped_users: set.dropped.clone(),
    })
}

/// Equal-length curves on the global grid, one per user in set order
///
/// Points outside a user's support (per-user sets only) read as the neutral
/// value.
pub fn resampled_matrix(
    video_id: &str,
    set: &ResampledSet,
) -> Result<(Vec<f64>, Vec<Vec<f64>>), AnalysisError> {
    let grid = global_grid(set.max_t).ok_or_else(|| too_large(video_id, set))?;
    let curves = set
        .users
        .iter()
        .map(|user| {
            grid.iter()
                .map(|&t| user.interpolator.evaluate(t).unwrap_or(set.neutral))
                .collect()
        })
        .collect();
    Ok((grid, curves))
}

fn pointwise_mean(curves: &[Vec<f64>], len: usize) -> Vec<f64> {
    if curves.is_empty() {
        return vec![0.0; len];
    }
    (0..len)
        .map(|i| curves.iter().map(|c| c[i]).sum::<f64>() / curves.len() as f64)
        .collect()
}
