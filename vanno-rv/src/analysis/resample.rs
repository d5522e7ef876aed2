//! Per-user series building and resampling
//!
//! Rows are grouped into one series per participant. Under the global extent
//! policy every series is padded with the neutral value so that all of them
//! cover the same time range, which is what makes them comparable pointwise.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use super::interpolate::MonotoneInterpolator;
use super::normalize::RatingTable;
use crate::error::AnalysisError;

/// Time range each resampled series covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtentPolicy {
    /// All series padded to `[0, floor(max_t) + 1]`
    #[default]
    Global,
    /// Each series keeps its own observed range
    PerUser,
}

impl FromStr for ExtentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(ExtentPolicy::Global),
            "per_user" | "per-user" | "peruser" => Ok(ExtentPolicy::PerUser),
            other => Err(format!("unknown extent '{}'", other)),
        }
    }
}

impl fmt::Display for ExtentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtentPolicy::Global => write!(f, "global"),
            ExtentPolicy::PerUser => write!(f, "per_user"),
        }
    }
}

/// One participant's series and its interpolator
#[derive(Debug, Clone)]
pub struct UserCurve {
    pub username: String,
    /// Observed points, duplicates merged
    pub raw: Vec<(f64, f64)>,
    /// Points the interpolator was built from
    pub padded: Vec<(f64, f64)>,
    pub interpolator: MonotoneInterpolator,
}

/// Every usable series of one video
#[derive(Debug, Clone)]
pub struct ResampledSet {
    pub video_id: String,
    pub variable: String,
    pub policy: ExtentPolicy,
    pub neutral: f64,
    /// Latest observed timestamp over all retained users
    pub max_t: f64,
    /// Sorted by username
    pub users: Vec<UserCurve>,
    /// Users excluded for having fewer than 2 distinct timestamps
    pub dropped: Vec<String>,
}

impl ResampledSet {
    /// Last grid point of the global extent
    pub fn global_end(&self) -> f64 {
        self.max_t.floor() + 1.0
    }
}

/// Build one interpolated series per user from a normalized table
pub fn resample(
    table: &RatingTable,
    variable: &str,
    policy: ExtentPolicy,
    neutral: f64,
) -> Result<ResampledSet, AnalysisError> {
    let mut grouped: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for row in &table.rows {
        match row.value(variable) {
            Some(value) => grouped
                .entry(row.username.as_str())
                .or_default()
                .push((row.timestamp, value)),
            None => debug!(
                "Row {} has no numeric '{}', skipped",
                row.source_index, variable
            ),
        }
    }

    let mut series: Vec<(String, Vec<(f64, f64)>)> = Vec::new();
    let mut dropped = Vec::new();
    for (username, points) in grouped {
        let points = merge_duplicates(points);
        if points.len() < 2 {
            debug!(
                "Dropping user {} from video {}: {} distinct timestamp(s)",
                username,
                table.video_id,
                points.len()
            );
            dropped.push(username.to_string());
        } else {
            series.push((username.to_string(), points));
        }
    }

    if series.is_empty() {
        return Err(AnalysisError::InsufficientSeries {
            video_id: table.video_id.clone(),
            usable: 0,
        });
    }

    let max_t = series
        .iter()
        .filter_map(|(_, points)| points.last().map(|p| p.0))
        .fold(0.0, f64::max);

    let mut users = Vec::with_capacity(series.len());
    for (username, raw) in series {
        let padded = match policy {
            ExtentPolicy::Global => pad_to_extent(&raw, max_t, neutral),
            ExtentPolicy::PerUser => raw.clone(),
        };
        match MonotoneInterpolator::from_points(&padded) {
            Ok(interpolator) => users.push(UserCurve {
                username,
                raw,
                padded,
                interpolator,
            }),
            Err(e) => {
                warn!("Dropping user {}: {}", username, e);
                dropped.push(username);
            }
        }
    }

    if users.is_empty() {
        return Err(AnalysisError::InsufficientSeries {
            video_id: table.video_id.clone(),
            usable: 0,
        });
    }

    Ok(ResampledSet {
        video_id: table.video_id.clone(),
        variable: variable.to_string(),
        policy,
        neutral,
        max_t,
        users,
        dropped,
    })
}

/// Sort by timestamp and average values sharing a timestamp
fn merge_duplicates(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<(f64, f64, usize)> = Vec::with_capacity(points.len());
    for (t, v) in points {
        match merged.last_mut() {
            Some((last_t, sum, count)) if *last_t == t => {
                *sum += v;
                *count += 1;
            }
            _ => merged.push((t, v, 1)),
        }
    }

    merged
        .into_iter()
        .map(|(t, sum, count)| (t, sum / count as f64))
        .collect()
}

/// Pad a series with the neutral value at 0 and `max_t`, then move the final
/// point to the display end `floor(last) + 1`
fn pad_to_extent(raw: &[(f64, f64)], max_t: f64, neutral: f64) -> Vec<(f64, f64)> {
    let mut padded = Vec::with_capacity(raw.len() + 2);
    if raw.first().map(|p| p.0) != Some(0.0) {
        padded.push((0.0, neutral));
    }
    padded.extend_from_slice(raw);
    if raw.last().map(|p| p.0) != Some(max_t) {
        padded.push((max_t, neutral));
    }
    if let Some(last) = padded.last_mut() {
        last.0 = last.0.floor() + 1.0;
    }
    padded
}
