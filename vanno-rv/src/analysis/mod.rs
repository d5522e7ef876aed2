//! Rating analysis: normalization, resampling, charts and clustering
//!
//! Data flows store -> `normalize` -> `resample` -> {`plot`, `cluster`}.
//! `pipeline` wires the stages together per request.

pub mod cluster;
pub mod interpolate;
pub mod normalize;
pub mod pipeline;
pub mod plot;
pub mod resample;

pub use cluster::{ClusterParams, ClusterReport, Clustering, KAdjustment};
pub use interpolate::MonotoneInterpolator;
pub use normalize::{normalize, normalize_within, RatingTable};
pub use pipeline::{AnalysisDefaults, ChartRequest, ClusterRequest};
pub use plot::ChartData;
pub use resample::{resample, ExtentPolicy, ResampledSet};
