//! k-means clustering of resampled rating curves
//!
//! Whole curves are clustered with Euclidean distance, k-means++ seeding and
//! Lloyd iterations. The requested cluster count is clamped into
//! `1..=series` and the adjustment is reported rather than treated as an
//! error. Every returned cluster has at least one member.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::debug;

use crate::error::AnalysisError;

pub const DEFAULT_MAX_ITERATIONS: usize = 50;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Requested cluster count, clamped before use
    pub k: i64,
    /// Pinned RNG seed; a fresh one is drawn per call when unset
    pub seed: Option<u64>,
    pub max_iterations: usize,
    /// Stop once no centroid moves further than this
    pub tolerance: f64,
}

impl ClusterParams {
    pub fn with_k(k: i64) -> Self {
        Self {
            k,
            ..Self::default()
        }
    }
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            k: 3,
            seed: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// How the requested cluster count was changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KAdjustment {
    Unchanged,
    RaisedToOne,
    LoweredToSeriesCount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    /// 1-based, matches the label
    pub number: usize,
    pub label: String,
    pub n: usize,
    pub mu: f64,
    pub sigma: f64,
    pub sigma_sq: f64,
    pub centroid: Vec<f64>,
    /// Indices into the clustered curves
    pub members: Vec<usize>,
    pub usernames: Vec<String>,
    pub curves: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clustering {
    pub requested_k: i64,
    pub effective_k: usize,
    pub k_adjustment: KAdjustment,
    pub seed: u64,
    pub iterations: usize,
    pub clusters: Vec<Cluster>,
}

/// Clustering of one video's curves, as served to the researcher view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub video_id: String,
    pub variable: String,
    /// Shared time grid of every curve and centroid
    pub grid: Vec<f64>,
    #[serde(flatten)]
    pub clustering: Clustering,
}

/// Clamp a requested cluster count into `1..=series`
pub fn effective_k(requested: i64, series: usize) -> (usize, KAdjustment) {
    if requested <= 0 {
        (1, KAdjustment::RaisedToOne)
    } else if requested as u64 > series as u64 {
        (series, KAdjustment::LoweredToSeriesCount)
    } else {
        (requested as usize, KAdjustment::Unchanged)
    }
}

/// Cluster labelled curves of equal length
pub fn cluster_curves(
    video_id: &str,
    labels: &[String],
    curves: &[Vec<f64>],
    params: &ClusterParams,
) -> Result<Clustering, AnalysisError> {
    let n = labels.len().min(curves.len());
    if n == 0 {
        return Err(AnalysisError::InsufficientSeries {
            video_id: video_id.to_string(),
            usable: 0,
        });
    }
    let curves = &curves[..n];

    let (k, k_adjustment) = effective_k(params.k, n);
    if k_adjustment != KAdjustment::Unchanged {
        debug!(
            "Cluster count for video {} adjusted from {} to {}",
            video_id, params.k, k
        );
    }

    let seed = params.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centroids = kmeans_plus_plus(curves, k, &mut rng);
    let mut assignments = assign(curves, &centroids);
    refill_empty(&mut assignments, curves, &centroids, k);

    let mut iterations = 0;
    while iterations < params.max_iterations {
        iterations += 1;

        let updated = compute_centroids(curves, &assignments, k);
        let shift = centroids
            .iter()
            .zip(&updated)
            .map(|(a, b)| squared_distance(a, b).sqrt())
            .fold(0.0, f64::max);
        centroids = updated;

        let mut next = assign(curves, &centroids);
        refill_empty(&mut next, curves, &centroids, k);
        let stable = next == assignments;
        assignments = next;

        if stable || shift <= params.tolerance {
            break;
        }
    }

    let centroids = compute_centroids(curves, &assignments, k);
    let clusters = (0..k)
        .map(|c| {
            let members: Vec<usize> = (0..n).filter(|&i| assignments[i] == c).collect();
            let member_curves: Vec<Vec<f64>> =
                members.iter().map(|&i| curves[i].clone()).collect();
            let centroid = centroids[c].clone();
            let mu = mean(&centroid);
            let sigma = dispersion(&member_curves, &centroid);
            let sigma_sq = sigma * sigma;
            Cluster {
                number: c + 1,
                label: format!(
                    "C#{}, n: {}, μ: {:?}, σ: {:?}, σ²: {:?}",
                    c + 1,
                    members.len(),
                    round3(mu),
                    round3(sigma),
                    round3(sigma_sq)
                ),
                n: members.len(),
                mu,
                sigma,
                sigma_sq,
                centroid,
                usernames: members.iter().map(|&i| labels[i].clone()).collect(),
                members,
                curves: member_curves,
            }
        })
        .collect();

    Ok(Clustering {
        requested_k: params.k,
        effective_k: k,
        k_adjustment,
        seed,
        iterations,
        clusters,
    })
}

/// Spread of a cluster around its centroid
///
/// `sqrt(sum over members and points of |member[p] - centroid[p]| / len)`.
/// This is the absolute deviation per point summed over members, not a
/// standard deviation.
pub fn dispersion(members: &[Vec<f64>], centroid: &[f64]) -> f64 {
    if centroid.is_empty() {
        return 0.0;
    }
    let len = centroid.len() as f64;
    let total: f64 = members
        .iter()
        .flat_map(|member| member.iter().zip(centroid).map(|(m, c)| (m - c).abs() / len))
        .sum();
    total.sqrt()
}

/// Round to three decimals; `{:?}` then prints the shortest form ("15.0")
fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(curve: &[f64], centroids: &[Vec<f64>]) -> usize {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(curve, c)))
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
        .0
}

fn assign(curves: &[Vec<f64>], centroids: &[Vec<f64>]) -> Vec<usize> {
    curves.iter().map(|curve| nearest(curve, centroids)).collect()
}

/// Seed centroids from distinct curves, each next one drawn with probability
/// proportional to its squared distance from the closest chosen centroid
fn kmeans_plus_plus(curves: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = curves.len();
    let mut chosen = vec![rng.gen_range(0..n)];

    while chosen.len() < k {
        let weights: Vec<f64> = curves
            .iter()
            .enumerate()
            .map(|(i, curve)| {
                if chosen.contains(&i) {
                    0.0
                } else {
                    chosen
                        .iter()
                        .map(|&c| squared_distance(curve, &curves[c]))
                        .fold(f64::INFINITY, f64::min)
                }
            })
            .collect();
        let total: f64 = weights.iter().sum();
        let remaining: Vec<usize> = (0..n).filter(|i| !chosen.contains(i)).collect();

        let next = if total > 0.0 {
            let target = rng.gen::<f64>() * total;
            let mut cumulative = 0.0;
            let mut pick = None;
            for (i, w) in weights.iter().enumerate() {
                cumulative += w;
                if *w > 0.0 && target < cumulative {
                    pick = Some(i);
                    break;
                }
            }
            pick.or_else(|| weights.iter().rposition(|&w| w > 0.0))
                .unwrap_or(remaining[0])
        } else {
            // Every remaining curve coincides with a chosen one
            remaining[rng.gen_range(0..remaining.len())]
        };
        chosen.push(next);
    }

    chosen.into_iter().map(|i| curves[i].clone()).collect()
}

fn compute_centroids(curves: &[Vec<f64>], assignments: &[usize], k: usize) -> Vec<Vec<f64>> {
    let len = curves.first().map(Vec::len).unwrap_or(0);
    let mut sums = vec![vec![0.0; len]; k];
    let mut counts = vec![0usize; k];

    for (curve, &c) in curves.iter().zip(assignments) {
        counts[c] += 1;
        for (s, v) in sums[c].iter_mut().zip(curve) {
            *s += v;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count == 0 {
                sum
            } else {
                sum.into_iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

/// Move the curve farthest from its centroid, out of a cluster that can spare
/// one, into each empty cluster
fn refill_empty(assignments: &mut [usize], curves: &[Vec<f64>], centroids: &[Vec<f64>], k: usize) {
    loop {
        let mut counts = vec![0usize; k];
        for &c in assignments.iter() {
            counts[c] += 1;
        }
        let Some(empty) = counts.iter().position(|&count| count == 0) else {
            break;
        };

        let donor = assignments
            .iter()
            .enumerate()
            .filter(|&(_, &c)| counts[c] >= 2)
            .map(|(i, &c)| (i, squared_distance(&curves[i], &centroids[c])))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match donor {
            Some((i, _)) => assignments[i] = empty,
            None => break,
        }
    }
}
