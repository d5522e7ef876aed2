//! Shape-preserving monotone cubic interpolation (PCHIP)
//!
//! Piecewise cubic Hermite interpolation with Fritsch-Carlson derivative
//! limiting. Interior derivatives are the weighted harmonic mean of the
//! adjacent secant slopes, or zero at a local extremum; end derivatives use
//! the three-point shape-preserving formula. On every interval the curve is
//! monotone between its two knots, so it never overshoots the observed values.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    #[error("at least 2 points are required, got {0}")]
    TooFewPoints(usize),

    #[error("{xs} x values but {ys} y values")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("x values must be strictly increasing (index {index})")]
    NotIncreasing { index: usize },

    #[error("non-finite value at index {index}")]
    NonFinite { index: usize },
}

/// Monotone piecewise cubic interpolator over fixed knots
#[derive(Debug, Clone, PartialEq)]
pub struct MonotoneInterpolator {
    xs: Vec<f64>,
    ys: Vec<f64>,
    derivatives: Vec<f64>,
}

impl MonotoneInterpolator {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, InterpolationError> {
        if xs.len() != ys.len() {
            return Err(InterpolationError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if xs.len() < 2 {
            return Err(InterpolationError::TooFewPoints(xs.len()));
        }
        if let Some(index) = xs
            .iter()
            .zip(&ys)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(InterpolationError::NonFinite { index });
        }
        if let Some(index) = xs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(InterpolationError::NotIncreasing { index: index + 1 });
        }

        let derivatives = pchip_derivatives(&xs, &ys);
        Ok(Self {
            xs,
            ys,
            derivatives,
        })
    }

    /// Build from `(x, y)` pairs
    pub fn from_points(points: &[(f64, f64)]) -> Result<Self, InterpolationError> {
        let (xs, ys) = points.iter().copied().unzip();
        Self::new(xs, ys)
    }

    /// Closed interval on which the interpolator is defined
    pub fn support(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn knots(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }

    /// Value at `x`, or `None` outside the support
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let (lo, hi) = self.support();
        if !(lo..=hi).contains(&x) {
            return None;
        }

        let upper = self.xs.partition_point(|&knot| knot <= x);
        let i = upper.saturating_sub(1).min(self.xs.len() - 2);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);

        if x == x0 {
            return Some(y0);
        }
        if x == x1 {
            return Some(y1);
        }

        let h = x1 - x0;
        let t = (x - x0) / h;
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        let y = h00 * y0
            + h10 * h * self.derivatives[i]
            + h01 * y1
            + h11 * h * self.derivatives[i + 1];

        // Each piece is monotone between its knots; clamp away rounding error
        Some(y.clamp(y0.min(y1), y0.max(y1)))
    }

    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<Option<f64>> {
        xs.iter().map(|&x| self.evaluate(x)).collect()
    }
}

fn pchip_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
    let n = xs.len();
    let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let m: Vec<f64> = ys
        .windows(2)
        .zip(&h)
        .map(|(w, h)| (w[1] - w[0]) / h)
        .collect();

    if n == 2 {
        return vec![m[0], m[0]];
    }

    let mut d = vec![0.0; n];
    for k in 1..n - 1 {
        let (m0, m1) = (m[k - 1], m[k]);
        if m0 == 0.0 || m1 == 0.0 || m0.signum() != m1.signum() {
            continue;
        }
        let w1 = 2.0 * h[k] + h[k - 1];
        let w2 = h[k] + 2.0 * h[k - 1];
        d[k] = (w1 + w2) / (w1 / m0 + w2 / m1);
    }

    d[0] = edge_derivative(h[0], h[1], m[0], m[1]);
    d[n - 1] = edge_derivative(h[n - 2], h[n - 3], m[n - 2], m[n - 3]);
    d
}

/// Three-point end derivative, limited to keep the end piece monotone
fn edge_derivative(h0: f64, h1: f64, m0: f64, m1: f64) -> f64 {
    let d = ((2.0 * h0 + h1) * m0 - h0 * m1) / (h0 + h1);
    if sign(d) != sign(m0) {
        0.0
    } else if sign(m0) != sign(m1) && d.abs() > 3.0 * m0.abs() {
        3.0 * m0
    } else {
        d
    }
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}
