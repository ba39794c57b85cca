//! Linear trend model with prediction intervals.
//!
//! Ordinary least squares on bucket index. The interval for a point `x` is
//! `estimate ± z·σ·sqrt(1 + 1/n + (x − x̄)²/Sxx)` with σ the residual
//! standard error. Counts cannot be negative, so estimates and bounds are
//! clamped at zero.

use crate::adapters::{FittedTrend, TrendModel};
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::resample::ResampledSeries;

/// Trend-only additive model: no seasonal components.
#[derive(Debug, Clone, Copy)]
pub struct LinearTrend {
    z: f64,
}

impl LinearTrend {
    /// `interval_width` is the two-sided coverage, e.g. 0.8.
    pub fn new(interval_width: f64) -> Self {
        let width = if interval_width.is_finite() {
            interval_width.clamp(0.0, 0.999)
        } else {
            0.8
        };
        Self {
            z: normal_quantile(0.5 + width / 2.0),
        }
    }

    pub fn z(&self) -> f64 {
        self.z
    }
}

impl Default for LinearTrend {
    fn default() -> Self {
        Self::new(0.8)
    }
}

#[derive(Debug, Clone, Copy)]
struct FittedLine {
    intercept: f64,
    slope: f64,
    sigma: f64,
    n: f64,
    x_mean: f64,
    sxx: f64,
    last_x: f64,
    z: f64,
}

impl TrendModel for LinearTrend {
    fn fit(&self, series: &ResampledSeries) -> PipelineResult<Box<dyn FittedTrend>> {
        let values = &series.values;
        if values.len() < 2 {
            return Err(PipelineError::forecast_unavailable(format!(
                "need at least 2 resampled points, got {}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::forecast_unavailable("series contains non-finite values"));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            sxx += dx * dx;
            sxy += dx * (y - y_mean);
        }

        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        let sse: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let r = y - (intercept + slope * i as f64);
                r * r
            })
            .sum();
        let sigma = if values.len() > 2 {
            (sse / (n - 2.0)).sqrt()
        } else {
            0.0
        };

        if !(slope.is_finite() && intercept.is_finite() && sigma.is_finite()) {
            return Err(PipelineError::forecast_unavailable("trend fit did not converge"));
        }

        Ok(Box::new(FittedLine {
            intercept,
            slope,
            sigma,
            n,
            x_mean,
            sxx,
            last_x: n - 1.0,
            z: self.z,
        }))
    }
}

impl FittedTrend for FittedLine {
    fn predict(&self, steps_ahead: usize) -> (f64, f64, f64) {
        let x = self.last_x + steps_ahead as f64;
        let raw = self.intercept + self.slope * x;
        let dx = x - self.x_mean;
        let se = self.sigma * (1.0 + 1.0 / self.n + dx * dx / self.sxx).sqrt();
        let half = self.z * se;

        let estimate = raw.max(0.0);
        let lower = (raw - half).max(0.0);
        let upper = (raw + half).max(estimate);
        (estimate, lower, upper)
    }
}

/// Inverse standard normal CDF for `p` in (0, 1).
///
/// Abramowitz & Stegun 26.2.23, absolute error below 4.5e-4.
fn normal_quantile(p: f64) -> f64 {
    const C: [f64; 3] = [2.515517, 0.802853, 0.010328];
    const D: [f64; 3] = [1.432788, 0.189269, 0.001308];

    let p = p.clamp(1e-12, 1.0 - 1e-12);
    let (q, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * q.ln()).sqrt();
    let z = t - (C[0] + C[1] * t + C[2] * t * t) / (1.0 + D[0] * t + D[1] * t * t + D[2] * t * t * t);
    sign * z
}
