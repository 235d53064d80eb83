//! Log-distance regression of biomass against forest edge distance
//!
//! ```text
//! biomass(d) = slope * ln(d) + intercept
//! ```
//!
//! fitted by ordinary least squares on `x = ln(d)`.

/// A fitted `slope * ln(d) + intercept` model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRegression {
    pub slope: f64,
    pub intercept: f64,
    /// Number of pixels the fit used
    pub samples: usize,
}

impl LogRegression {
    /// Fit on `(distance, value)` pairs. Pairs with a non-positive or
    /// non-finite distance or a non-finite value are ignored.
    ///
    /// Returns `None` when no pair survives. When every distance is the
    /// same the slope is 0 and the intercept is the mean value.
    pub fn fit<I>(pairs: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let samples: Vec<(f64, f64)> = pairs
            .into_iter()
            .filter(|&(d, y)| d.is_finite() && d > 0.0 && y.is_finite())
            .map(|(d, y)| (d.ln(), y))
            .collect();

        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let mean_x = samples.iter().map(|s| s.0).sum::<f64>() / n;
        let mean_y = samples.iter().map(|s| s.1).sum::<f64>() / n;

        let (mut sxx, mut sxy) = (0.0, 0.0);
        for &(x, y) in &samples {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }

        let slope = if sxx > 1e-12 * n { sxy / sxx } else { 0.0 };

        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            samples: samples.len(),
        })
    }

    /// Raw model value at distance `d` (may be negative)
    pub fn predict(&self, d: f64) -> f64 {
        self.slope * d.ln() + self.intercept
    }
}
