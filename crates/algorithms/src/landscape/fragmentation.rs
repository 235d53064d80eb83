//! Forest fragmentation quality index
//!
//! FFQI is the share of natural land around a pixel, weighted by an isotropic
//! Gaussian, kept only on natural pixels:
//!
//! ```text
//! ffqi = (G_sigma * natural) . natural
//! ```
//!
//! The blur is separable (one horizontal and one vertical 1D pass) with the
//! kernel truncated at `4 sigma` and zero padding beyond the raster edge, so
//! pixels near the border see the outside as non-natural.

use std::collections::BTreeSet;

use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::{Algorithm, Error, Result};

/// Parameters for the fragmentation index
#[derive(Debug, Clone)]
pub struct FfqiParams {
    /// Land-cover codes counted as natural
    pub natural_codes: BTreeSet<i32>,
    /// Gaussian standard deviation in pixels
    pub sigma_px: f64,
}

impl Default for FfqiParams {
    fn default() -> Self {
        Self {
            natural_codes: BTreeSet::new(),
            sigma_px: 9.0,
        }
    }
}

/// Fragmentation index algorithm
#[derive(Debug, Clone, Default)]
pub struct Ffqi;

impl Algorithm for Ffqi {
    type Input = Raster<i32>;
    type Output = Raster<f32>;
    type Params = FfqiParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "FFQI"
    }

    fn description(&self) -> &'static str {
        "Gaussian-smoothed naturalness masked to natural pixels"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        ffqi(&input, &params.natural_codes, params.sigma_px)
    }
}

/// Fragmentation index of `lulc`, in [0, 1].
///
/// Non-natural pixels carry 0; land-cover nodata pixels carry NaN and count
/// as non-natural for their neighbours.
pub fn ffqi(lulc: &Raster<i32>, natural_codes: &BTreeSet<i32>, sigma_px: f64) -> Result<Raster<f32>> {
    ffqi_excluding(lulc, natural_codes, sigma_px, None)
}

/// Like [`ffqi`], but pixels flagged in `excluded` (row-major) are never
/// natural.
pub fn ffqi_excluding(
    lulc: &Raster<i32>,
    natural_codes: &BTreeSet<i32>,
    sigma_px: f64,
    excluded: Option<&[bool]>,
) -> Result<Raster<f32>> {
    if let Some(mask) = excluded {
        if mask.len() != lulc.len() {
            return Err(Error::Mismatch {
                what: "fragmentation exclusion mask",
                expected: lulc.len().to_string(),
                actual: mask.len().to_string(),
            });
        }
    }

    let natural: Vec<f64> = lulc
        .values()
        .enumerate()
        .map(|(i, v)| {
            let is_excluded = excluded.map_or(false, |m| m[i]);
            if !lulc.is_nodata(v) && !is_excluded && natural_codes.contains(&v) {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    let (rows, cols) = lulc.shape();
    let smoothed = gaussian_blur(&natural, rows, cols, sigma_px)?;

    let values: Vec<f32> = lulc
        .values()
        .zip(natural.iter().zip(smoothed.iter()))
        .map(|(v, (&n, &s))| {
            if lulc.is_nodata(v) {
                f32::NAN
            } else {
                // Guard against round-off past the unit interval
                (s * n).clamp(0.0, 1.0) as f32
            }
        })
        .collect();

    lulc.with_values(values, Some(f32::NAN))
}

/// Normalized 1D Gaussian kernel truncated at `int(4 sigma + 0.5)` taps on
/// each side.
pub fn gaussian_kernel(sigma: f64) -> Result<Vec<f64>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "sigma",
            value: sigma.to_string(),
            reason: "must be a positive finite number of pixels".into(),
        });
    }

    let radius = (4.0 * sigma + 0.5) as isize;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|x| (-((x * x) as f64) / two_sigma_sq).exp())
        .collect();

    let sum: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    Ok(kernel)
}

/// Separable Gaussian blur of a row-major grid with zero padding.
pub fn gaussian_blur(values: &[f64], rows: usize, cols: usize, sigma: f64) -> Result<Vec<f64>> {
    if values.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let kernel = gaussian_kernel(sigma)?;
    let radius = (kernel.len() / 2) as isize;

    let horizontal: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let line = &values[row * cols..(row + 1) * cols];
            let mut row_data = vec![0.0; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let mut sum = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let c = col as isize + k as isize - radius;
                    if c < 0 || c >= cols as isize {
                        continue;
                    }
                    sum += w * line[c as usize];
                }
                *out = sum;
            }
            row_data
        })
        .collect();

    let blurred: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0.0; cols];
            for (k, &w) in kernel.iter().enumerate() {
                let r = row as isize + k as isize - radius;
                if r < 0 || r >= rows as isize {
                    continue;
                }
                let src = &horizontal[r as usize * cols..(r as usize + 1) * cols];
                for (out, &v) in row_data.iter_mut().zip(src) {
                    *out += w * v;
                }
            }
            row_data
        })
        .collect();

    Ok(blurred)
}
