//! Euclidean distance transforms
//!
//! Exact squared Euclidean distance transform of a binary grid using the
//! two-pass separable lower-envelope algorithm of Felzenszwalb & Huttenlocher
//! (2012): a 1D transform down every column, then a 1D transform along every
//! row of the intermediate result. Cost is O(rows * cols).
//!
//! Two raster operations are built on it:
//! - **Edge distance**: for each forest pixel, distance to the nearest
//!   non-forest pixel (the raster border counts as non-forest)
//! - **Proximity**: for each pixel, distance to the nearest source pixel

use std::collections::BTreeSet;

use crate::maybe_rayon::*;
use landshift_core::raster::Raster;
use landshift_core::{Algorithm, Error, Result};

/// Stand-in for "no background seen yet". Larger than any squared distance
/// on a realistic grid while keeping the envelope arithmetic finite.
const FAR: f64 = 1e20;

/// Parameters for forest edge distance
#[derive(Debug, Clone, Default)]
pub struct EdgeDistanceParams {
    /// Land-cover codes counted as forest
    pub forest_codes: BTreeSet<i32>,
}

/// Forest edge distance algorithm
#[derive(Debug, Clone, Default)]
pub struct EdgeDistance;

impl Algorithm for EdgeDistance {
    type Input = Raster<i32>;
    type Output = Raster<f32>;
    type Params = EdgeDistanceParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "EdgeDistance"
    }

    fn description(&self) -> &'static str {
        "Euclidean distance from each forest pixel to the nearest non-forest pixel"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        edge_distance(&input, &params.forest_codes)
    }
}

/// Distance, in world units, from each forest pixel to the nearest
/// non-forest pixel.
///
/// Pixels outside `forest_codes` (including land-cover nodata) get 0. Forest
/// pixels get at least one cell size, since the area beyond the raster
/// border is treated as non-forest.
pub fn edge_distance(lulc: &Raster<i32>, forest_codes: &BTreeSet<i32>) -> Result<Raster<f32>> {
    let inside: Vec<bool> = lulc
        .values()
        .map(|v| !lulc.is_nodata(v) && forest_codes.contains(&v))
        .collect();

    let (rows, cols) = lulc.shape();
    let cell_size = lulc.cell_size();
    let distances = euclidean_distance_transform(&inside, rows, cols, true)?;

    let values: Vec<f32> = distances
        .into_iter()
        .map(|d| (d * cell_size) as f32)
        .collect();

    lulc.with_values(values, None)
}

/// Distance, in world units, from each pixel to the nearest source pixel.
///
/// A source is any valid cell with a value greater than zero. Source cells
/// get 0; when the raster holds no source at all every cell is `+inf`.
pub fn proximity(sources: &Raster<f32>) -> Result<Raster<f32>> {
    let nodata = sources.nodata();
    let inside: Vec<bool> = sources
        .values()
        .map(|v| v.is_nan() || nodata.map_or(false, |nd| v == nd) || v <= 0.0)
        .collect();

    let (rows, cols) = sources.shape();
    let cell_size = sources.cell_size();
    let distances = euclidean_distance_transform(&inside, rows, cols, false)?;

    let values: Vec<f32> = distances
        .into_iter()
        .map(|d| if d.is_finite() { (d * cell_size) as f32 } else { f32::INFINITY })
        .collect();

    sources.with_values(values, None)
}

/// Exact Euclidean distance transform of a row-major binary grid.
///
/// Returns, for every `true` cell, the distance in pixels to the nearest
/// `false` cell, and 0 for `false` cells. With `border_is_background` the
/// grid is treated as surrounded by a one-pixel ring of `false`. Cells with
/// no background anywhere get `+inf`.
pub fn euclidean_distance_transform(
    inside: &[bool],
    rows: usize,
    cols: usize,
    border_is_background: bool,
) -> Result<Vec<f64>> {
    if inside.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }
    if inside.is_empty() {
        return Ok(Vec::new());
    }

    if !border_is_background {
        return Ok(squared_edt(inside, rows, cols)
            .into_iter()
            .map(finish_distance)
            .collect());
    }

    // One-pixel background ring
    let (prows, pcols) = (rows + 2, cols + 2);
    let mut padded = vec![false; prows * pcols];
    for row in 0..rows {
        let src = &inside[row * cols..(row + 1) * cols];
        let start = (row + 1) * pcols + 1;
        padded[start..start + cols].copy_from_slice(src);
    }

    let squared = squared_edt(&padded, prows, pcols);
    let mut out = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        let start = (row + 1) * pcols + 1;
        out.extend(squared[start..start + cols].iter().copied().map(finish_distance));
    }
    Ok(out)
}

fn finish_distance(squared: f64) -> f64 {
    if squared >= FAR * 0.5 {
        f64::INFINITY
    } else {
        squared.sqrt()
    }
}

/// Squared distances: columns first, then rows.
fn squared_edt(inside: &[bool], rows: usize, cols: usize) -> Vec<f64> {
    let by_column: Vec<Vec<f64>> = (0..cols)
        .into_par_iter()
        .map(|col| {
            let f: Vec<f64> = (0..rows)
                .map(|row| if inside[row * cols + col] { FAR } else { 0.0 })
                .collect();
            lower_envelope_1d(&f)
        })
        .collect();

    (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let f: Vec<f64> = by_column.iter().map(|column| column[row]).collect();
            lower_envelope_1d(&f)
        })
        .collect()
}

/// 1D squared distance transform of the sampled function `f`:
/// `d(q) = min_p ((q - p)^2 + f(p))`.
fn lower_envelope_1d(f: &[f64]) -> Vec<f64> {
    let n = f.len();
    let mut d = vec![0.0; n];
    if n == 0 {
        return d;
    }

    // Parabola vertices and the boundaries between them
    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;

    for q in 1..n {
        let fq = f[q] + (q * q) as f64;
        loop {
            let p = v[k];
            let s = (fq - (f[p] + (p * p) as f64)) / (2.0 * (q as f64 - p as f64));
            if s <= z[k] {
                // z[0] is -inf, so k never underflows
                k -= 1;
                continue;
            }
            k += 1;
            v[k] = q;
            z[k] = s;
            z[k + 1] = f64::INFINITY;
            break;
        }
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let p = v[k];
        let dq = q as f64 - p as f64;
        *out = dq * dq + f[p];
    }
    d
}
