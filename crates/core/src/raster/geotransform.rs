//! Affine geotransform for rasters

use serde::{Deserialize, Serialize};
use std::fmt;

/// Affine coefficients mapping pixel (col, row) to world (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_skew
/// y = origin_y + col * col_skew    + row * pixel_height
/// ```
///
/// The coefficient order of [`GeoTransform::from_gdal`] / [`GeoTransform::to_gdal`]
/// is `(origin_x, pixel_width, row_skew, origin_y, col_skew, pixel_height)`.
/// North-up rasters have zero skews and a negative `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub row_skew: f64,
    pub origin_y: f64,
    pub col_skew: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// North-up transform without skew
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            pixel_width,
            row_skew: 0.0,
            origin_y,
            col_skew: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_skew: coeffs[2],
            origin_y: coeffs[3],
            col_skew: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_skew,
            self.origin_y,
            self.col_skew,
            self.pixel_height,
        ]
    }

    /// World coordinates of the centre of pixel (col, row)
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.corner(col as f64 + 0.5, row as f64 + 0.5)
    }

    fn corner(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_skew,
            self.origin_y + col * self.col_skew + row * self.pixel_height,
        )
    }

    /// Linear size of one cell. Cells are assumed square.
    pub fn cell_size(&self) -> f64 {
        self.pixel_width.abs()
    }

    /// Area of one cell in hectares, for cell sizes in metres
    pub fn cell_area_ha(&self) -> f64 {
        (self.pixel_width * self.pixel_height).abs() / 10_000.0
    }

    pub fn is_north_up(&self) -> bool {
        self.row_skew == 0.0 && self.col_skew == 0.0 && self.pixel_height < 0.0
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` of a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corners = [
            self.corner(0.0, 0.0),
            self.corner(width as f64, 0.0),
            self.corner(0.0, height as f64),
            self.corner(width as f64, height as f64),
        ];
        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

impl fmt::Display for GeoTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.to_gdal();
        write!(f, "[{}, {}, {}, {}, {}, {}]", c[0], c[1], c[2], c[3], c[4], c[5])
    }
}
