//! Main Raster type

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement};
use ndarray::Array2;

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// its geotransform, projection and optional no-data sentinel.
///
/// # Example
///
/// ```ignore
/// use landshift_core::Raster;
///
/// let mut lulc: Raster<i32> = Raster::filled(100, 100, 10);
/// lulc.set(10, 20, 2)?;
/// let forest_like: Raster<f32> = lulc.new_like(0.0, None);
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    /// Cell values indexed by (row, col)
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled grid of `rows` x `cols`
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Grid with every cell set to `value`
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major values
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Take ownership of an existing array
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Create a grid matching this one's shape, transform and projection,
    /// with a different element type, a fill value and a no-data sentinel.
    pub fn new_like<U: RasterElement>(&self, fill: U, nodata: Option<U>) -> Raster<U> {
        Raster {
            data: Array2::from_elem(self.data.dim(), fill),
            transform: self.transform,
            crs: self.crs.clone(),
            nodata,
        }
    }

    /// Wrap row-major `values` with this raster's metadata
    pub fn with_values<U: RasterElement>(&self, values: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let (rows, cols) = self.shape();
        let mut out = Raster::from_vec(values, rows, cols)?;
        out.transform = self.transform;
        out.crs = self.crs.clone();
        out.nodata = nodata;
        Ok(out)
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Get value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            }),
        }
    }

    /// Get the value at a row-major flat index
    pub fn get_flat(&self, index: usize) -> Result<T> {
        let cols = self.cols().max(1);
        self.get(index / cols, index % cols)
    }

    /// Set the value at a row-major flat index
    pub fn set_flat(&mut self, index: usize, value: T) -> Result<()> {
        let cols = self.cols().max(1);
        self.set(index / cols, index % cols, value)
    }

    /// Iterate over all values in row-major order
    pub fn values(&self) -> impl Iterator<Item = T> + '_ {
        self.data.iter().copied()
    }

    /// Copy all values out in row-major order
    pub fn to_vec(&self) -> Vec<T> {
        self.data.iter().copied().collect()
    }

    /// Borrow the backing array
    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Projection definition, empty when unset
    pub fn projection(&self) -> &str {
        self.crs.as_ref().map(CRS::as_str).unwrap_or("")
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Pixel width in map units
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    // Value checks

    /// Whether `value` equals the no-data sentinel
    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    /// Count cells satisfying `pred`
    pub fn count_where<F: Fn(T) -> bool>(&self, pred: F) -> usize {
        self.data.iter().filter(|&&v| pred(v)).count()
    }

    /// Fail with [`Error::Mismatch`] unless `other` shares this raster's
    /// width, height, geotransform and projection.
    pub fn ensure_aligned<U: RasterElement>(&self, other: &Raster<U>, what: &'static str) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::Mismatch {
                what,
                expected: format!("{}x{}", self.cols(), self.rows()),
                actual: format!("{}x{}", other.cols(), other.rows()),
            });
        }
        if self.transform != other.transform {
            return Err(Error::Mismatch {
                what,
                expected: self.transform.to_string(),
                actual: other.transform.to_string(),
            });
        }
        if self.projection().as_bytes() != other.projection().as_bytes() {
            return Err(Error::Mismatch {
                what,
                expected: format!("projection '{}'", self.projection()),
                actual: format!("projection '{}'", other.projection()),
            });
        }
        Ok(())
    }

    // Statistics

    /// Min, max, mean and sum over the cells that are not no-data
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut min: Option<T> = None;
        let mut max: Option<T> = None;
        let mut sum: f64 = 0.0;
        let mut count: usize = 0;

        for &value in self.data.iter() {
            if self.is_nodata(value) {
                continue;
            }
            if min.map_or(true, |m| value < m) {
                min = Some(value);
            }
            if max.map_or(true, |m| value > m) {
                max = Some(value);
            }
            if let Some(v) = value.to_f64() {
                sum += v;
                count += 1;
            }
        }

        RasterStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            sum,
            valid_count: count,
            nodata_count: self.len() - count,
        }
    }
}

/// Summary returned by [`Raster::statistics`]
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub sum: f64,
    pub valid_count: usize,
    pub nodata_count: usize,
}
