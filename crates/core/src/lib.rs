//! # landshift core
//!
//! Core types, traits and I/O for the landshift land-cover scenario engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid with geotransform, projection and no-data
//! - `GeoTransform`: affine transformation for georeferencing
//! - `CRS`: projection definition carried through inputs and outputs
//! - GeoTIFF reading/writing and keyed CSV parameter tables
//! - The `Algorithm` trait shared by the raster operations

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;

pub use crs::CRS;
pub use error::{Error, ErrorKind, Result};
pub use raster::{DataType, GeoTransform, Raster, RasterElement, RasterStatistics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::raster::{GeoTransform, Raster, RasterElement};
    pub use crate::Algorithm;
}

/// Common shape of the raster operations.
///
/// Algorithms are pure functions from an input to an output under a set of
/// parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
