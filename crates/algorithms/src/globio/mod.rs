//! GLOBIO land-cover
//!
//! Derives the 1..10 GLOBIO land-cover used by the MSA model from a source
//! land-cover, a broad reclassification table, yield-gap, potential
//! vegetation, pasture fraction and the forest fragmentation index.

mod derive;
mod reclass;

pub use derive::{
    derive_globio, globio_land_cover, pre_forest_split,
    GlobioClass, GlobioConfig, GlobioLandCover, GlobioParams, PixelInputs,
    BROAD_AGRICULTURE, BROAD_FOREST, BROAD_SCRUB_GRASS,
};
pub use reclass::{ReclassTable, DEFAULT_SOURCE_COLUMN, DEFAULT_TARGET_COLUMN};

/// Nodata sentinel of GLOBIO land-cover rasters
pub const GLOBIO_NODATA: i32 = -1;
