//! GLOBIO land-cover derivation
//!
//! Pixel-wise pipeline from a source land-cover plus auxiliary layers:
//!
//! ```text
//! broad = reclass(source)
//! 132 (agriculture)  -> 8 if yieldgap >= t_y else 9
//! 131 (scrub/grass)  -> 6 if pot_veg <= 8, else 1 if pasture < t_p, else 5
//! 130 (forest)       -> 1 if ffqi >= t_1, 3 if ffqi >= t_2, else 4
//! other              -> unchanged
//! ```
//!
//! The fragmentation index used for the forest split is computed on the
//! intermediate map in which agriculture and scrub are already split but
//! forest is still 130.

use std::collections::BTreeSet;

use crate::landscape::ffqi;
use landshift_core::raster::Raster;
use landshift_core::{Error, Result};

use super::{ReclassTable, GLOBIO_NODATA};

/// Broad code for forest before the fragmentation split
pub const BROAD_FOREST: i32 = 130;
/// Broad code for scrub and grassland
pub const BROAD_SCRUB_GRASS: i32 = 131;
/// Broad code for agriculture
pub const BROAD_AGRICULTURE: i32 = 132;

/// Potential vegetation classes above this are natural grassland/scrub
const POTENTIAL_VEG_NATURAL_ABOVE: f32 = 8.0;

/// Thresholds and fragmentation settings for the derivation
#[derive(Debug, Clone, PartialEq)]
pub struct GlobioParams {
    pub yieldgap_threshold: f64,
    pub pasture_threshold: f64,
    pub primary_threshold: f64,
    pub secondary_threshold: f64,
    /// Gaussian sigma, in pixels, of the fragmentation index
    pub sigma_px: f64,
    /// Intermediate codes counted as natural by the fragmentation index
    pub natural_codes: BTreeSet<i32>,
}

impl Default for GlobioParams {
    fn default() -> Self {
        Self {
            yieldgap_threshold: 45.680_490_689_7,
            pasture_threshold: 0.5,
            primary_threshold: 0.66,
            secondary_threshold: 0.33,
            sigma_px: 9.0,
            natural_codes: [BROAD_FOREST, GlobioClass::PrimaryVegetation.code()]
                .into_iter()
                .collect(),
        }
    }
}

impl GlobioParams {
    pub fn validate(&self) -> Result<()> {
        if self.secondary_threshold > self.primary_threshold {
            return Err(Error::InvalidParameter {
                name: "secondary_threshold",
                value: self.secondary_threshold.to_string(),
                reason: format!("exceeds primary_threshold {}", self.primary_threshold),
            });
        }
        Ok(())
    }
}

/// Everything the derivation needs besides the rasters
#[derive(Debug, Clone, Default)]
pub struct GlobioConfig {
    pub reclass: ReclassTable,
    pub params: GlobioParams,
}

/// A GLOBIO land-cover class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobioClass {
    /// Primary forest or pristine scrub/grassland
    PrimaryVegetation,
    SecondaryForest,
    ForestPlantation,
    LivestockGrazing,
    ManMadePasture,
    LowInputAgriculture,
    IntensiveAgriculture,
    /// Forest waiting for the fragmentation split
    UnsplitForest,
    /// Broad code carried through unchanged
    PassThrough(i32),
}

impl GlobioClass {
    pub fn code(self) -> i32 {
        match self {
            GlobioClass::PrimaryVegetation => 1,
            GlobioClass::SecondaryForest => 3,
            GlobioClass::ForestPlantation => 4,
            GlobioClass::LivestockGrazing => 5,
            GlobioClass::ManMadePasture => 6,
            GlobioClass::LowInputAgriculture => 8,
            GlobioClass::IntensiveAgriculture => 9,
            GlobioClass::UnsplitForest => BROAD_FOREST,
            GlobioClass::PassThrough(code) => code,
        }
    }
}

/// The per-pixel inputs of the derivation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelInputs {
    pub broad: i32,
    pub yieldgap: f32,
    pub potential_veg: f32,
    pub pasture: f32,
    /// `None` leaves forest unsplit
    pub ffqi: Option<f32>,
}

impl PixelInputs {
    pub fn classify(&self, params: &GlobioParams) -> GlobioClass {
        match self.broad {
            BROAD_AGRICULTURE => {
                if self.yieldgap as f64 >= params.yieldgap_threshold {
                    GlobioClass::LowInputAgriculture
                } else {
                    GlobioClass::IntensiveAgriculture
                }
            }
            BROAD_SCRUB_GRASS => {
                if self.potential_veg <= POTENTIAL_VEG_NATURAL_ABOVE {
                    GlobioClass::ManMadePasture
                } else if (self.pasture as f64) < params.pasture_threshold {
                    GlobioClass::PrimaryVegetation
                } else {
                    GlobioClass::LivestockGrazing
                }
            }
            BROAD_FOREST => match self.ffqi {
                None => GlobioClass::UnsplitForest,
                Some(f) if f as f64 >= params.primary_threshold => GlobioClass::PrimaryVegetation,
                Some(f) if f as f64 >= params.secondary_threshold => GlobioClass::SecondaryForest,
                Some(_) => GlobioClass::ForestPlantation,
            },
            other => GlobioClass::PassThrough(other),
        }
    }
}

/// Derive the GLOBIO land-cover from a source land-cover, the auxiliary
/// layers and a precomputed fragmentation index.
///
/// All rasters must be aligned. A pixel where any input is nodata becomes
/// [`GLOBIO_NODATA`].
pub fn derive_globio(
    source_lulc: &Raster<i32>,
    yieldgap_sum: &Raster<f32>,
    potential_veg: &Raster<f32>,
    pasture_frac: &Raster<f32>,
    ffqi: &Raster<f32>,
    config: &GlobioConfig,
) -> Result<Raster<i32>> {
    source_lulc.ensure_aligned(ffqi, "fragmentation index")?;
    classify_all(source_lulc, yieldgap_sum, potential_veg, pasture_frac, Some(ffqi), config)
}

/// The derivation with forest left as [`BROAD_FOREST`].
pub fn pre_forest_split(
    source_lulc: &Raster<i32>,
    yieldgap_sum: &Raster<f32>,
    potential_veg: &Raster<f32>,
    pasture_frac: &Raster<f32>,
    config: &GlobioConfig,
) -> Result<Raster<i32>> {
    classify_all(source_lulc, yieldgap_sum, potential_veg, pasture_frac, None, config)
}

/// GLOBIO land-cover together with the fragmentation index that split its
/// forest
#[derive(Debug, Clone)]
pub struct GlobioLandCover {
    pub lulc: Raster<i32>,
    pub ffqi: Raster<f32>,
}

/// Full derivation: intermediate map, its fragmentation index, then the
/// forest split.
pub fn globio_land_cover(
    source_lulc: &Raster<i32>,
    yieldgap_sum: &Raster<f32>,
    potential_veg: &Raster<f32>,
    pasture_frac: &Raster<f32>,
    config: &GlobioConfig,
) -> Result<GlobioLandCover> {
    config.params.validate()?;

    let intermediate = pre_forest_split(source_lulc, yieldgap_sum, potential_veg, pasture_frac, config)?;
    let forest_ffqi = ffqi(&intermediate, &config.params.natural_codes, config.params.sigma_px)?;
    let lulc = derive_globio(
        source_lulc,
        yieldgap_sum,
        potential_veg,
        pasture_frac,
        &forest_ffqi,
        config,
    )?;

    Ok(GlobioLandCover {
        lulc,
        ffqi: forest_ffqi,
    })
}

fn classify_all(
    source_lulc: &Raster<i32>,
    yieldgap_sum: &Raster<f32>,
    potential_veg: &Raster<f32>,
    pasture_frac: &Raster<f32>,
    ffqi: Option<&Raster<f32>>,
    config: &GlobioConfig,
) -> Result<Raster<i32>> {
    source_lulc.ensure_aligned(yieldgap_sum, "yield gap")?;
    source_lulc.ensure_aligned(potential_veg, "potential vegetation")?;
    source_lulc.ensure_aligned(pasture_frac, "pasture fraction")?;

    let ffqi_values: Option<Vec<f32>> = ffqi.map(Raster::to_vec);
    let yg = yieldgap_sum.data();
    let pv = potential_veg.data();
    let pa = pasture_frac.data();

    let values: Vec<i32> = source_lulc
        .data()
        .indexed_iter()
        .enumerate()
        .map(|(i, ((row, col), &code))| {
            let (y, p, s) = (yg[(row, col)], pv[(row, col)], pa[(row, col)]);
            let f = ffqi_values.as_ref().map(|v| v[i]);

            if source_lulc.is_nodata(code)
                || yieldgap_sum.is_nodata(y)
                || potential_veg.is_nodata(p)
                || pasture_frac.is_nodata(s)
                || f.map_or(false, f32::is_nan)
            {
                return GLOBIO_NODATA;
            }

            PixelInputs {
                broad: config.reclass.broad_code(code),
                yieldgap: y,
                potential_veg: p,
                pasture: s,
                ffqi: f,
            }
            .classify(&config.params)
            .code()
        })
        .collect();

    source_lulc.with_values(values, Some(GLOBIO_NODATA))
}
