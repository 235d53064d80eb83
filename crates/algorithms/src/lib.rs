//! # landshift algorithms
//!
//! Raster algorithms behind the land-cover scenario engine.
//!
//! ## Algorithm Categories
//!
//! - **landscape**: Forest edge distance, proximity, fragmentation index (FFQI)
//! - **statistics**: Masked means and sums, per-class reductions
//! - **globio**: GLOBIO land-cover derivation
//! - **carbon**: Carbon pools, edge-distance regression, carbon stock
//! - **msa**: Mean species abundance components

pub(crate) mod maybe_rayon;

pub mod carbon;
pub mod globio;
pub mod landscape;
pub mod msa;
pub mod statistics;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::carbon::{CarbonModel, CarbonParams, CarbonPoolTable, LogRegression};
    pub use crate::globio::{
        derive_globio, globio_land_cover, GlobioClass, GlobioConfig, GlobioParams, ReclassTable,
    };
    pub use crate::landscape::{edge_distance, ffqi, proximity, EdgeDistance, Ffqi};
    pub use crate::msa::{combine_msa, msa_f, msa_i, msa_lu, MsaFParams, MsaLuTable};
    pub use crate::statistics::{class_summaries, masked_summary, Summary};
    pub use landshift_core::prelude::*;
}
