//! Mean species abundance
//!
//! MSA is the product of its components, each in [0, 1]:
//!
//! ```text
//! msa = msa_f * msa_lu [* msa_i]
//! ```
//!
//! - **land_use**: MSA_LU looked up from the GLOBIO land-cover
//! - **fragmentation**: MSA_F bucketed from a sigma-3 fragmentation index
//! - **infrastructure**: MSA_I from distance to infrastructure

mod fragmentation;
mod infrastructure;
mod land_use;

pub use fragmentation::{msa_f, msa_f_bucket, msa_f_from_ffqi, MsaFParams};
pub use infrastructure::{infrastructure_buffer, msa_i, msa_i_bucket, DEFAULT_BUFFER_M};
pub use land_use::{default_msa_lu, msa_lu, MsaLuTable, GLOBIO_CODE_COLUMN, MSA_LU_COLUMN};

use landshift_core::raster::Raster;
use landshift_core::{Error, Result};

/// Multiply MSA components left to right. A pixel that is nodata in any
/// component is NaN.
pub fn combine_msa(components: &[&Raster<f32>]) -> Result<Raster<f32>> {
    let (first, rest) = components
        .split_first()
        .ok_or_else(|| Error::Algorithm("MSA needs at least one component".into()))?;

    for component in rest {
        first.ensure_aligned(*component, "MSA component")?;
    }

    let mut values = vec![1.0f32; first.len()];
    for component in components {
        for (acc, v) in values.iter_mut().zip(component.values()) {
            *acc = if acc.is_nan() || component.is_nodata(v) {
                f32::NAN
            } else {
                *acc * v
            };
        }
    }

    first.with_values(values, Some(f32::NAN))
}
