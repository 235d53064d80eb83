//! Fragmentation component of MSA

use std::collections::BTreeSet;

use crate::landscape::ffqi_excluding;
use landshift_core::raster::Raster;
use landshift_core::Result;

/// Settings of the MSA_F fragmentation index
#[derive(Debug, Clone, PartialEq)]
pub struct MsaFParams {
    /// Source land-cover codes counted as natural
    pub natural_codes: BTreeSet<i32>,
    /// Gaussian sigma in pixels
    pub sigma_px: f64,
}

impl Default for MsaFParams {
    fn default() -> Self {
        Self {
            natural_codes: (0..=10).chain([16]).collect(),
            sigma_px: 3.0,
        }
    }
}

/// MSA_F of a fragmentation index value
pub fn msa_f_bucket(ffqi: f32) -> f32 {
    if ffqi > 0.9984 {
        1.0
    } else if ffqi > 0.9825 {
        0.95
    } else if ffqi > 0.89771 {
        0.9
    } else if ffqi > 0.578512 {
        0.7
    } else if ffqi > 0.42877 {
        0.6
    } else {
        0.3
    }
}

/// MSA_F per pixel of an FFQI raster; NaN stays NaN
pub fn msa_f_from_ffqi(ffqi: &Raster<f32>) -> Result<Raster<f32>> {
    let values: Vec<f32> = ffqi
        .values()
        .map(|f| if ffqi.is_nodata(f) { f32::NAN } else { msa_f_bucket(f) })
        .collect();
    ffqi.with_values(values, Some(f32::NAN))
}

/// MSA_F of a source land-cover.
///
/// Pixels flagged in `excluded` (e.g. within the infrastructure buffer) are
/// not natural in the blur.
pub fn msa_f(lulc: &Raster<i32>, params: &MsaFParams, excluded: Option<&[bool]>) -> Result<Raster<f32>> {
    let ffqi = ffqi_excluding(lulc, &params.natural_codes, params.sigma_px, excluded)?;
    msa_f_from_ffqi(&ffqi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_edges() {
        assert_eq!(msa_f_bucket(1.0), 1.0);
        assert_eq!(msa_f_bucket(0.9984), 0.95);
        assert_eq!(msa_f_bucket(0.9825), 0.9);
        assert_eq!(msa_f_bucket(0.9), 0.9);
        assert_eq!(msa_f_bucket(0.6), 0.7);
        assert_eq!(msa_f_bucket(0.5), 0.6);
        assert_eq!(msa_f_bucket(0.42877), 0.3);
        assert_eq!(msa_f_bucket(0.0), 0.3);
    }

    #[test]
    fn test_interior_and_hole_neighbour() {
        let params = MsaFParams {
            natural_codes: [1].into_iter().collect(),
            sigma_px: 3.0,
        };

        let uniform: Raster<i32> = Raster::filled(32, 32, 1);
        let f = msa_f(&uniform, &params, None).unwrap();
        assert_eq!(f.get(16, 16).unwrap(), 1.0);

        let mut holed = uniform.clone();
        holed.set(16, 16, 9).unwrap();
        let f = msa_f(&holed, &params, None).unwrap();
        assert_eq!(f.get(16, 16).unwrap(), 0.3);
        // 1 - k(0) k(1) ~ 0.9833 with sigma 3
        assert_eq!(f.get(16, 17).unwrap(), 0.95);
    }
}
