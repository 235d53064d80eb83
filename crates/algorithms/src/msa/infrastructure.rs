//! Infrastructure component of MSA
//!
//! MSA_I drops near roads and other infrastructure, with distance bands that
//! depend on the land-cover group of the pixel.

use landshift_core::raster::Raster;
use landshift_core::Result;

/// Default distance, in metres, within which natural pixels lose their
/// naturalness for MSA_F
pub const DEFAULT_BUFFER_M: f64 = 1000.0;

/// MSA_I of a pixel of source class `code` at `distance_m` from the
/// nearest infrastructure.
pub fn msa_i_bucket(code: i32, distance_m: f32) -> f32 {
    let bands: &[(f32, f32)] = match code {
        // forest
        1..=5 => &[(300.0, 0.4), (1200.0, 0.8), (4200.0, 0.9)],
        // cropland and grassland
        6..=12 => &[(500.0, 0.4), (2000.0, 0.8), (7000.0, 0.9)],
        _ => &[],
    };
    bands
        .iter()
        .find(|(limit, _)| distance_m <= *limit)
        .map_or(1.0, |&(_, msa)| msa)
}

/// MSA_I per pixel. Both rasters must be aligned; nodata yields NaN.
pub fn msa_i(lulc: &Raster<i32>, infrastructure_distance: &Raster<f32>) -> Result<Raster<f32>> {
    lulc.ensure_aligned(infrastructure_distance, "infrastructure distance")?;

    let values: Vec<f32> = lulc
        .values()
        .zip(infrastructure_distance.values())
        .map(|(code, d)| {
            if lulc.is_nodata(code) || d.is_nan() {
                f32::NAN
            } else {
                msa_i_bucket(code, d)
            }
        })
        .collect();
    lulc.with_values(values, Some(f32::NAN))
}

/// Row-major flags of pixels closer than `buffer_m` to infrastructure
pub fn infrastructure_buffer(infrastructure_distance: &Raster<f32>, buffer_m: f64) -> Vec<bool> {
    infrastructure_distance
        .values()
        .map(|d| (d as f64) < buffer_m)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands_by_group() {
        assert_eq!(msa_i_bucket(2, 300.0), 0.4);
        assert_eq!(msa_i_bucket(2, 301.0), 0.8);
        assert_eq!(msa_i_bucket(2, 5000.0), 1.0);
        assert_eq!(msa_i_bucket(9, 450.0), 0.4);
        assert_eq!(msa_i_bucket(9, 6999.0), 0.9);
        assert_eq!(msa_i_bucket(13, 0.0), 1.0);
        assert_eq!(msa_i_bucket(2, f32::INFINITY), 1.0);
    }

    #[test]
    fn test_raster_and_buffer() {
        let lulc = Raster::from_vec(vec![2, 9, 16], 1, 3).unwrap();
        let dist = Raster::from_vec(vec![0.0f32, 1500.0, 10.0], 1, 3).unwrap();
        let mi = msa_i(&lulc, &dist).unwrap();
        assert_eq!(mi.to_vec(), vec![0.4, 0.8, 1.0]);
        assert_eq!(infrastructure_buffer(&dist, 1000.0), vec![true, false, true]);
    }
}
