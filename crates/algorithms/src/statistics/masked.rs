//! Masked and per-class reductions
//!
//! Reductions skip nodata cells. An optional area-of-interest mask restricts
//! them to cells where the mask equals 1.

use std::collections::BTreeMap;

use landshift_core::raster::{Raster, RasterElement};
use landshift_core::Result;

/// Sum, count and mean of the cells that took part in a reduction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub sum: f64,
}

impl Summary {
    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
    }

    /// Mean of the reduced cells, `None` when nothing was reduced
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Reduce the valid cells of `values`, optionally only inside `mask == 1`.
///
/// The mask must be aligned with `values`.
pub fn masked_summary<M: RasterElement>(values: &Raster<f32>, mask: Option<&Raster<M>>) -> Result<Summary> {
    if let Some(m) = mask {
        values.ensure_aligned(m, "area-of-interest mask")?;
    }

    let mut summary = Summary::default();
    match mask {
        Some(m) => {
            for (v, mv) in values.values().zip(m.values()) {
                if values.is_nodata(v) || !in_mask(m, mv) {
                    continue;
                }
                summary.add(v as f64);
            }
        }
        None => {
            for v in values.values() {
                if !values.is_nodata(v) {
                    summary.add(v as f64);
                }
            }
        }
    }
    Ok(summary)
}

fn in_mask<M: RasterElement>(mask: &Raster<M>, value: M) -> bool {
    !mask.is_nodata(value) && value.to_f64() == Some(1.0)
}

/// Per-class reduction of `values` over the classes of `zones`.
///
/// Cells where either raster is nodata are skipped.
pub fn class_summaries(values: &Raster<f32>, zones: &Raster<i32>) -> Result<BTreeMap<i32, Summary>> {
    zones.ensure_aligned(values, "class zones")?;

    let mut out: BTreeMap<i32, Summary> = BTreeMap::new();
    for (v, zone) in values.values().zip(zones.values()) {
        if values.is_nodata(v) || zones.is_nodata(zone) {
            continue;
        }
        out.entry(zone).or_default().add(v as f64);
    }
    Ok(out)
}

/// Number of cells per class, nodata excluded
pub fn class_counts(lulc: &Raster<i32>) -> BTreeMap<i32, usize> {
    let mut out = BTreeMap::new();
    for v in lulc.values() {
        if !lulc.is_nodata(v) {
            *out.entry(v).or_insert(0) += 1;
        }
    }
    out
}

/// Number of cells whose class changed between `before` and `after`,
/// keyed by the class in `before`.
pub fn changed_by_class(before: &Raster<i32>, after: &Raster<i32>) -> Result<BTreeMap<i32, usize>> {
    before.ensure_aligned(after, "land-cover change")?;

    let mut out = BTreeMap::new();
    for (b, a) in before.values().zip(after.values()) {
        if b != a && !before.is_nodata(b) {
            *out.entry(b).or_insert(0) += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use landshift_core::{Error, GeoTransform};

    #[test]
    fn test_summary_skips_nodata() {
        let mut v = Raster::from_vec(vec![1.0, 2.0, f32::NAN, 3.0], 2, 2).unwrap();
        v.set_nodata(Some(f32::NAN));
        let s = masked_summary::<u8>(&v, None).unwrap();
        assert_eq!(s.count, 3);
        assert_relative_eq!(s.mean().unwrap(), 2.0);
    }

    #[test]
    fn test_summary_respects_mask() {
        let v = Raster::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let mask = Raster::from_vec(vec![1u8, 0, 1, 255], 2, 2).unwrap();
        let s = masked_summary(&v, Some(&mask)).unwrap();
        assert_eq!(s.count, 2);
        assert_relative_eq!(s.sum, 4.0);

        let mut shifted = mask.clone();
        shifted.set_transform(GeoTransform::new(5.0, 0.0, 1.0, -1.0));
        assert!(matches!(
            masked_summary(&v, Some(&shifted)),
            Err(Error::Mismatch { .. })
        ));
    }

    #[test]
    fn test_empty_summary_has_no_mean() {
        let v: Raster<f32> = Raster::filled(2, 2, f32::NAN);
        assert_eq!(masked_summary::<u8>(&v, None).unwrap().mean(), None);
    }

    #[test]
    fn test_class_reductions() {
        let lulc = Raster::from_vec(vec![1, 1, 2, 3], 2, 2).unwrap();
        let carbon = Raster::from_vec(vec![10.0f32, 5.0, 1.0, f32::NAN], 2, 2).unwrap();
        let sums = class_summaries(&carbon, &lulc).unwrap();
        assert_relative_eq!(sums[&1].sum, 15.0);
        assert_eq!(sums[&2].count, 1);
        assert!(!sums.contains_key(&3));

        assert_eq!(class_counts(&lulc)[&1], 2);

        let after = Raster::from_vec(vec![9, 1, 9, 3], 2, 2).unwrap();
        let changed = changed_by_class(&lulc, &after).unwrap();
        assert_eq!(changed[&1], 1);
        assert_eq!(changed[&2], 1);
        assert!(!changed.contains_key(&3));
    }
}
