//! Aboveground carbon stock per pixel
//!
//! Each pixel takes the first carbon source that applies:
//!
//! 1. class in `regression_codes`, edge distance > 0 and a fitted
//!    regression: `slope * ln(d) + intercept`, clamped at 0
//! 2. class in `table_codes`: `C_ABOVE_MEAN * cell_area_ha`
//! 3. class seen in the base biomass: its mean per-pixel biomass
//! 4. otherwise 0, with a warning
//!
//! Regressions and class means are calibrated once from the base biomass,
//! base land-cover and base edge distance.

use std::collections::{BTreeMap, BTreeSet};

use landshift_core::raster::Raster;
use landshift_core::{Error, Result};
use tracing::{debug, warn};

use super::{CarbonPoolTable, LogRegression};

/// Class sets and cell size of a carbon model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarbonParams {
    /// Classes whose carbon follows the edge-distance regression
    pub regression_codes: BTreeSet<i32>,
    /// Classes whose carbon comes from the pool table
    pub table_codes: BTreeSet<i32>,
    /// Linear cell size in metres
    pub cell_size_m: f64,
}

/// Where a pixel's carbon came from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarbonSource {
    /// Regression value and whether it was clamped from below 0
    Regression { value: f64, clamped: bool },
    Table(f64),
    ClassMean(f64),
    Unresolved,
}

impl CarbonSource {
    pub fn value(self) -> f64 {
        match self {
            CarbonSource::Regression { value, .. } => value,
            CarbonSource::Table(v) | CarbonSource::ClassMean(v) => v,
            CarbonSource::Unresolved => 0.0,
        }
    }
}

/// Calibrated carbon model
#[derive(Debug, Clone)]
pub struct CarbonModel {
    params: CarbonParams,
    pools: CarbonPoolTable,
    cell_area_ha: f64,
    regressions: BTreeMap<i32, LogRegression>,
    class_means: BTreeMap<i32, f64>,
}

impl CarbonModel {
    /// Fit the per-class regressions and class means from the base state.
    ///
    /// `base_biomass` is in Mg per hectare. Every table code must have a row
    /// in `pools`.
    pub fn calibrate(
        base_biomass: &Raster<f32>,
        base_lulc: &Raster<i32>,
        base_edge_distance: &Raster<f32>,
        pools: CarbonPoolTable,
        params: CarbonParams,
    ) -> Result<Self> {
        if !(params.cell_size_m.is_finite() && params.cell_size_m > 0.0) {
            return Err(Error::InvalidParameter {
                name: "cell_size_m",
                value: params.cell_size_m.to_string(),
                reason: "must be positive".into(),
            });
        }
        if let Some(code) = params.table_codes.iter().find(|&&c| !pools.contains(c)) {
            return Err(Error::Config(format!(
                "table code {} has no row in the carbon pool table",
                code
            )));
        }

        base_lulc.ensure_aligned(base_biomass, "base biomass")?;
        base_lulc.ensure_aligned(base_edge_distance, "base edge distance")?;

        let cell_area_ha = params.cell_size_m * params.cell_size_m / 10_000.0;

        let mut training: BTreeMap<i32, Vec<(f64, f64)>> =
            params.regression_codes.iter().map(|&c| (c, Vec::new())).collect();
        let mut sums: BTreeMap<i32, (f64, usize)> = BTreeMap::new();

        for ((code, biomass), d) in base_lulc
            .values()
            .zip(base_biomass.values())
            .zip(base_edge_distance.values())
        {
            if base_lulc.is_nodata(code) || base_biomass.is_nodata(biomass) {
                continue;
            }
            let per_pixel = biomass as f64 * cell_area_ha;

            let entry = sums.entry(code).or_insert((0.0, 0));
            entry.0 += per_pixel;
            entry.1 += 1;

            if let Some(samples) = training.get_mut(&code) {
                if d > 0.0 {
                    samples.push((d as f64, per_pixel));
                }
            }
        }

        let mut regressions = BTreeMap::new();
        for (code, samples) in training {
            match LogRegression::fit(samples) {
                Some(fit) => {
                    debug!(
                        "Class {}: biomass = {:.6} * ln(d) + {:.6} ({} pixels)",
                        code, fit.slope, fit.intercept, fit.samples
                    );
                    regressions.insert(code, fit);
                }
                None => warn!(
                    "Class {}: no valid biomass pixels with positive edge distance, skipping regression",
                    code
                ),
            }
        }

        let class_means = sums
            .into_iter()
            .map(|(code, (sum, n))| (code, sum / n as f64))
            .collect();

        Ok(Self {
            params,
            pools,
            cell_area_ha,
            regressions,
            class_means,
        })
    }

    pub fn params(&self) -> &CarbonParams {
        &self.params
    }

    pub fn cell_area_ha(&self) -> f64 {
        self.cell_area_ha
    }

    pub fn regression(&self, code: i32) -> Option<&LogRegression> {
        self.regressions.get(&code)
    }

    /// Mean per-pixel base biomass of a class
    pub fn class_mean(&self, code: i32) -> Option<f64> {
        self.class_means.get(&code).copied()
    }

    /// Carbon of one pixel of class `code` at edge distance `d`
    pub fn pixel_carbon(&self, code: i32, d: f64) -> CarbonSource {
        if self.params.regression_codes.contains(&code) && d > 0.0 {
            if let Some(fit) = self.regressions.get(&code) {
                let raw = fit.predict(d);
                return CarbonSource::Regression {
                    value: raw.max(0.0),
                    clamped: raw < 0.0,
                };
            }
        }
        if self.params.table_codes.contains(&code) {
            if let Some(pool) = self.pools.get(code) {
                return CarbonSource::Table(pool.c_above_mean * self.cell_area_ha);
            }
        }
        match self.class_means.get(&code) {
            Some(&mean) => CarbonSource::ClassMean(mean),
            None => CarbonSource::Unresolved,
        }
    }

    /// Carbon in Mg per pixel for a land-cover and its edge distance.
    ///
    /// Land-cover nodata yields NaN.
    pub fn carbon_stock(&self, lulc: &Raster<i32>, edge_distance: &Raster<f32>) -> Result<Raster<f32>> {
        lulc.ensure_aligned(edge_distance, "edge distance")?;

        let mut clamped = 0usize;
        let mut unresolved: BTreeMap<i32, usize> = BTreeMap::new();

        let values: Vec<f32> = lulc
            .values()
            .zip(edge_distance.values())
            .map(|(code, d)| {
                if lulc.is_nodata(code) {
                    return f32::NAN;
                }
                let source = self.pixel_carbon(code, d as f64);
                match source {
                    CarbonSource::Regression { clamped: true, .. } => clamped += 1,
                    CarbonSource::Unresolved => *unresolved.entry(code).or_insert(0) += 1,
                    _ => {}
                }
                source.value() as f32
            })
            .collect();

        if clamped > 0 {
            warn!("{} pixels had a negative regression estimate, clamped to 0", clamped);
        }
        for (code, count) in &unresolved {
            warn!("Class {} has no carbon source, {} pixels set to 0", code, count);
        }

        lulc.with_values(values, Some(f32::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carbon::CarbonPool;
    use crate::landscape::edge_distance;
    use approx::assert_relative_eq;
    use landshift_core::GeoTransform;

    fn pools() -> CarbonPoolTable {
        let mut map = BTreeMap::new();
        map.insert(
            10,
            CarbonPool {
                c_above_mean: 8.0,
                c_below: None,
                c_soil: None,
                c_dead: None,
            },
        );
        CarbonPoolTable::new(map)
    }

    fn codes(c: &[i32]) -> BTreeSet<i32> {
        c.iter().copied().collect()
    }

    /// 64x64 grid at 100 m with a forest disk, biomass 2 ln(d) + 5 inside
    fn disk() -> (Raster<i32>, Raster<f32>, Raster<f32>) {
        let n = 64;
        let mut lulc: Raster<i32> = Raster::filled(n, n, 10);
        lulc.set_transform(GeoTransform::new(0.0, 6400.0, 100.0, -100.0));
        for r in 0..n {
            for c in 0..n {
                let (dr, dc) = (r as f64 - 31.5, c as f64 - 31.5);
                if (dr * dr + dc * dc).sqrt() < 28.0 {
                    lulc.set(r, c, 1).unwrap();
                }
            }
        }
        let d = edge_distance(&lulc, &codes(&[1])).unwrap();
        let biomass_values: Vec<f32> = lulc
            .values()
            .zip(d.values())
            .map(|(code, dist)| {
                if code == 1 {
                    (2.0 * (dist as f64).ln() + 5.0) as f32
                } else {
                    3.0
                }
            })
            .collect();
        let biomass = lulc.with_values(biomass_values, Some(f32::NAN)).unwrap();
        (lulc, biomass, d)
    }

    #[test]
    fn test_regression_recovers_log_model() {
        let (lulc, biomass, d) = disk();
        let params = CarbonParams {
            regression_codes: codes(&[1]),
            table_codes: codes(&[10]),
            cell_size_m: 100.0,
        };
        let model = CarbonModel::calibrate(&biomass, &lulc, &d, pools(), params).unwrap();

        let fit = model.regression(1).unwrap();
        assert_relative_eq!(fit.slope, 2.0, epsilon = 0.05);
        assert_relative_eq!(fit.intercept, 5.0, epsilon = 0.05);
        assert_relative_eq!(fit.predict(10.0), 9.605, epsilon = 0.05);

        let stock = model.carbon_stock(&lulc, &d).unwrap();
        assert_relative_eq!(stock.get(0, 0).unwrap(), 8.0);
        let centre_d = d.get(32, 32).unwrap() as f64;
        assert_relative_eq!(
            stock.get(32, 32).unwrap() as f64,
            2.0 * centre_d.ln() + 5.0,
            epsilon = 1e-3
        );
        assert!(stock.values().all(|v| v >= 0.0));
    }

    #[test]
    fn test_fallback_order() {
        let (lulc, biomass, d) = disk();
        let params = CarbonParams {
            regression_codes: codes(&[1, 2]),
            table_codes: BTreeSet::new(),
            cell_size_m: 100.0,
        };
        let model = CarbonModel::calibrate(&biomass, &lulc, &d, pools(), params).unwrap();

        // Class 2 never occurs: regression skipped, no mean either
        assert!(model.regression(2).is_none());
        assert_eq!(model.pixel_carbon(2, 500.0), CarbonSource::Unresolved);
        // Class 10 is not a table code here, so it takes its base mean
        assert_eq!(model.pixel_carbon(10, 0.0), CarbonSource::ClassMean(3.0));
        // Regression class at d = 0 falls through to its mean
        assert!(matches!(model.pixel_carbon(1, 0.0), CarbonSource::ClassMean(_)));
    }

    #[test]
    fn test_negative_regression_is_clamped() {
        let (lulc, biomass, d) = disk();
        let params = CarbonParams {
            regression_codes: codes(&[1]),
            table_codes: codes(&[10]),
            cell_size_m: 100.0,
        };
        let model = CarbonModel::calibrate(&biomass, &lulc, &d, pools(), params).unwrap();
        // 2 ln(d) + 5 < 0 for d < e^-2.5
        assert_eq!(
            model.pixel_carbon(1, 0.01),
            CarbonSource::Regression {
                value: 0.0,
                clamped: true
            }
        );
    }

    #[test]
    fn test_table_code_without_pool_is_config_error() {
        let (lulc, biomass, d) = disk();
        let params = CarbonParams {
            regression_codes: BTreeSet::new(),
            table_codes: codes(&[7]),
            cell_size_m: 100.0,
        };
        assert!(matches!(
            CarbonModel::calibrate(&biomass, &lulc, &d, pools(), params),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_nodata_lulc_is_nan() {
        let (mut lulc, biomass, d) = disk();
        let params = CarbonParams {
            regression_codes: codes(&[1]),
            table_codes: codes(&[10]),
            cell_size_m: 100.0,
        };
        let model = CarbonModel::calibrate(&biomass, &lulc, &d, pools(), params).unwrap();
        lulc.set_nodata(Some(-1));
        lulc.set(0, 0, -1).unwrap();
        let stock = model.carbon_stock(&lulc, &d).unwrap();
        assert!(stock.get(0, 0).unwrap().is_nan());
    }
}
