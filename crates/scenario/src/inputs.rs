//! Loading and checking the inputs of a run
//!
//! Everything is read and aligned against the base land-cover before the
//! first step, so malformed inputs abort the run without writing a row.

use std::path::{Path, PathBuf};

use landshift_algorithms::carbon::{CarbonParams, CarbonPoolTable};
use landshift_algorithms::globio::{GlobioConfig, ReclassTable};
use landshift_algorithms::landscape::proximity;
use landshift_algorithms::msa::MsaLuTable;
use landshift_algorithms::statistics::class_counts;
use landshift_core::io::read_geotiff;
use landshift_core::{Error, Raster, RasterElement, Result};
use tracing::{debug, info};

use crate::config::{EvaluatorKind, ScenarioConfig};
use crate::evaluator::{CarbonEvaluator, Evaluator, GlobioLayers, MsaEvaluator};

/// Carbon evaluator inputs
#[derive(Debug, Clone)]
pub struct CarbonInputs {
    pub biomass: Raster<f32>,
    pub pools: CarbonPoolTable,
}

/// MSA evaluator inputs
#[derive(Debug, Clone)]
pub struct MsaInputs {
    pub layers: GlobioLayers,
    pub reclass: ReclassTable,
    pub lu_table: Option<MsaLuTable>,
    /// Distance to the nearest infrastructure pixel
    pub infrastructure_distance: Option<Raster<f32>>,
    pub aoi: Option<Raster<f32>>,
}

/// All inputs of a run, aligned with the base land-cover
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub base_lulc: Raster<i32>,
    pub cell_size_m: f64,
    pub carbon: Option<CarbonInputs>,
    pub msa: Option<MsaInputs>,
}

fn read_aligned<T: RasterElement>(path: &Path, base: &Raster<i32>, what: &'static str) -> Result<Raster<T>> {
    let raster: Raster<T> = read_geotiff(path)?;
    base.ensure_aligned(&raster, what)?;
    debug!("Read {} from {}", what, path.display());
    Ok(raster)
}

fn required<'a>(path: &'a Option<PathBuf>, name: &str) -> Result<&'a Path> {
    path.as_deref()
        .ok_or_else(|| Error::Config(format!("{} is not set", name)))
}

/// Edge distances come from the raster geotransform, so a configured cell
/// size has to agree with it.
fn checked_cell_size(configured: Option<f64>, raster: f64) -> Result<f64> {
    match configured {
        None => Ok(raster),
        Some(cell) if (cell - raster).abs() <= 1e-6 * raster.abs().max(1.0) => Ok(cell),
        Some(cell) => Err(Error::Config(format!(
            "cell_size_m is {} but the base land-cover has {} map units per pixel",
            cell, raster
        ))),
    }
}

impl RunInputs {
    /// Read every input the configuration asks for
    pub fn load(config: &ScenarioConfig) -> Result<Self> {
        let base_lulc: Raster<i32> = read_geotiff(&config.base_lulc_path)?;
        info!(
            "Base land-cover {}: {} x {}",
            config.base_lulc_path.display(),
            base_lulc.cols(),
            base_lulc.rows()
        );
        let cell_size_m = checked_cell_size(config.cell_size_m, base_lulc.cell_size())?;

        let carbon = if config.uses(EvaluatorKind::Carbon) {
            let biomass_path = required(&config.base_biomass_path, "base_biomass_path")?;
            let pools_path = required(&config.carbon_pool_table_path, "carbon_pool_table_path")?;
            Some(CarbonInputs {
                biomass: read_aligned(biomass_path, &base_lulc, "base biomass")?,
                pools: CarbonPoolTable::load(pools_path)?,
            })
        } else {
            None
        };

        let msa = if config.uses(EvaluatorKind::Msa) {
            let layers = GlobioLayers {
                yieldgap_sum: read_aligned(
                    required(&config.yieldgap_sum_path, "yieldgap_sum_path")?,
                    &base_lulc,
                    "yield gap",
                )?,
                potential_veg: read_aligned(
                    required(&config.potential_veg_path, "potential_veg_path")?,
                    &base_lulc,
                    "potential vegetation",
                )?,
                pasture_frac: read_aligned(
                    required(&config.pasture_path, "pasture_path")?,
                    &base_lulc,
                    "pasture fraction",
                )?,
            };
            let reclass = ReclassTable::load(
                required(&config.reclass_table_path, "reclass_table_path")?,
                &config.reclass_source_column,
                &config.reclass_target_column,
            )?;
            let lu_table = config.msa_lu_table_path.as_deref().map(MsaLuTable::load).transpose()?;

            let infrastructure_distance = match config.infrastructure_path.as_deref() {
                Some(path) => {
                    let sources: Raster<f32> = read_aligned(path, &base_lulc, "infrastructure")?;
                    Some(proximity(&sources)?)
                }
                None => None,
            };
            let aoi = match config.aoi_mask_path.as_deref() {
                Some(path) => Some(read_aligned(path, &base_lulc, "area-of-interest mask")?),
                None => None,
            };

            Some(MsaInputs {
                layers,
                reclass,
                lu_table,
                infrastructure_distance,
                aoi,
            })
        } else {
            None
        };

        Ok(Self {
            base_lulc,
            cell_size_m,
            carbon,
            msa,
        })
    }

    /// Land-cover classes of the base state, ascending, excluding nodata
    pub fn base_classes(&self) -> Vec<i32> {
        class_counts(&self.base_lulc).into_keys().collect()
    }

    /// Calibrate and assemble the configured evaluators, carbon first.
    ///
    /// The evaluator inputs move into the evaluators; the base land-cover
    /// stays.
    pub fn take_evaluators(&mut self, config: &ScenarioConfig) -> Result<Vec<Box<dyn Evaluator>>> {
        let mut evaluators: Vec<Box<dyn Evaluator>> = Vec::new();

        if let Some(carbon) = self.carbon.take() {
            let params = CarbonParams {
                regression_codes: config.regression_codes.clone(),
                table_codes: config.table_codes.clone(),
                cell_size_m: self.cell_size_m,
            };
            let classes = if config.report_per_class {
                self.base_classes()
            } else {
                Vec::new()
            };
            let evaluator = CarbonEvaluator::calibrate(
                &carbon.biomass,
                &self.base_lulc,
                carbon.pools,
                config.forest_codes.clone(),
                params,
                classes,
            )?;
            evaluators.push(Box::new(evaluator));
        }

        if let Some(msa) = self.msa.take() {
            let globio = GlobioConfig {
                reclass: msa.reclass,
                params: config.globio_params(),
            };
            let mut evaluator =
                MsaEvaluator::new(msa.layers, globio, msa.lu_table, config.msa_f_params())?;
            if let Some(distance) = msa.infrastructure_distance {
                evaluator = evaluator.with_infrastructure(distance, config.infrastructure_buffer_m)?;
            }
            if let Some(aoi) = msa.aoi {
                evaluator = evaluator.with_aoi(aoi)?;
            }
            evaluators.push(Box::new(evaluator));
        }

        Ok(evaluators)
    }
}
