//! Per-step indicator evaluators

use std::collections::BTreeSet;
use std::path::Path;

use landshift_algorithms::carbon::{CarbonModel, CarbonParams, CarbonPoolTable};
use landshift_algorithms::globio::{globio_land_cover, GlobioConfig};
use landshift_algorithms::landscape::edge_distance;
use landshift_algorithms::msa::{combine_msa, infrastructure_buffer, msa_f, msa_i, msa_lu, MsaFParams, MsaLuTable};
use landshift_algorithms::statistics::{class_summaries, masked_summary, Summary};
use landshift_core::io::write_geotiff;
use landshift_core::{Error, Raster, Result};

/// A raster produced while evaluating a step
#[derive(Debug, Clone)]
pub enum MapLayer {
    Int(Raster<i32>),
    Float(Raster<f32>),
}

impl MapLayer {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            MapLayer::Int(r) => write_geotiff(r, path),
            MapLayer::Float(r) => write_geotiff(r, path),
        }
    }
}

/// Indicator values of one step, in column order, plus optional maps
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub values: Vec<f64>,
    pub maps: Vec<(&'static str, MapLayer)>,
}

/// Computes indicator columns from the working land-cover
pub trait Evaluator {
    fn name(&self) -> &'static str;

    /// CSV column names, fixed for the whole run
    fn columns(&self) -> Vec<String>;

    /// Evaluate one snapshot. Maps are only returned when `keep_maps` is set.
    fn evaluate(&self, lulc: &Raster<i32>, keep_maps: bool) -> Result<StepOutput>;
}

fn require_valid(summary: Summary, what: &str) -> Result<Summary> {
    if summary.count == 0 {
        return Err(Error::Nodata(format!("{} has no valid pixel", what)));
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Carbon
// ---------------------------------------------------------------------------

/// Total aboveground carbon, optionally split by land-cover class
#[derive(Debug, Clone)]
pub struct CarbonEvaluator {
    model: CarbonModel,
    forest_codes: BTreeSet<i32>,
    classes: Vec<i32>,
}

impl CarbonEvaluator {
    /// Calibrate on the base state. `classes` adds a `carbon_mg_<code>`
    /// column per code.
    pub fn calibrate(
        base_biomass: &Raster<f32>,
        base_lulc: &Raster<i32>,
        pools: CarbonPoolTable,
        forest_codes: BTreeSet<i32>,
        params: CarbonParams,
        classes: Vec<i32>,
    ) -> Result<Self> {
        let base_distance = edge_distance(base_lulc, &forest_codes)?;
        let model = CarbonModel::calibrate(base_biomass, base_lulc, &base_distance, pools, params)?;
        Ok(Self {
            model,
            forest_codes,
            classes,
        })
    }

    pub fn model(&self) -> &CarbonModel {
        &self.model
    }
}

impl Evaluator for CarbonEvaluator {
    fn name(&self) -> &'static str {
        "carbon"
    }

    fn columns(&self) -> Vec<String> {
        std::iter::once("total_carbon_mg".to_string())
            .chain(self.classes.iter().map(|c| format!("carbon_mg_{}", c)))
            .collect()
    }

    fn evaluate(&self, lulc: &Raster<i32>, keep_maps: bool) -> Result<StepOutput> {
        let distance = edge_distance(lulc, &self.forest_codes)?;
        let stock = self.model.carbon_stock(lulc, &distance)?;

        let total = require_valid(masked_summary::<u8>(&stock, None)?, "carbon stock")?;
        let mut values = vec![total.sum];
        if !self.classes.is_empty() {
            let by_class = class_summaries(&stock, lulc)?;
            values.extend(
                self.classes
                    .iter()
                    .map(|c| by_class.get(c).map_or(0.0, |s| s.sum)),
            );
        }

        let maps = if keep_maps {
            vec![
                ("edge_distance", MapLayer::Float(distance)),
                ("carbon", MapLayer::Float(stock)),
            ]
        } else {
            Vec::new()
        };
        Ok(StepOutput { values, maps })
    }
}

// ---------------------------------------------------------------------------
// MSA
// ---------------------------------------------------------------------------

/// Auxiliary layers of the GLOBIO derivation, aligned with the land-cover
#[derive(Debug, Clone)]
pub struct GlobioLayers {
    pub yieldgap_sum: Raster<f32>,
    pub potential_veg: Raster<f32>,
    pub pasture_frac: Raster<f32>,
}

#[derive(Debug, Clone)]
struct Infrastructure {
    distance: Raster<f32>,
    buffer: Vec<bool>,
}

/// Mean species abundance averaged over the area of interest
#[derive(Debug, Clone)]
pub struct MsaEvaluator {
    layers: GlobioLayers,
    globio: GlobioConfig,
    lu_table: Option<MsaLuTable>,
    msa_f: MsaFParams,
    infrastructure: Option<Infrastructure>,
    aoi: Option<Raster<f32>>,
}

impl MsaEvaluator {
    pub fn new(
        layers: GlobioLayers,
        globio: GlobioConfig,
        lu_table: Option<MsaLuTable>,
        msa_f: MsaFParams,
    ) -> Result<Self> {
        globio.params.validate()?;
        layers
            .yieldgap_sum
            .ensure_aligned(&layers.potential_veg, "potential vegetation")?;
        layers
            .yieldgap_sum
            .ensure_aligned(&layers.pasture_frac, "pasture fraction")?;
        Ok(Self {
            layers,
            globio,
            lu_table,
            msa_f,
            infrastructure: None,
            aoi: None,
        })
    }

    /// Add the MSA_I component from a distance-to-infrastructure raster.
    ///
    /// Natural pixels closer than `buffer_m` stop counting as natural in
    /// the MSA_F blur.
    pub fn with_infrastructure(mut self, distance: Raster<f32>, buffer_m: f64) -> Result<Self> {
        self.layers
            .yieldgap_sum
            .ensure_aligned(&distance, "infrastructure distance")?;
        let buffer = infrastructure_buffer(&distance, buffer_m);
        self.infrastructure = Some(Infrastructure { distance, buffer });
        Ok(self)
    }

    /// Average only where `mask == 1`
    pub fn with_aoi(mut self, mask: Raster<f32>) -> Result<Self> {
        self.layers
            .yieldgap_sum
            .ensure_aligned(&mask, "area-of-interest mask")?;
        self.aoi = Some(mask);
        Ok(self)
    }

    fn mean(&self, values: &Raster<f32>, what: &str) -> Result<f64> {
        let summary = require_valid(masked_summary(values, self.aoi.as_ref())?, what)?;
        Ok(summary.mean().unwrap_or(0.0))
    }
}

impl Evaluator for MsaEvaluator {
    fn name(&self) -> &'static str {
        "msa"
    }

    fn columns(&self) -> Vec<String> {
        let mut columns = vec!["avg_msa".to_string(), "avg_msa_lu".to_string(), "avg_msa_f".to_string()];
        if self.infrastructure.is_some() {
            columns.push("avg_msa_i".to_string());
        }
        columns
    }

    fn evaluate(&self, lulc: &Raster<i32>, keep_maps: bool) -> Result<StepOutput> {
        let globio = globio_land_cover(
            lulc,
            &self.layers.yieldgap_sum,
            &self.layers.potential_veg,
            &self.layers.pasture_frac,
            &self.globio,
        )?;
        let lu = msa_lu(&globio.lulc, self.lu_table.as_ref())?;
        let buffer = self.infrastructure.as_ref().map(|i| i.buffer.as_slice());
        let f = msa_f(lulc, &self.msa_f, buffer)?;
        let i = self
            .infrastructure
            .as_ref()
            .map(|infra| msa_i(lulc, &infra.distance))
            .transpose()?;

        let msa = match &i {
            Some(i) => combine_msa(&[&f, &lu, i])?,
            None => combine_msa(&[&f, &lu])?,
        };

        let mut values = vec![
            self.mean(&msa, "MSA")?,
            self.mean(&lu, "MSA_LU")?,
            self.mean(&f, "MSA_F")?,
        ];
        if let Some(i) = &i {
            values.push(self.mean(i, "MSA_I")?);
        }

        let mut maps = Vec::new();
        if keep_maps {
            maps.push(("globio_lulc", MapLayer::Int(globio.lulc)));
            maps.push(("msa_lu", MapLayer::Float(lu)));
            maps.push(("msa_f", MapLayer::Float(f)));
            if let Some(i) = i {
                maps.push(("msa_i", MapLayer::Float(i)));
            }
            maps.push(("msa", MapLayer::Float(msa)));
        }
        Ok(StepOutput { values, maps })
    }
}
