//! Run configuration
//!
//! A scenario run is described by one JSON document. Unknown keys are
//! rejected so that typos surface as configuration errors instead of being
//! silently ignored. Relative paths are resolved against the directory of
//! the configuration file.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use landshift_algorithms::globio::{GlobioParams, DEFAULT_SOURCE_COLUMN, DEFAULT_TARGET_COLUMN};
use landshift_algorithms::msa::{MsaFParams, DEFAULT_BUFFER_M};
use landshift_core::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Conversion policy and its options
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Read each step's land-cover from `path / pattern`, with `%n`
    /// replaced by the step number
    Predefined { path: PathBuf, pattern: String },
    EdgeExpansion,
    CoreExpansion,
    CoreFragmentation,
    SingleClass {
        source_code: i32,
        #[serde(default)]
        then_edge_expansion: bool,
    },
    /// Start and end shares, in percent, per contributing source code
    Composite {
        #[serde(deserialize_with = "code_shares")]
        start: BTreeMap<i32, f64>,
        #[serde(deserialize_with = "code_shares")]
        end: BTreeMap<i32, f64>,
    },
}

/// JSON object keys are strings; an internally tagged enum buffers them
/// as such, so land-cover codes are parsed here.
fn code_shares<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<i32, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    BTreeMap::<String, f64>::deserialize(deserializer)?
        .into_iter()
        .map(|(key, share)| {
            key.trim()
                .parse::<i32>()
                .map(|code| (code, share))
                .map_err(|_| D::Error::custom(format!("invalid land-cover code '{}'", key)))
        })
        .collect()
}

impl ScenarioKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Predefined { .. } => "predefined",
            ScenarioKind::EdgeExpansion => "edge_expansion",
            ScenarioKind::CoreExpansion => "core_expansion",
            ScenarioKind::CoreFragmentation => "core_fragmentation",
            ScenarioKind::SingleClass { .. } => "single_class",
            ScenarioKind::Composite { .. } => "composite",
        }
    }

    /// Policies that convert forest by edge distance
    fn converts_forest(&self) -> bool {
        matches!(
            self,
            ScenarioKind::EdgeExpansion
                | ScenarioKind::CoreExpansion
                | ScenarioKind::CoreFragmentation
                | ScenarioKind::SingleClass {
                    then_edge_expansion: true,
                    ..
                }
        )
    }
}

/// Indicator families computed at every step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorKind {
    Carbon,
    Msa,
}

/// Which steps get their maps written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveMaps {
    #[default]
    None,
    FirstLast,
    All,
}

impl SaveMaps {
    pub fn includes(self, step: i32, total_steps: i32) -> bool {
        match self {
            SaveMaps::None => false,
            SaveMaps::FirstLast => step == 0 || step == total_steps,
            SaveMaps::All => true,
        }
    }
}

/// Complete description of a scenario run
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub base_lulc_path: PathBuf,
    pub scenario: ScenarioKind,
    #[serde(default)]
    pub converting_code: i32,
    #[serde(default)]
    pub pixels_per_step: i32,
    pub total_steps: i32,
    pub output_csv_path: PathBuf,
    #[serde(default)]
    pub evaluators: Vec<EvaluatorKind>,

    /// Linear cell size; taken from the base land-cover when absent
    #[serde(default)]
    pub cell_size_m: Option<f64>,
    #[serde(default)]
    pub forest_codes: BTreeSet<i32>,

    // Carbon
    #[serde(default)]
    pub base_biomass_path: Option<PathBuf>,
    #[serde(default)]
    pub carbon_pool_table_path: Option<PathBuf>,
    #[serde(default)]
    pub regression_codes: BTreeSet<i32>,
    #[serde(default)]
    pub table_codes: BTreeSet<i32>,

    // GLOBIO
    #[serde(default)]
    pub reclass_table_path: Option<PathBuf>,
    #[serde(default = "default_reclass_source_column")]
    pub reclass_source_column: String,
    #[serde(default = "default_reclass_target_column")]
    pub reclass_target_column: String,
    #[serde(default)]
    pub yieldgap_sum_path: Option<PathBuf>,
    #[serde(default)]
    pub potential_veg_path: Option<PathBuf>,
    #[serde(default)]
    pub pasture_path: Option<PathBuf>,
    #[serde(default = "default_yieldgap_threshold")]
    pub yieldgap_threshold: f64,
    #[serde(default = "default_pasture_threshold")]
    pub pasture_threshold: f64,
    #[serde(default = "default_primary_threshold")]
    pub primary_threshold: f64,
    #[serde(default = "default_secondary_threshold")]
    pub secondary_threshold: f64,
    #[serde(default = "default_globio_sigma_px")]
    pub globio_sigma_px: f64,
    #[serde(default = "default_globio_natural_codes")]
    pub globio_natural_codes: BTreeSet<i32>,

    // MSA
    #[serde(default)]
    pub msa_lu_table_path: Option<PathBuf>,
    #[serde(default = "default_msa_f_sigma_px")]
    pub msa_f_sigma_px: f64,
    #[serde(default = "default_msa_natural_codes")]
    pub msa_natural_codes: BTreeSet<i32>,
    #[serde(default)]
    pub infrastructure_path: Option<PathBuf>,
    #[serde(default = "default_infrastructure_buffer_m")]
    pub infrastructure_buffer_m: f64,
    #[serde(default)]
    pub aoi_mask_path: Option<PathBuf>,

    // Reporting
    #[serde(default)]
    pub report_per_class: bool,
    #[serde(default)]
    pub save_maps: SaveMaps,
    #[serde(default)]
    pub map_output_dir: Option<PathBuf>,
}

fn default_reclass_source_column() -> String {
    DEFAULT_SOURCE_COLUMN.to_string()
}

fn default_reclass_target_column() -> String {
    DEFAULT_TARGET_COLUMN.to_string()
}

fn default_yieldgap_threshold() -> f64 {
    GlobioParams::default().yieldgap_threshold
}

fn default_pasture_threshold() -> f64 {
    GlobioParams::default().pasture_threshold
}

fn default_primary_threshold() -> f64 {
    GlobioParams::default().primary_threshold
}

fn default_secondary_threshold() -> f64 {
    GlobioParams::default().secondary_threshold
}

fn default_globio_sigma_px() -> f64 {
    GlobioParams::default().sigma_px
}

fn default_globio_natural_codes() -> BTreeSet<i32> {
    GlobioParams::default().natural_codes
}

fn default_msa_f_sigma_px() -> f64 {
    MsaFParams::default().sigma_px
}

fn default_msa_natural_codes() -> BTreeSet<i32> {
    MsaFParams::default().natural_codes
}

fn default_infrastructure_buffer_m() -> f64 {
    DEFAULT_BUFFER_M
}

impl ScenarioConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("invalid scenario configuration: {}", e)))
    }

    /// Read a configuration file; relative paths become relative to its
    /// directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::from_io(e, path))?;
        let mut config: Self = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        if let Some(dir) = path.parent() {
            config.rebase(dir);
        }
        Ok(config)
    }

    /// Join every relative path onto `dir`
    pub fn rebase(&mut self, dir: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };

        join(&mut self.base_lulc_path);
        join(&mut self.output_csv_path);
        for p in [
            &mut self.base_biomass_path,
            &mut self.carbon_pool_table_path,
            &mut self.reclass_table_path,
            &mut self.yieldgap_sum_path,
            &mut self.potential_veg_path,
            &mut self.pasture_path,
            &mut self.msa_lu_table_path,
            &mut self.infrastructure_path,
            &mut self.aoi_mask_path,
            &mut self.map_output_dir,
        ]
        .into_iter()
        .flatten()
        {
            join(p);
        }
        if let ScenarioKind::Predefined { path, .. } = &mut self.scenario {
            join(path);
        }
    }

    pub fn uses(&self, evaluator: EvaluatorKind) -> bool {
        self.evaluators.contains(&evaluator)
    }

    pub fn globio_params(&self) -> GlobioParams {
        GlobioParams {
            yieldgap_threshold: self.yieldgap_threshold,
            pasture_threshold: self.pasture_threshold,
            primary_threshold: self.primary_threshold,
            secondary_threshold: self.secondary_threshold,
            sigma_px: self.globio_sigma_px,
            natural_codes: self.globio_natural_codes.clone(),
        }
    }

    pub fn msa_f_params(&self) -> MsaFParams {
        MsaFParams {
            natural_codes: self.msa_natural_codes.clone(),
            sigma_px: self.msa_f_sigma_px,
        }
    }

    /// Reject missing or contradictory options
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if self.total_steps < 0 {
            return fail(format!("total_steps must be >= 0, got {}", self.total_steps));
        }
        if !matches!(self.scenario, ScenarioKind::Predefined { .. }) && self.pixels_per_step <= 0 {
            return fail(format!("pixels_per_step must be > 0, got {}", self.pixels_per_step));
        }
        if let Some(cell) = self.cell_size_m {
            if !(cell.is_finite() && cell > 0.0) {
                return fail(format!("cell_size_m must be > 0, got {}", cell));
            }
        }
        if self.evaluators.is_empty() {
            return fail("at least one evaluator ('carbon' or 'msa') is required".into());
        }

        self.validate_scenario()?;

        if self.uses(EvaluatorKind::Carbon) {
            self.require("base_biomass_path", &self.base_biomass_path)?;
            self.require("carbon_pool_table_path", &self.carbon_pool_table_path)?;
            if let Some(code) = self.regression_codes.difference(&self.forest_codes).next() {
                return fail(format!("regression code {} is not in forest_codes", code));
            }
        }

        if self.uses(EvaluatorKind::Msa) {
            self.require("reclass_table_path", &self.reclass_table_path)?;
            self.require("yieldgap_sum_path", &self.yieldgap_sum_path)?;
            self.require("potential_veg_path", &self.potential_veg_path)?;
            self.require("pasture_path", &self.pasture_path)?;
            if self.secondary_threshold > self.primary_threshold {
                return fail(format!(
                    "secondary_threshold {} exceeds primary_threshold {}",
                    self.secondary_threshold, self.primary_threshold
                ));
            }
            for (name, sigma) in [("globio_sigma_px", self.globio_sigma_px), ("msa_f_sigma_px", self.msa_f_sigma_px)] {
                if !(sigma.is_finite() && sigma > 0.0) {
                    return fail(format!("{} must be > 0, got {}", name, sigma));
                }
            }
            if self.infrastructure_buffer_m.is_nan() || self.infrastructure_buffer_m < 0.0 {
                return fail(format!(
                    "infrastructure_buffer_m must be >= 0, got {}",
                    self.infrastructure_buffer_m
                ));
            }
        }

        if self.save_maps != SaveMaps::None && self.map_output_dir.is_none() {
            return fail("save_maps requires map_output_dir".into());
        }
        Ok(())
    }

    fn validate_scenario(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(msg));

        if self.scenario.converts_forest() {
            if self.forest_codes.is_empty() {
                return fail(format!("{} needs forest_codes", self.scenario.name()));
            }
            if self.forest_codes.contains(&self.converting_code) {
                return fail(format!(
                    "converting_code {} is a forest code; {} would never shrink the forest",
                    self.converting_code,
                    self.scenario.name()
                ));
            }
        }

        match &self.scenario {
            ScenarioKind::Predefined { pattern, .. } if pattern.is_empty() => {
                fail("predefined scenario needs a non-empty pattern".into())
            }
            ScenarioKind::SingleClass { source_code, .. } if *source_code == self.converting_code => fail(format!(
                "single_class source_code {} equals converting_code",
                source_code
            )),
            ScenarioKind::Composite { start, end } => {
                if start.is_empty() {
                    return fail("composite scenario needs at least one source code".into());
                }
                if start.keys().ne(end.keys()) {
                    return fail("composite start and end must list the same source codes".into());
                }
                if start.contains_key(&self.converting_code) {
                    return fail(format!(
                        "converting_code {} is also a composite source code",
                        self.converting_code
                    ));
                }
                for (label, shares) in [("start", start), ("end", end)] {
                    if let Some((code, share)) = shares.iter().find(|(_, s)| !(0.0..=100.0).contains(*s)) {
                        return fail(format!(
                            "composite {} share of code {} is {}, outside [0, 100]",
                            label, code, share
                        ));
                    }
                    let total: f64 = shares.values().sum();
                    if (total - 100.0).abs() > 1e-6 {
                        return fail(format!("composite {} shares sum to {}, not 100", label, total));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn require(&self, name: &str, value: &Option<PathBuf>) -> Result<()> {
        if value.is_none() {
            return Err(Error::Config(format!(
                "{} is required by the configured evaluators",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGE: &str = r#"{
        "base_lulc_path": "lulc.tif",
        "base_biomass_path": "biomass.tif",
        "carbon_pool_table_path": "pools.csv",
        "forest_codes": [1, 2],
        "regression_codes": [1],
        "table_codes": [9],
        "scenario": {"kind": "edge_expansion"},
        "converting_code": 9,
        "pixels_per_step": 10,
        "total_steps": 5,
        "evaluators": ["carbon"],
        "output_csv_path": "out/carbon.csv"
    }"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ScenarioConfig::from_json_str(EDGE).unwrap();
        assert_eq!(config.scenario, ScenarioKind::EdgeExpansion);
        assert_eq!(config.primary_threshold, 0.66);
        assert_eq!(config.msa_f_sigma_px, 3.0);
        assert!(config.msa_natural_codes.contains(&16));
        assert_eq!(config.save_maps, SaveMaps::None);
        assert_eq!(config.reclass_target_column, "globio_broad");
        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_field_is_config_error() {
        let json = EDGE.replace("\"total_steps\"", "\"total_stepz\": 1, \"total_steps\"");
        assert!(matches!(ScenarioConfig::from_json_str(&json), Err(Error::Config(_))));
    }

    #[test]
    fn test_rebase_relative_paths() {
        let mut config = ScenarioConfig::from_json_str(EDGE).unwrap();
        config.rebase(Path::new("/data/run"));
        assert_eq!(config.base_lulc_path, PathBuf::from("/data/run/lulc.tif"));
        assert_eq!(config.output_csv_path, PathBuf::from("/data/run/out/carbon.csv"));
        assert_eq!(config.carbon_pool_table_path, Some(PathBuf::from("/data/run/pools.csv")));
    }

    #[test]
    fn test_contradictions() {
        let base = ScenarioConfig::from_json_str(EDGE).unwrap();

        let mut c = base.clone();
        c.converting_code = 2;
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = base.clone();
        c.pixels_per_step = 0;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.evaluators.push(EvaluatorKind::Msa);
        assert!(c.validate().is_err(), "msa without GLOBIO inputs");

        let mut c = base.clone();
        c.save_maps = SaveMaps::All;
        assert!(c.validate().is_err());

        let mut c = base.clone();
        c.cell_size_m = Some(-30.0);
        assert!(c.validate().is_err());

        let mut c = base;
        c.regression_codes.insert(7);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_composite_shares() {
        let json = EDGE.replace(
            r#"{"kind": "edge_expansion"}"#,
            r#"{"kind": "composite", "start": {"2": 20, "9": 80}, "end": {"2": 80, "9": 20}}"#,
        );
        let mut config = ScenarioConfig::from_json_str(&json).unwrap();
        config.converting_code = 5;
        config.validate().unwrap();
        match &config.scenario {
            ScenarioKind::Composite { start, end } => {
                assert_eq!(start.get(&2), Some(&20.0));
                assert_eq!(end.get(&9), Some(&20.0));
            }
            other => panic!("expected composite, got {:?}", other),
        }

        if let ScenarioKind::Composite { end, .. } = &mut config.scenario {
            end.insert(2, 90.0);
        }
        assert!(config.validate().is_err());

        let bad_code = EDGE.replace(
            r#"{"kind": "edge_expansion"}"#,
            r#"{"kind": "composite", "start": {"grass": 100}, "end": {"grass": 100}}"#,
        );
        assert!(matches!(
            ScenarioConfig::from_json_str(&bad_code),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_save_maps_selection() {
        assert!(SaveMaps::FirstLast.includes(0, 10));
        assert!(SaveMaps::FirstLast.includes(10, 10));
        assert!(!SaveMaps::FirstLast.includes(5, 10));
        assert!(SaveMaps::All.includes(5, 10));
        assert!(!SaveMaps::None.includes(0, 10));
    }
}
