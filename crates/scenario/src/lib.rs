//! # landshift scenario
//!
//! Multi-step land-cover conversion scenarios. A run starts from a base
//! land-cover, applies a conversion policy step by step, and reports carbon
//! and biodiversity (MSA) indicators for every step as one CSV row.
//!
//! ```ignore
//! use landshift_scenario::{run_scenario, ScenarioConfig};
//!
//! let config = ScenarioConfig::from_file("runs/edge_expansion.json")?;
//! let summary = run_scenario(&config)?;
//! println!("{} steps, {} pixels converted", summary.steps, summary.converted);
//! ```

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod inputs;
pub mod policy;
pub mod report;
pub mod state;

pub use config::{EvaluatorKind, SaveMaps, ScenarioConfig, ScenarioKind};
pub use engine::{run_scenario, EngineOptions, RunSummary, ScenarioEngine, StepReport};
pub use evaluator::{CarbonEvaluator, Evaluator, GlobioLayers, MapLayer, MsaEvaluator, StepOutput};
pub use inputs::RunInputs;
pub use policy::{
    policy_from_config, Composite, ConversionPolicy, CoreFragmentation, FrozenOrder, Predefined, Selection,
    SingleClass,
};
pub use report::{Cell, CsvReporter};
pub use state::{Phase, ScenarioState};
