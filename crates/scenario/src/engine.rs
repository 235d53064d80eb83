//! Scenario engine
//!
//! Each step runs in a fixed order: the policy mutates the working
//! land-cover, every evaluator derives its rasters from that snapshot, and
//! one CSV row is written and flushed. Step 0 reports the base state.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use landshift_algorithms::statistics::{changed_by_class, class_counts};
use landshift_core::io::write_geotiff;
use landshift_core::{Error, Raster, Result};
use tracing::{debug, info};

use crate::config::{SaveMaps, ScenarioConfig};
use crate::evaluator::Evaluator;
use crate::inputs::RunInputs;
use crate::policy::{policy_from_config, ConversionPolicy, Selection};
use crate::report::{create_output, Cell, CsvReporter};
use crate::state::ScenarioState;

/// Reporting options that do not change the indicators
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Add `converted_<code>` columns for the classes of the base state
    pub report_per_class: bool,
    pub save_maps: SaveMaps,
    pub map_output_dir: Option<PathBuf>,
}

/// What the engine passes to the step callback
#[derive(Debug, Clone)]
pub struct StepReport {
    pub step: i32,
    pub total_steps: i32,
    /// Pixels changed by this step's policy
    pub converted: usize,
    /// The CSV row without the step column
    pub cells: Vec<Cell>,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: i32,
    pub converted: usize,
    pub columns: Vec<String>,
}

/// Drives a policy and a set of evaluators over the steps of a run
pub struct ScenarioEngine<W: Write> {
    state: ScenarioState,
    policy: Box<dyn ConversionPolicy>,
    evaluators: Vec<Box<dyn Evaluator>>,
    reporter: CsvReporter<W>,
    classes: Vec<i32>,
    options: EngineOptions,
    converted: usize,
}

impl ScenarioEngine<File> {
    /// Validate the configuration, load every input and open the output CSV
    pub fn from_config(config: &ScenarioConfig) -> Result<Self> {
        config.validate()?;

        let mut inputs = RunInputs::load(config)?;
        let evaluators = inputs.take_evaluators(config)?;
        let policy = policy_from_config(config);
        let output = create_output(&config.output_csv_path)?;

        let state = ScenarioState::new(
            inputs.base_lulc,
            config.total_steps,
            config.pixels_per_step.max(0) as usize,
            config.converting_code,
        );
        let options = EngineOptions {
            report_per_class: config.report_per_class,
            save_maps: config.save_maps,
            map_output_dir: config.map_output_dir.clone(),
        };
        Self::new(state, policy, evaluators, output, options)
    }
}

impl<W: Write> ScenarioEngine<W> {
    pub fn new(
        state: ScenarioState,
        policy: Box<dyn ConversionPolicy>,
        evaluators: Vec<Box<dyn Evaluator>>,
        output: W,
        options: EngineOptions,
    ) -> Result<Self> {
        if evaluators.is_empty() {
            return Err(Error::Config("a scenario needs at least one evaluator".into()));
        }
        if options.save_maps != SaveMaps::None {
            let dir = options
                .map_output_dir
                .as_ref()
                .ok_or_else(|| Error::Config("save_maps requires map_output_dir".into()))?;
            fs::create_dir_all(dir).map_err(|e| Error::from_io(e, dir))?;
        }

        let classes: Vec<i32> = if options.report_per_class {
            class_counts(state.lulc()).into_keys().collect()
        } else {
            Vec::new()
        };

        let mut columns: Vec<String> = evaluators.iter().flat_map(|e| e.columns()).collect();
        columns.extend(classes.iter().map(|c| format!("converted_{}", c)));
        let reporter = CsvReporter::new(output, &columns)?;

        Ok(Self {
            state,
            policy,
            evaluators,
            reporter,
            classes,
            options,
            converted: 0,
        })
    }

    pub fn state(&self) -> &ScenarioState {
        &self.state
    }

    /// CSV columns after `step`
    pub fn columns(&self) -> &[String] {
        &self.reporter.header()[1..]
    }

    pub fn run(&mut self) -> Result<RunSummary> {
        self.run_with(|_| {})
    }

    /// Run every step, calling `on_step` after each row is written.
    ///
    /// An error stops the run with the step it happened at; rows already
    /// written are kept.
    pub fn run_with<F: FnMut(&StepReport)>(&mut self, mut on_step: F) -> Result<RunSummary> {
        self.state.fail_if_done()?;
        info!(
            "Running '{}' for {} steps, {} pixels per step",
            self.policy.name(),
            self.state.total_steps(),
            self.state.pixels_per_step()
        );

        self.start().map_err(|e| e.at_step(0))?;
        let report = self.report(0, BaseDiff::None).map_err(|e| e.at_step(0))?;
        on_step(&report);

        while self.state.advance() {
            let step = self.state.step();
            let report = self.step().map_err(|e| e.at_step(step))?;
            on_step(&report);
        }

        Ok(RunSummary {
            steps: self.state.step(),
            converted: self.converted,
            columns: self.columns().to_vec(),
        })
    }

    /// Hand back the CSV writer
    pub fn finish(self) -> Result<W> {
        self.reporter.finish()
    }

    fn start(&mut self) -> Result<()> {
        if let Some(lulc) = self.policy.initial(&self.state)? {
            self.state.replace(lulc)?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<StepReport> {
        let step = self.state.step();
        let before = (!self.classes.is_empty()).then(|| self.state.lulc().clone());

        let changed = match self.policy.select(&self.state)? {
            Selection::Convert(indices) => {
                if indices.is_empty() {
                    return Err(Error::Exhausted {
                        step,
                        policy: self.policy.name(),
                    });
                }
                self.state.convert(&indices)?;
                indices.len()
            }
            Selection::Replace(lulc) => {
                self.state.lulc().ensure_aligned(&lulc, "scenario land-cover")?;
                let changed = self
                    .state
                    .lulc()
                    .values()
                    .zip(lulc.values())
                    .filter(|(a, b)| a != b)
                    .count();
                self.state.replace(lulc)?;
                changed
            }
        };
        if changed < self.state.pixels_per_step() && self.state.pixels_per_step() > 0 {
            debug!("Step {}: only {} pixels left to convert", step, changed);
        }
        self.converted += changed;

        let diff = match before {
            Some(before) => BaseDiff::Before(before, changed),
            None => BaseDiff::Count(changed),
        };
        self.report(step, diff)
    }

    fn report(&mut self, step: i32, diff: BaseDiff) -> Result<StepReport> {
        let total_steps = self.state.total_steps();
        let keep_maps = self.options.save_maps.includes(step, total_steps);
        let lulc = self.state.lulc();

        let mut cells = Vec::new();
        let mut maps = Vec::new();
        for evaluator in &self.evaluators {
            let output = evaluator.evaluate(lulc, keep_maps)?;
            debug!("Step {}: {} -> {:?}", step, evaluator.name(), output.values);
            cells.extend(output.values.into_iter().map(Cell::Float));
            maps.extend(output.maps);
        }

        let converted = match &diff {
            BaseDiff::None => 0,
            BaseDiff::Count(n) | BaseDiff::Before(_, n) => *n,
        };
        if !self.classes.is_empty() {
            let by_class = match &diff {
                BaseDiff::Before(before, _) => changed_by_class(before, lulc)?,
                _ => Default::default(),
            };
            cells.extend(
                self.classes
                    .iter()
                    .map(|c| Cell::Int(by_class.get(c).copied().unwrap_or(0) as i64)),
            );
        }

        if keep_maps {
            if let Some(dir) = &self.options.map_output_dir {
                write_geotiff(lulc, dir.join(format!("step_{:04}_lulc.tif", step)))?;
                for (layer, map) in &maps {
                    map.write(dir.join(format!("step_{:04}_{}.tif", step, layer)))?;
                }
                debug!("Step {}: wrote {} maps to {}", step, maps.len() + 1, dir.display());
            }
        }

        self.reporter.write_row(step, &cells)?;
        info!("Step {}/{}: {} pixels converted", step, total_steps, converted);

        Ok(StepReport {
            step,
            total_steps,
            converted,
            cells,
        })
    }
}

/// How a step's land-cover differs from the previous one
enum BaseDiff {
    None,
    Count(usize),
    Before(Raster<i32>, usize),
}

/// Load, run and close a configured scenario
pub fn run_scenario(config: &ScenarioConfig) -> Result<RunSummary> {
    let mut engine = ScenarioEngine::from_config(config)?;
    let summary = engine.run()?;
    engine.finish()?;
    Ok(summary)
}
