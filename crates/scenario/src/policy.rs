//! Conversion policies
//!
//! A policy decides, at every step, which pixels of the working land-cover
//! switch to the converting code (or, for predefined scenarios, which
//! land-cover replaces it). Distance-ordered selections break ties by
//! ascending row-major index so runs are reproducible.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use landshift_algorithms::landscape::edge_distance;
use landshift_core::io::read_geotiff;
use landshift_core::{Raster, Result};
use tracing::debug;

use crate::config::{ScenarioConfig, ScenarioKind};
use crate::state::ScenarioState;

/// What a policy wants done to the working land-cover
#[derive(Debug, Clone)]
pub enum Selection {
    /// Row-major indices to set to the converting code, in order
    Convert(Vec<usize>),
    /// A complete land-cover for this step
    Replace(Raster<i32>),
}

/// A rule that picks the pixels converted at each step
pub trait ConversionPolicy {
    /// Name used in logs and errors
    fn name(&self) -> &'static str;

    /// Called once on the base state, before step 0 is evaluated.
    ///
    /// Returning a raster replaces the base land-cover.
    fn initial(&mut self, _state: &ScenarioState) -> Result<Option<Raster<i32>>> {
        Ok(None)
    }

    /// Selection for the current step (1..=total_steps)
    fn select(&mut self, state: &ScenarioState) -> Result<Selection>;
}

/// Build the policy described by a configuration
pub fn policy_from_config(config: &ScenarioConfig) -> Box<dyn ConversionPolicy> {
    let forest = config.forest_codes.clone();
    match &config.scenario {
        ScenarioKind::Predefined { path, pattern } => Box::new(Predefined::new(path, pattern)),
        ScenarioKind::EdgeExpansion => Box::new(FrozenOrder::edge_expansion(forest)),
        ScenarioKind::CoreExpansion => Box::new(FrozenOrder::core_expansion(forest)),
        ScenarioKind::CoreFragmentation => Box::new(CoreFragmentation::new(forest)),
        ScenarioKind::SingleClass {
            source_code,
            then_edge_expansion,
        } => {
            let fallback = then_edge_expansion.then(|| FrozenOrder::edge_expansion(forest));
            Box::new(SingleClass::new(*source_code, fallback))
        }
        ScenarioKind::Composite { start, end } => Box::new(Composite::new(start.clone(), end.clone())),
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

fn by_distance(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    a.1.total_cmp(&b.1).then(a.0.cmp(&b.0))
}

fn by_distance_desc(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then(a.0.cmp(&b.0))
}

/// Pixels with positive distance, ordered by `cmp`
fn ranked(distance: &Raster<f32>, cmp: fn(&(usize, f32), &(usize, f32)) -> Ordering) -> Vec<(usize, f32)> {
    let mut pixels: Vec<(usize, f32)> = distance
        .values()
        .enumerate()
        .filter(|&(_, d)| d > 0.0)
        .collect();
    pixels.sort_by(cmp);
    pixels
}

// ---------------------------------------------------------------------------
// Predefined
// ---------------------------------------------------------------------------

/// Land-cover read from a file per step
#[derive(Debug, Clone)]
pub struct Predefined {
    dir: PathBuf,
    pattern: String,
}

impl Predefined {
    pub fn new(dir: &Path, pattern: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        }
    }

    /// Path of the land-cover for `step`; `%n` becomes the step number
    pub fn path_for(&self, step: i32) -> PathBuf {
        self.dir.join(self.pattern.replace("%n", &step.to_string()))
    }

    fn load(&self, step: i32) -> Result<Raster<i32>> {
        let path = self.path_for(step);
        debug!("Loading predefined land-cover {}", path.display());
        read_geotiff(&path)
    }
}

impl ConversionPolicy for Predefined {
    fn name(&self) -> &'static str {
        "predefined"
    }

    fn initial(&mut self, _state: &ScenarioState) -> Result<Option<Raster<i32>>> {
        self.load(0).map(Some)
    }

    fn select(&mut self, state: &ScenarioState) -> Result<Selection> {
        self.load(state.step()).map(Selection::Replace)
    }
}

// ---------------------------------------------------------------------------
// Frozen edge-distance order
// ---------------------------------------------------------------------------

/// Forest pixels converted in an order fixed on the base state: nearest the
/// edge first (edge expansion) or deepest first (core expansion)
#[derive(Debug, Clone)]
pub struct FrozenOrder {
    name: &'static str,
    forest_codes: BTreeSet<i32>,
    deepest_first: bool,
    order: Vec<usize>,
    cursor: usize,
}

impl FrozenOrder {
    pub fn edge_expansion(forest_codes: BTreeSet<i32>) -> Self {
        Self::new("edge_expansion", forest_codes, false)
    }

    pub fn core_expansion(forest_codes: BTreeSet<i32>) -> Self {
        Self::new("core_expansion", forest_codes, true)
    }

    fn new(name: &'static str, forest_codes: BTreeSet<i32>, deepest_first: bool) -> Self {
        Self {
            name,
            forest_codes,
            deepest_first,
            order: Vec::new(),
            cursor: 0,
        }
    }

    /// Freeze the ordering on `lulc`
    pub fn freeze(&mut self, lulc: &Raster<i32>) -> Result<()> {
        let distance = edge_distance(lulc, &self.forest_codes)?;
        let cmp = if self.deepest_first { by_distance_desc } else { by_distance };
        self.order = ranked(&distance, cmp).into_iter().map(|(i, _)| i).collect();
        self.cursor = 0;
        debug!("{}: {} forest pixels ranked", self.name, self.order.len());
        Ok(())
    }

    /// Up to `count` indices that are still forest, advancing the cursor
    pub fn take(&mut self, lulc: &Raster<i32>, count: usize) -> Vec<usize> {
        let mut picked = Vec::with_capacity(count);
        while picked.len() < count && self.cursor < self.order.len() {
            let index = self.order[self.cursor];
            self.cursor += 1;
            let still_forest = lulc
                .get_flat(index)
                .map(|code| self.forest_codes.contains(&code))
                .unwrap_or(false);
            if still_forest {
                picked.push(index);
            }
        }
        picked
    }
}

impl ConversionPolicy for FrozenOrder {
    fn name(&self) -> &'static str {
        self.name
    }

    fn initial(&mut self, state: &ScenarioState) -> Result<Option<Raster<i32>>> {
        self.freeze(state.lulc())?;
        Ok(None)
    }

    fn select(&mut self, state: &ScenarioState) -> Result<Selection> {
        Ok(Selection::Convert(self.take(state.lulc(), state.pixels_per_step())))
    }
}

// ---------------------------------------------------------------------------
// Core fragmentation
// ---------------------------------------------------------------------------

/// Deepest forest pixels by an edge distance recomputed every step.
///
/// At step `k` the `pixels_per_step * k` deepest pixels of the current
/// land-cover convert.
#[derive(Debug, Clone)]
pub struct CoreFragmentation {
    forest_codes: BTreeSet<i32>,
}

impl CoreFragmentation {
    pub fn new(forest_codes: BTreeSet<i32>) -> Self {
        Self { forest_codes }
    }
}

impl ConversionPolicy for CoreFragmentation {
    fn name(&self) -> &'static str {
        "core_fragmentation"
    }

    fn select(&mut self, state: &ScenarioState) -> Result<Selection> {
        let distance = edge_distance(state.lulc(), &self.forest_codes)?;
        let count = state.pixels_per_step() * state.step().max(0) as usize;
        let picked = ranked(&distance, by_distance_desc)
            .into_iter()
            .take(count)
            .map(|(i, _)| i)
            .collect();
        Ok(Selection::Convert(picked))
    }
}

// ---------------------------------------------------------------------------
// Single class
// ---------------------------------------------------------------------------

/// Pixels of one source class in row-major order, optionally followed by
/// edge expansion once the class is used up
#[derive(Debug, Clone)]
pub struct SingleClass {
    source_code: i32,
    fallback: Option<FrozenOrder>,
}

impl SingleClass {
    pub fn new(source_code: i32, fallback: Option<FrozenOrder>) -> Self {
        Self { source_code, fallback }
    }
}

impl ConversionPolicy for SingleClass {
    fn name(&self) -> &'static str {
        "single_class"
    }

    fn initial(&mut self, state: &ScenarioState) -> Result<Option<Raster<i32>>> {
        if let Some(fallback) = self.fallback.as_mut() {
            fallback.freeze(state.lulc())?;
        }
        Ok(None)
    }

    fn select(&mut self, state: &ScenarioState) -> Result<Selection> {
        let count = state.pixels_per_step();
        let mut picked: Vec<usize> = state
            .lulc()
            .values()
            .enumerate()
            .filter(|&(_, code)| code == self.source_code)
            .map(|(i, _)| i)
            .take(count)
            .collect();

        if picked.len() < count {
            if let Some(fallback) = self.fallback.as_mut() {
                let extra = fallback.take(state.lulc(), count - picked.len());
                if !extra.is_empty() {
                    debug!(
                        "Class {} used up, {} forest pixels from the edge",
                        self.source_code,
                        extra.len()
                    );
                }
                picked.extend(extra);
            }
        }
        Ok(Selection::Convert(picked))
    }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Several source classes, each contributing a share of every step that
/// moves linearly from `start` to `end` percent over the run
#[derive(Debug, Clone)]
pub struct Composite {
    start: BTreeMap<i32, f64>,
    end: BTreeMap<i32, f64>,
}

impl Composite {
    pub fn new(start: BTreeMap<i32, f64>, end: BTreeMap<i32, f64>) -> Self {
        Self { start, end }
    }

    /// Pixels per class at run fraction `f`, summing to at most `pixels`
    pub fn quotas(&self, f: f64, pixels: usize) -> BTreeMap<i32, usize> {
        let mut quotas: BTreeMap<i32, usize> = self
            .start
            .iter()
            .map(|(&code, &start)| {
                let end = self.end.get(&code).copied().unwrap_or(start);
                let share = ((1.0 - f) * start + f * end) / 100.0;
                (code, (pixels as f64 * share).round().max(0.0) as usize)
            })
            .collect();

        while quotas.values().sum::<usize>() > pixels {
            let mut largest: Option<(i32, usize)> = None;
            for (&code, &q) in &quotas {
                if largest.map_or(true, |(_, best)| q > best) {
                    largest = Some((code, q));
                }
            }
            match largest {
                Some((code, q)) if q > 0 => {
                    quotas.insert(code, q - 1);
                }
                _ => break,
            }
        }
        quotas
    }
}

impl ConversionPolicy for Composite {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn select(&mut self, state: &ScenarioState) -> Result<Selection> {
        let pixels = state.pixels_per_step();
        let quotas = self.quotas(state.fraction(), pixels);

        let mut picked = Vec::with_capacity(pixels);
        let mut leftovers: Vec<(usize, f32)> = Vec::new();
        for (&code, &quota) in &quotas {
            let class: BTreeSet<i32> = [code].into_iter().collect();
            let distance = edge_distance(state.lulc(), &class)?;
            let mut candidates = ranked(&distance, by_distance).into_iter();
            picked.extend(candidates.by_ref().take(quota).map(|(i, _)| i));
            leftovers.extend(candidates);
        }

        let shortfall = pixels.saturating_sub(picked.len());
        if shortfall > 0 && !leftovers.is_empty() {
            debug!("Composite step {}: filling {} pixels from other classes", state.step(), shortfall);
            leftovers.sort_by(by_distance);
            picked.extend(leftovers.into_iter().take(shortfall).map(|(i, _)| i));
        }
        Ok(Selection::Convert(picked))
    }
}
