//! Scenario state machine

use landshift_core::{Error, Raster, Result};

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Base state loaded, step 0 not yet reported
    Init,
    Stepping,
    Done,
}

/// The working land-cover and step bookkeeping owned by the engine
#[derive(Debug, Clone)]
pub struct ScenarioState {
    working_lulc: Raster<i32>,
    step: i32,
    total_steps: i32,
    pixels_per_step: usize,
    converting_code: i32,
    phase: Phase,
}

impl ScenarioState {
    pub fn new(base_lulc: Raster<i32>, total_steps: i32, pixels_per_step: usize, converting_code: i32) -> Self {
        Self {
            working_lulc: base_lulc,
            step: 0,
            total_steps,
            pixels_per_step,
            converting_code,
            phase: Phase::Init,
        }
    }

    pub fn lulc(&self) -> &Raster<i32> {
        &self.working_lulc
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    pub fn total_steps(&self) -> i32 {
        self.total_steps
    }

    pub fn pixels_per_step(&self) -> usize {
        self.pixels_per_step
    }

    pub fn converting_code(&self) -> i32 {
        self.converting_code
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Fraction of the run completed at the current step
    pub fn fraction(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.step as f64 / self.total_steps as f64
        }
    }

    /// Move to the next step. Returns `false` once the run is done.
    pub fn advance(&mut self) -> bool {
        match self.phase {
            Phase::Init => {
                self.phase = if self.total_steps == 0 { Phase::Done } else { Phase::Stepping };
                self.step = 1.min(self.total_steps);
                self.phase == Phase::Stepping
            }
            Phase::Stepping if self.step < self.total_steps => {
                self.step += 1;
                true
            }
            Phase::Stepping | Phase::Done => {
                self.phase = Phase::Done;
                false
            }
        }
    }

    /// Assign the converting code to the given row-major indices
    pub fn convert(&mut self, indices: &[usize]) -> Result<()> {
        let code = self.converting_code;
        for &index in indices {
            self.working_lulc.set_flat(index, code)?;
        }
        Ok(())
    }

    /// Replace the working land-cover wholesale, keeping the grid
    pub fn replace(&mut self, lulc: Raster<i32>) -> Result<()> {
        self.working_lulc.ensure_aligned(&lulc, "scenario land-cover")?;
        self.working_lulc = lulc;
        Ok(())
    }

    pub(crate) fn fail_if_done(&self) -> Result<()> {
        if self.phase == Phase::Done {
            return Err(Error::Other("scenario already finished".into()));
        }
        Ok(())
    }
}
