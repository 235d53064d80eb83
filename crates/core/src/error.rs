//! Error types for landshift

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for landshift operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Schema error in {}: {detail}", path.display())]
    Schema { path: PathBuf, detail: String },

    #[error("Duplicate key {key} in {}", path.display())]
    Duplicate { path: PathBuf, key: i64 },

    #[error("Raster mismatch in {what}: expected {expected}, got {actual}")]
    Mismatch {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("No valid data: {0}")]
    Nodata(String),

    #[error("Policy '{policy}' exhausted convertible pixels at step {step}")]
    Exhausted { step: i32, policy: &'static str },

    #[error("Step {step}: {source}")]
    AtStep {
        step: i32,
        #[source]
        source: Box<Error>,
    },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Coarse classification used to pick a process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or contradictory options
    Config,
    /// Unreadable, malformed or misaligned inputs
    Input,
    /// Evaluator or policy failure while stepping
    Evaluation,
}

impl Error {
    /// Classify this error, looking through step context
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::InvalidParameter { .. } => ErrorKind::Config,
            Error::Io(_)
            | Error::NotFound { .. }
            | Error::Schema { .. }
            | Error::Duplicate { .. }
            | Error::Mismatch { .. }
            | Error::InvalidDimensions { .. }
            | Error::UnsupportedDataType(_) => ErrorKind::Input,
            Error::AtStep { source, .. } => source.kind(),
            Error::Nodata(_)
            | Error::Exhausted { .. }
            | Error::IndexOutOfBounds { .. }
            | Error::Algorithm(_)
            | Error::Other(_) => ErrorKind::Evaluation,
        }
    }

    /// Attach the scenario step at which this error surfaced
    pub fn at_step(self, step: i32) -> Self {
        match self {
            Error::AtStep { .. } => self,
            other => Error::AtStep {
                step,
                source: Box::new(other),
            },
        }
    }

    /// Map an `io::Error` for `path`, turning "not found" into [`Error::NotFound`]
    pub fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound { path: path.into() }
        } else {
            Error::Io(err)
        }
    }
}

/// Result type alias for landshift operations
pub type Result<T> = std::result::Result<T, Error>;
