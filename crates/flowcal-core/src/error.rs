//! Unified error types for the flowcal crates
//!
//! [`FlowcalError`] is the error returned at library boundaries. Recoverable
//! conditions (data gaps, capacity overflow, unmapped corridors) are not errors;
//! they are collected in [`crate::diagnostics::Diagnostics`] and logged.
//!
//! # Example
//!
//! ```ignore
//! use flowcal_core::{FlowcalError, FlowcalResult};
//!
//! fn score(path: &str) -> FlowcalResult<f64> {
//!     let topology = load_topology(path)?;
//!     let report = run_window(&topology)?;
//!     Ok(report.total_mae())
//! }
//! ```

use thiserror::Error;

/// Error type for all flowcal operations.
#[derive(Error, Debug)]
pub enum FlowcalError {
    /// I/O errors (file access, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Topology structure errors (unknown buses, empty network)
    #[error("Topology error: {0}")]
    Topology(String),

    /// An upstream source returned nothing for the requested window
    #[error("no data available for {range}: {message}")]
    NoData { range: String, message: String },

    /// The flow solver failed for one hour; aborts the run
    #[error("solver failed at {hour} (run {range}): {message}")]
    Solver {
        hour: String,
        range: String,
        message: String,
    },

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using FlowcalError.
pub type FlowcalResult<T> = Result<T, FlowcalError>;

impl From<anyhow::Error> for FlowcalError {
    fn from(err: anyhow::Error) -> Self {
        FlowcalError::Other(err.to_string())
    }
}

impl From<String> for FlowcalError {
    fn from(s: String) -> Self {
        FlowcalError::Other(s)
    }
}

impl From<&str> for FlowcalError {
    fn from(s: &str) -> Self {
        FlowcalError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for FlowcalError {
    fn from(err: serde_json::Error) -> Self {
        FlowcalError::Parse(err.to_string())
    }
}
