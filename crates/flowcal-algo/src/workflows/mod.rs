//! High-level workflows over an hour range.
//!
//! These facades wire reconciliation, allocation, case building, the flow
//! solve and scoring together so callers only pick a topology, a solver and
//! a window.

pub mod time_series;

pub use time_series::{RunOptions, RunOutcome, TimeSeriesRun};
