//! Parallel calibration over disjoint sub-windows.
//!
//! A window is split into one interval per worker. Each worker reconciles its
//! own interval, owns its own topology copy, objective and minimizer, and
//! reports its optimum; the optima are written once to a JSON manifest keyed
//! by worker id.

pub mod job;
pub mod manifest;
pub mod runner;

pub use job::{jobs_from_range, WorkerJob, WorkerRecord};
pub use manifest::{load_calibration_manifest, write_calibration_manifest, CalibrationManifest};
pub use runner::{run_batch_calibration, BatchCalibrationConfig, BatchSummary};
