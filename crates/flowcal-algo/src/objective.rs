//! Scalar objective over branch parameters.

use crate::metrics::NanPolicy;
use crate::solver::FlowSolver;
use crate::workflows::time_series::{RunOptions, TimeSeriesRun};
use flowcal_core::{BranchParameters, CalibrationTarget, FlowcalError, FlowcalResult, Topology};
use flowcal_ts::MeasurementSnapshot;

/// A function of a fixed-length parameter vector.
pub trait Objective: Send + Sync {
    fn dimension(&self) -> usize;
    fn evaluate(&self, x: &[f64]) -> FlowcalResult<f64>;
}

/// Total MAE of a run as a function of the calibrated branch coefficients.
///
/// Every evaluation writes the vector into a copy of `base`, derives R/X/B
/// on a copy of the prepared topology and runs the whole snapshot.
pub struct CalibrationObjective<'a, S: FlowSolver + ?Sized> {
    topology: &'a Topology,
    snapshot: &'a MeasurementSnapshot,
    solver: &'a S,
    targets: Vec<CalibrationTarget>,
    base: BranchParameters,
    options: RunOptions,
    nan_policy: NanPolicy,
}

impl<'a, S: FlowSolver + ?Sized> CalibrationObjective<'a, S> {
    pub fn new(
        topology: &'a Topology,
        snapshot: &'a MeasurementSnapshot,
        solver: &'a S,
        targets: Vec<CalibrationTarget>,
    ) -> Self {
        Self {
            topology,
            snapshot,
            solver,
            targets,
            base: BranchParameters::default(),
            options: RunOptions::default(),
            nan_policy: NanPolicy::default(),
        }
    }

    pub fn with_base(mut self, base: BranchParameters) -> Self {
        self.base = base;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_nan_policy(mut self, policy: NanPolicy) -> Self {
        self.nan_policy = policy;
        self
    }

    pub fn targets(&self) -> &[CalibrationTarget] {
        &self.targets
    }

    /// Current coefficient values, the natural starting point.
    pub fn initial_point(&self) -> Vec<f64> {
        self.base.values_of(&self.targets)
    }

    pub fn default_bounds(&self) -> Vec<(f64, f64)> {
        self.targets.iter().map(|t| t.default_bounds()).collect()
    }

    /// Branch parameters with `x` written in.
    pub fn parameters(&self, x: &[f64]) -> FlowcalResult<BranchParameters> {
        self.base.with_targets(&self.targets, x)
    }
}

impl<'a, S: FlowSolver + ?Sized> Objective for CalibrationObjective<'a, S> {
    fn dimension(&self) -> usize {
        self.targets.len()
    }

    fn evaluate(&self, x: &[f64]) -> FlowcalResult<f64> {
        if x.len() != self.dimension() {
            return Err(FlowcalError::Validation(format!(
                "objective takes {} values, got {}",
                self.dimension(),
                x.len()
            )));
        }
        let params = self.parameters(x)?;
        let mut topology = self.topology.clone();
        params.apply(&mut topology)?;
        let outcome = TimeSeriesRun::new(&topology, self.solver)
            .with_options(self.options)
            .run_snapshot(self.snapshot)?;
        let value = outcome.total_mae(self.nan_policy)?;
        tracing::debug!(x = ?x, total_mae = value, "objective evaluated");
        Ok(value)
    }
}
