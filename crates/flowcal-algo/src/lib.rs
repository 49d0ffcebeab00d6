//! # flowcal-algo: allocation, flow solve and scoring
//!
//! Per hour the pipeline is pure and snapshot-based:
//!
//! 1. [`allocation`]: zone totals from the reconciled measurements are spread
//!    over generators, wind farms, bus loads and DC links ([`Injections`]).
//! 2. [`case`]: the topology and one hour's injections become a
//!    [`SolverCase`].
//! 3. [`solver`]: any [`FlowSolver`] turns the case into branch flows;
//!    [`DcFlowSolver`] is the bundled linear DC solve.
//! 4. [`comparison`] and [`metrics`]: modelled inter-zone flows are lined up
//!    against the measured exchange and scored (MAE, MAPE, RMSE).
//!
//! [`workflows::time_series`] drives the loop over an hour range and
//! [`objective`]/[`calibration`] wrap a whole run as a scalar objective for
//! bounded minimization of the branch parameters.

pub mod allocation;
pub mod calibration;
pub mod case;
pub mod comparison;
pub mod metrics;
pub mod objective;
pub mod solver;
pub mod workflows;

pub mod test_utils;

pub use allocation::{
    AllocationPolicy, Allocator, CorridorPlan, CorridorRoute, HourInputs, Injections,
    LinkSplitPolicy, OverflowPolicy,
};
pub use calibration::{BoundedMinimizer, Minimum, NelderMeadMinimizer};
pub use case::{build_case, BranchOrigin, BusKind, CaseBranch, CaseBus, CaseGen, SolverCase};
pub use comparison::{
    compare_hour, modelled_flows, zone_balance, ComparisonOptions, FlowComparison, FlowMatrix,
    ZoneBalance,
};
pub use metrics::{absolute_errors, ErrorMetrics, ErrorReport, NanPolicy};
pub use objective::{CalibrationObjective, Objective};
pub use solver::{DcFlowSolver, FlowSolver, SolvedCase};
pub use workflows::time_series::{RunOptions, RunOutcome, TimeSeriesRun};
