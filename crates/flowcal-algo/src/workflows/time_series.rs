//! Time-series run: one flow solve per hour of a window.

use crate::allocation::{AllocationPolicy, Allocator, CorridorPlan, HourInputs};
use crate::case::build_case;
use crate::comparison::{link_exchange, modelled_flows, ComparisonOptions, FlowMatrix};
use crate::metrics::{ErrorReport, NanPolicy};
use crate::solver::FlowSolver;
use chrono::{NaiveDateTime, Timelike};
use flowcal_core::diagnostics::category;
use flowcal_core::{Boundary, Diagnostics, FlowcalError, FlowcalResult, Topology};
use flowcal_ts::{format_hour, HourRange, MeasurementSnapshot, Reconciler};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub allocation: AllocationPolicy,
    pub comparison: ComparisonOptions,
    /// Worker threads for the hourly solves; 0 uses every core.
    pub threads: usize,
}

/// Result of a run over one window.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub range: HourRange,
    /// Measured exchange for the compared corridors.
    pub measured: FlowMatrix,
    /// Modelled flow for the same corridors; `NaN` rows for skipped hours.
    pub modelled: FlowMatrix,
    pub errors: ErrorReport,
    pub diagnostics: Diagnostics,
    /// Hours left out because a generation or load value was missing.
    pub skipped_hours: Vec<NaiveDateTime>,
}

impl RunOutcome {
    pub fn total_mae(&self, policy: NanPolicy) -> FlowcalResult<f64> {
        self.errors.total_mae(policy)
    }

    pub fn corridors(&self) -> Vec<Boundary> {
        self.modelled.keys().cloned().collect()
    }
}

enum HourResult {
    Solved {
        flows: BTreeMap<Boundary, f64>,
        diagnostics: Diagnostics,
    },
    Skipped {
        missing: Vec<String>,
    },
}

/// Builder-style facade for a time-series run.
pub struct TimeSeriesRun<'a, S: FlowSolver + ?Sized> {
    topology: &'a Topology,
    solver: &'a S,
    options: RunOptions,
}

impl<'a, S: FlowSolver + ?Sized> TimeSeriesRun<'a, S> {
    /// `topology` must already be prepared for the study year.
    pub fn new(topology: &'a Topology, solver: &'a S) -> Self {
        Self {
            topology,
            solver,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.options.threads = threads;
        self
    }

    /// Reconcile the window, then run it.
    pub fn run(&self, reconciler: &Reconciler<'_>, range: &HourRange) -> FlowcalResult<RunOutcome> {
        let snapshot = reconciler.reconcile(range)?;
        self.run_snapshot(&snapshot)
    }

    /// Run over an already reconciled snapshot.
    ///
    /// Hours are solved in parallel and written back in hour order. The first
    /// solver failure in hour order aborts the run.
    pub fn run_snapshot(&self, snapshot: &MeasurementSnapshot) -> FlowcalResult<RunOutcome> {
        let range = snapshot.range;
        tracing::info!(
            range = %range,
            hours = range.len(),
            "starting time-series run"
        );

        let corridors: Vec<Boundary> = snapshot.corridors().cloned().collect();
        let plan = CorridorPlan::build(self.topology, &corridors);
        let compared: Vec<Boundary> = if self.options.comparison.include_links {
            corridors
                .iter()
                .filter(|b| plan.route(b).is_some_and(|r| !r.is_unmapped()))
                .cloned()
                .collect()
        } else {
            plan.ac_corridors()
        };

        let mut measured = FlowMatrix::new(range);
        let mut modelled = FlowMatrix::new(range);
        for boundary in &compared {
            let values = match snapshot.exchange.column(boundary) {
                Some(values) => values.to_vec(),
                None => vec![f64::NAN; range.len()],
            };
            measured.insert_column(boundary.clone(), values)?;
            modelled.insert_column(boundary.clone(), vec![f64::NAN; range.len()])?;
        }

        let threads = if self.options.threads == 0 {
            num_cpus::get()
        } else {
            self.options.threads
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| FlowcalError::Other(format!("building thread pool: {e}")))?;

        let allocator = Allocator::new(self.topology, &plan, self.options.allocation);
        let results: Vec<FlowcalResult<HourResult>> = pool.install(|| {
            (0..range.len())
                .into_par_iter()
                .map(|row| self.solve_hour(snapshot, &allocator, &compared, row))
                .collect()
        });

        let mut diagnostics = snapshot.diagnostics.clone();
        diagnostics.merge(plan.diagnostics.clone());
        let mut skipped_hours = Vec::new();
        for (row, (hour, result)) in range.hours().zip(results).enumerate() {
            match result? {
                HourResult::Solved {
                    flows,
                    diagnostics: hour_diagnostics,
                } => {
                    for (boundary, flow) in flows {
                        modelled.set(boundary, row, flow);
                    }
                    diagnostics.merge(hour_diagnostics);
                }
                HourResult::Skipped { missing } => {
                    diagnostics.warn(
                        category::DATA_GAP,
                        format!("hour skipped, missing {}", missing.join(", ")),
                        Some(format_hour(&hour).as_str()),
                    );
                    skipped_hours.push(hour);
                }
            }
            if hour.hour() == 23 || row + 1 == range.len() {
                tracing::info!(day = %hour.date(), "day done");
            }
        }

        let errors = ErrorReport::from_flows(&measured, &modelled);
        tracing::info!(
            range = %range,
            corridors = compared.len(),
            skipped = skipped_hours.len(),
            warnings = diagnostics.warning_count(),
            "time-series run finished"
        );
        Ok(RunOutcome {
            range,
            measured,
            modelled,
            errors,
            diagnostics,
            skipped_hours,
        })
    }

    fn solve_hour(
        &self,
        snapshot: &MeasurementSnapshot,
        allocator: &Allocator<'_>,
        compared: &[Boundary],
        row: usize,
    ) -> FlowcalResult<HourResult> {
        let inputs = HourInputs::from_snapshot(snapshot, row)?;
        let missing = inputs.missing(self.topology);
        if !missing.is_empty() {
            return Ok(HourResult::Skipped { missing });
        }
        let injections = allocator.allocate(&inputs);
        let case = build_case(self.topology, &injections)?;
        let solved = self.solver.solve(&case).map_err(|err| FlowcalError::Solver {
            hour: format_hour(&inputs.hour),
            range: snapshot.range.to_string(),
            message: format!("{err:#}"),
        })?;

        let mut flows = modelled_flows(&case, &solved, compared);
        if self.options.comparison.include_links {
            for (boundary, flow) in link_exchange(self.topology, &injections) {
                if let Some(total) = flows.get_mut(&boundary) {
                    *total += flow;
                }
            }
        }
        tracing::debug!(
            hour = %inputs.hour,
            slack_mw = solved.slack_mw,
            "hour solved"
        );
        Ok(HourResult::Solved {
            flows,
            diagnostics: injections.diagnostics,
        })
    }
}
