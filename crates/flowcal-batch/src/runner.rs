use crate::job::{jobs_from_range, WorkerJob, WorkerRecord};
use crate::manifest::{write_calibration_manifest, CalibrationManifest};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use flowcal_algo::{
    BoundedMinimizer, CalibrationObjective, FlowSolver, Minimum, NanPolicy, NelderMeadMinimizer,
    RunOptions,
};
use flowcal_core::{BranchParameters, CalibrationTarget, Topology};
use flowcal_ts::{HourRange, Reconciler};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Settings shared by every worker of a batch calibration.
pub struct BatchCalibrationConfig {
    pub range: HourRange,
    pub workers: usize,
    /// Worker threads; 0 uses every core.
    pub threads: usize,
    pub targets: Vec<CalibrationTarget>,
    /// Per-target bounds; the targets' defaults when `None`.
    pub bounds: Option<Vec<(f64, f64)>>,
    /// Start vector; the base parameter values when `None`.
    pub start: Option<Vec<f64>>,
    pub base: BranchParameters,
    pub run: RunOptions,
    pub nan_policy: NanPolicy,
    pub minimizer: NelderMeadMinimizer,
    pub manifest_path: PathBuf,
}

pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub workers: BTreeMap<usize, WorkerRecord>,
}

/// Calibrate every interval of `config.range` in parallel and write the manifest.
///
/// `topology` must be prepared for the study year; each worker clones it.
/// A failing worker is recorded with its error and does not stop the others.
pub fn run_batch_calibration(
    topology: &Topology,
    reconciler: &Reconciler<'_>,
    solver: &dyn FlowSolver,
    config: &BatchCalibrationConfig,
) -> Result<BatchSummary> {
    if config.targets.is_empty() {
        return Err(anyhow!("no calibration targets configured"));
    }
    let jobs = jobs_from_range(&config.range, config.workers);

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for calibration workers")?;

    tracing::info!(
        range = %config.range,
        workers = jobs.len(),
        threads = thread_count,
        "starting batch calibration"
    );
    let records: Vec<WorkerRecord> = pool.install(|| {
        jobs.par_iter()
            .map(|job| run_worker(job, topology, reconciler, solver, config))
            .collect()
    });

    let success = records.iter().filter(|r| r.status == "ok").count();
    let failure = records.len() - success;
    let workers: BTreeMap<usize, WorkerRecord> =
        records.into_iter().map(|r| (r.worker, r)).collect();

    let manifest = CalibrationManifest {
        created_at: Utc::now(),
        range: config.range.to_string(),
        targets: config.targets.clone(),
        success,
        failure,
        workers: workers.clone(),
    };
    write_calibration_manifest(&config.manifest_path, &manifest)?;
    tracing::info!(
        success,
        failure,
        manifest = %config.manifest_path.display(),
        "batch calibration finished"
    );
    Ok(BatchSummary {
        success,
        failure,
        manifest_path: config.manifest_path.clone(),
        workers,
    })
}

fn run_worker(
    job: &WorkerJob,
    topology: &Topology,
    reconciler: &Reconciler<'_>,
    solver: &dyn FlowSolver,
    config: &BatchCalibrationConfig,
) -> WorkerRecord {
    let runner = || -> Result<Minimum> {
        let topology = topology.clone();
        let snapshot = reconciler
            .reconcile(&job.interval)
            .with_context(|| format!("reconciling {}", job.label()))?;
        // hours run inline; the workers already fill the pool
        let run = RunOptions {
            threads: 1,
            ..config.run
        };
        let objective = CalibrationObjective::new(&topology, &snapshot, solver, config.targets.clone())
            .with_base(config.base.clone())
            .with_options(run)
            .with_nan_policy(config.nan_policy);
        let bounds = config
            .bounds
            .clone()
            .unwrap_or_else(|| objective.default_bounds());
        let start = config
            .start
            .clone()
            .unwrap_or_else(|| objective.initial_point());
        let minimum = config.minimizer.minimize(&objective, &start, &bounds)?;
        Ok(minimum)
    };

    match runner() {
        Ok(minimum) => {
            tracing::info!(worker = job.worker, fun = minimum.value, "worker done");
            WorkerRecord {
                worker: job.worker,
                interval: job.interval,
                x: minimum.x,
                fun: Some(minimum.value),
                iterations: minimum.iterations,
                status: "ok".into(),
                error: None,
            }
        }
        Err(err) => {
            tracing::warn!(worker = job.worker, error = %format!("{err:#}"), "worker failed");
            WorkerRecord {
                worker: job.worker,
                interval: job.interval,
                x: Vec::new(),
                fun: None,
                iterations: 0,
                status: "error".into(),
                error: Some(format!("{err:#}")),
            }
        }
    }
}
