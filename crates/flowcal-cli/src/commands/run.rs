use anyhow::{Context, Result};
use flowcal_algo::{DcFlowSolver, ErrorReport, TimeSeriesRun};
use flowcal_cli::config::load_config;
use flowcal_core::Diagnostics;
use flowcal_io::load_sources;
use flowcal_ts::io::write_hourly;
use flowcal_ts::{format_hour, Reconciler};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::commands::common::{load_prepared_topology, parse_window, print_error_report};

#[derive(Serialize)]
struct RunReport<'a> {
    range: String,
    total_mae: Option<f64>,
    skipped_hours: Vec<String>,
    errors: &'a ErrorReport,
    diagnostics: &'a Diagnostics,
}

pub fn handle(
    config_path: &Path,
    start: &str,
    end: Option<&str>,
    out: Option<&Path>,
    threads: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let range = parse_window(start, end)?;
    let topology = load_prepared_topology(&config)?;
    let sources = load_sources(&config.sources.generation, &config.sources.market)?;
    let reconciler = Reconciler::new(&sources, &sources, config.reconcile.clone());

    let mut options = config.run;
    if let Some(threads) = threads {
        options.threads = threads;
    }
    let solver = DcFlowSolver::new();
    let outcome = TimeSeriesRun::new(&topology, &solver)
        .with_options(options)
        .run(&reconciler, &range)?;

    println!(
        "Flow run {range}: {} corridor(s), {} hour(s), {} skipped",
        outcome.modelled.width(),
        outcome.modelled.len(),
        outcome.skipped_hours.len()
    );
    print_error_report(&outcome.errors)?;
    let total = outcome.total_mae(config.nan_policy);

    if let Some(dir) = out {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        write_hourly(&outcome.measured, &dir.join("measured.csv"))?;
        write_hourly(&outcome.modelled, &dir.join("modelled.csv"))?;
        let report = RunReport {
            range: range.to_string(),
            total_mae: total.as_ref().ok().copied(),
            skipped_hours: outcome.skipped_hours.iter().map(format_hour).collect(),
            errors: &outcome.errors,
            diagnostics: &outcome.diagnostics,
        };
        let json = serde_json::to_string_pretty(&report).context("serializing run report")?;
        let report_path = dir.join("errors.json");
        fs::write(&report_path, json)
            .with_context(|| format!("writing run report '{}'", report_path.display()))?;
        println!("Flows and error report written to {}", dir.display());
    }

    let total = total?;
    println!("Total MAE: {total:.3} MW");
    if outcome.diagnostics.has_issues() {
        println!("Diagnostics: {}", outcome.diagnostics.summary());
    }
    Ok(())
}
