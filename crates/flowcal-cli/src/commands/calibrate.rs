use anyhow::{bail, Result};
use flowcal_algo::DcFlowSolver;
use flowcal_batch::{run_batch_calibration, BatchCalibrationConfig};
use flowcal_cli::config::load_config;
use flowcal_io::load_sources;
use flowcal_ts::Reconciler;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

use crate::commands::common::{load_prepared_topology, parse_window};

pub fn handle(
    config_path: &Path,
    start: &str,
    end: Option<&str>,
    workers: Option<usize>,
    manifest: &Path,
    threads: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let range = parse_window(start, end)?;
    let topology = load_prepared_topology(&config)?;
    let sources = load_sources(&config.sources.generation, &config.sources.market)?;
    let reconciler = Reconciler::new(&sources, &sources, config.reconcile.clone());

    let calibration = &config.calibration;
    let batch = BatchCalibrationConfig {
        range,
        workers: workers.unwrap_or(calibration.workers),
        threads: threads.unwrap_or(config.run.threads),
        targets: calibration.targets.clone(),
        bounds: calibration.bounds.clone(),
        start: calibration.start.clone(),
        base: config.parameters.clone(),
        run: config.run,
        nan_policy: config.nan_policy,
        minimizer: calibration.minimizer,
        manifest_path: manifest.to_path_buf(),
    };
    println!(
        "Calibrating {} target(s) over {range} with {} worker(s)",
        batch.targets.len(),
        batch.workers
    );
    let summary = run_batch_calibration(&topology, &reconciler, &DcFlowSolver::new(), &batch)?;

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "WORKER\tINTERVAL\tSTATUS\tMAE\tX")?;
    for record in summary.workers.values() {
        let fun = record
            .fun
            .map(|v| format!("{v:.3}"))
            .unwrap_or_else(|| "-".into());
        let x = record
            .x
            .iter()
            .map(|v| format!("{v:.5}"))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            record.worker, record.interval, record.status, fun, x
        )?;
    }
    writer.flush()?;
    println!(
        "Calibration finished: {} ok, {} failed; manifest at {}",
        summary.success,
        summary.failure,
        summary.manifest_path.display()
    );
    if summary.success == 0 {
        bail!("every calibration worker failed");
    }
    Ok(())
}
