use anyhow::{Context, Result};
use flowcal_algo::ErrorReport;
use flowcal_cli::config::FlowcalConfig;
use flowcal_core::Topology;
use flowcal_io::{load_bus_loads, load_topology};
use flowcal_ts::HourRange;
use std::io::{self, Write};
use tabwriter::TabWriter;

/// Load the configured topology, apply bus load tables, prepare it for the
/// study year and set the configured branch parameters.
pub fn load_prepared_topology(config: &FlowcalConfig) -> Result<Topology> {
    let mut topology = load_topology(&config.topology_dir)?;
    if !config.load_tables.is_empty() {
        let tables = config
            .load_tables
            .iter()
            .map(|spec| load_bus_loads(&spec.path, &spec.country))
            .collect::<Result<Vec<_>>>()?;
        let diagnostics = topology.apply_bus_loads(&tables);
        if diagnostics.has_issues() {
            tracing::warn!(summary = %diagnostics.summary(), "bus load tables applied with issues");
        }
    }
    let report = topology
        .prepare(config.study_year)
        .context("preparing topology")?;
    tracing::info!(
        removed_by_year = report.removed_by_year,
        islanded = report.islanded.len(),
        dropped_generators = report.dropped_generators.len(),
        relocated_farms = report.relocated_farms.len(),
        "topology prepared"
    );
    config
        .parameters
        .apply(&mut topology)
        .context("applying branch parameters")?;
    Ok(topology)
}

pub fn parse_window(start: &str, end: Option<&str>) -> Result<HourRange> {
    HourRange::parse(start, end).with_context(|| format!("invalid window starting at '{start}'"))
}

pub fn print_error_report(report: &ErrorReport) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "CORRIDOR\tMAE\tMAPE\tRMSE\tHOURS")?;
    for (boundary, metrics) in &report.per_boundary {
        writeln!(
            writer,
            "{}\t{:.2}\t{:.2}\t{:.2}\t{}",
            boundary, metrics.mae, metrics.mape, metrics.rmse, metrics.hours
        )?;
    }
    writer.flush()?;
    Ok(())
}
