use anyhow::{anyhow, Context, Result};
use flowcal_algo::{ErrorReport, FlowMatrix, NanPolicy};
use flowcal_core::Boundary;
use flowcal_ts::io::read_hourly;
use std::fs;
use std::path::Path;

use crate::commands::common::print_error_report;

/// Read a wide flow file and orient every column to its canonical corridor.
fn read_flows(path: &Path) -> Result<FlowMatrix> {
    let frame = read_hourly(path)?;
    let mut flows = FlowMatrix::new(*frame.range());
    for (name, values) in frame.columns() {
        let (boundary, sign) =
            Boundary::parse(name).with_context(|| format!("column '{name}' in {}", path.display()))?;
        if flows.contains(&boundary) {
            return Err(anyhow!(
                "{} lists corridor {boundary} twice",
                path.display()
            ));
        }
        flows.insert_column(boundary, values.iter().map(|v| v * sign).collect())?;
    }
    Ok(flows)
}

pub fn handle(
    measured: &Path,
    modelled: &Path,
    policy: NanPolicy,
    out: Option<&Path>,
) -> Result<()> {
    let modelled = read_flows(modelled)?;
    let measured = read_flows(measured)?.reindex(*modelled.range());
    let report = ErrorReport::from_flows(&measured, &modelled);
    if report.is_empty() {
        return Err(anyhow!("no corridors to compare"));
    }
    print_error_report(&report)?;
    if let Some(path) = out {
        let json = serde_json::to_string_pretty(&report).context("serializing error report")?;
        fs::write(path, json)
            .with_context(|| format!("writing error report '{}'", path.display()))?;
    }
    let total = report.total_mae(policy)?;
    println!("Total MAE: {total:.3} MW");
    Ok(())
}
