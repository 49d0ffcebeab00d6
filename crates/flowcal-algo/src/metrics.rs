//! Error metrics between measured and modelled flows.
//!
//! Per-hour errors propagate `NaN`; window aggregates skip hours where either
//! side is `NaN` and are `NaN` themselves when no hour is numeric. MAPE is
//! not masked: a zero measurement gives an infinite (or `NaN`) percentage.

use crate::comparison::FlowMatrix;
use flowcal_core::{Boundary, FlowcalError, FlowcalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How boundaries without a numeric MAE enter the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NanPolicy {
    /// Skip them and log which ones were skipped.
    #[default]
    Exclude,
    /// Fail the aggregation.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorMetrics {
    pub mae: f64,
    /// Percent.
    pub mape: f64,
    pub rmse: f64,
    /// Hours with both values present.
    pub hours: usize,
}

fn nan_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

impl ErrorMetrics {
    pub fn from_series(measured: &[f64], modelled: &[f64]) -> Self {
        let diffs: Vec<(f64, f64)> = measured
            .iter()
            .zip(modelled)
            .map(|(m, s)| (*m, m - s))
            .collect();
        Self {
            mae: nan_mean(diffs.iter().map(|(_, d)| d.abs())),
            mape: nan_mean(diffs.iter().map(|(m, d)| (d / m * 100.0).abs())),
            rmse: nan_mean(diffs.iter().map(|(_, d)| d * d)).sqrt(),
            hours: diffs.iter().filter(|(_, d)| !d.is_nan()).count(),
        }
    }
}

/// Absolute error per boundary and hour; `NaN` where either side is missing.
pub fn absolute_errors(measured: &FlowMatrix, modelled: &FlowMatrix) -> FlowMatrix {
    let mut out = FlowMatrix::new(*modelled.range());
    for (boundary, values) in modelled.columns() {
        for (row, value) in values.iter().enumerate() {
            let diff = (measured.get(boundary, row) - value).abs();
            out.set(boundary.clone(), row, diff);
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorReport {
    pub per_boundary: BTreeMap<Boundary, ErrorMetrics>,
}

impl ErrorReport {
    /// Metrics for every modelled boundary; a boundary the measurements lack
    /// scores `NaN`.
    pub fn from_flows(measured: &FlowMatrix, modelled: &FlowMatrix) -> Self {
        let per_boundary = modelled
            .columns()
            .map(|(boundary, sim)| {
                let meas = match measured.column(boundary) {
                    Some(values) => values.to_vec(),
                    None => vec![f64::NAN; sim.len()],
                };
                (boundary.clone(), ErrorMetrics::from_series(&meas, sim))
            })
            .collect();
        Self { per_boundary }
    }

    /// Metrics of a single row.
    pub fn for_hour(measured: &FlowMatrix, modelled: &FlowMatrix, row: usize) -> Self {
        let per_boundary = modelled
            .keys()
            .map(|boundary| {
                let metrics = ErrorMetrics::from_series(
                    &[measured.get(boundary, row)],
                    &[modelled.get(boundary, row)],
                );
                (boundary.clone(), metrics)
            })
            .collect();
        Self { per_boundary }
    }

    pub fn get(&self, boundary: &Boundary) -> Option<&ErrorMetrics> {
        self.per_boundary.get(boundary)
    }

    pub fn is_empty(&self) -> bool {
        self.per_boundary.is_empty()
    }

    /// Sum of the per-boundary MAE.
    pub fn total_mae(&self, policy: NanPolicy) -> FlowcalResult<f64> {
        let mut total = 0.0;
        let mut numeric = 0usize;
        for (boundary, metrics) in &self.per_boundary {
            if metrics.mae.is_nan() {
                match policy {
                    NanPolicy::Fail => {
                        return Err(FlowcalError::Validation(format!(
                            "no numeric hours for {boundary}"
                        )))
                    }
                    NanPolicy::Exclude => {
                        tracing::warn!(%boundary, "boundary excluded from total MAE");
                        continue;
                    }
                }
            }
            total += metrics.mae;
            numeric += 1;
        }
        if numeric == 0 {
            return Err(FlowcalError::Validation(
                "no boundary has a numeric MAE".into(),
            ));
        }
        Ok(total)
    }
}
