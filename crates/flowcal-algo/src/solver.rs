//! Flow solver seam and the bundled DC solve.

use crate::case::SolverCase;
use anyhow::{anyhow, Result};
use flowcal_core::{FaerSolver, LinearSystemBackend};

/// Solution of one case.
#[derive(Debug, Clone)]
pub struct SolvedCase {
    /// Voltage angle per case bus, radians.
    pub angles: Vec<f64>,
    /// MW per case branch, positive from bus0 to bus1.
    pub branch_flow_mw: Vec<f64>,
    /// Injection picked up by the slack bus, MW.
    pub slack_mw: f64,
}

/// Anything that turns a [`SolverCase`] into branch flows.
pub trait FlowSolver: Send + Sync {
    fn solve(&self, case: &SolverCase) -> Result<SolvedCase>;
}

/// Linear DC power flow: `B' θ = P` with the slack row and column removed.
///
/// Branch susceptance is `1/x` (with `|x|` floored at 1e-6), resistance and
/// shunts are ignored, and the slack angle is zero.
#[derive(Debug, Clone, Default)]
pub struct DcFlowSolver<B: LinearSystemBackend = FaerSolver> {
    backend: B,
}

impl DcFlowSolver<FaerSolver> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: LinearSystemBackend> DcFlowSolver<B> {
    pub fn with_backend(backend: B) -> Self {
        Self { backend }
    }
}

fn reactance(x: f64) -> f64 {
    x.abs().max(1e-6)
}

impl<B: LinearSystemBackend> FlowSolver for DcFlowSolver<B> {
    fn solve(&self, case: &SolverCase) -> Result<SolvedCase> {
        let n = case.buses.len();
        let slack = case
            .slack()
            .ok_or_else(|| anyhow!("case for {} has no slack bus", case.hour))?;

        let mut susceptance = vec![vec![0.0; n]; n];
        for branch in &case.branches {
            let (i, j) = (branch.from, branch.to);
            if i == j {
                continue;
            }
            let b = 1.0 / reactance(branch.x);
            susceptance[i][j] -= b;
            susceptance[j][i] -= b;
            susceptance[i][i] += b;
            susceptance[j][j] += b;
        }

        let injections: Vec<f64> = case
            .net_injections()
            .iter()
            .map(|p| p / case.base_mva)
            .collect();
        if let Some(pos) = injections.iter().position(|p| !p.is_finite()) {
            return Err(anyhow!("non-finite injection at {}", case.buses[pos].id));
        }

        let keep: Vec<usize> = (0..n).filter(|&k| k != slack).collect();
        let reduced: Vec<Vec<f64>> = keep
            .iter()
            .map(|&i| keep.iter().map(|&j| susceptance[i][j]).collect())
            .collect();
        let reduced_rhs: Vec<f64> = keep.iter().map(|&i| injections[i]).collect();
        let theta = self.backend.solve(&reduced, &reduced_rhs)?;

        let mut angles = vec![0.0; n];
        for (&pos, value) in keep.iter().zip(theta) {
            angles[pos] = value;
        }

        let branch_flow_mw = case
            .branches
            .iter()
            .map(|branch| {
                (angles[branch.from] - angles[branch.to]) / reactance(branch.x) * case.base_mva
            })
            .collect();

        let slack_mw = (0..n)
            .map(|j| susceptance[slack][j] * angles[j])
            .sum::<f64>()
            * case.base_mva;

        Ok(SolvedCase {
            angles,
            branch_flow_mw,
            slack_mw,
        })
    }
}
