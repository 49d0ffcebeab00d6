//! Bounded minimization of an [`Objective`].
//!
//! [`NelderMeadMinimizer`] runs argmin's Nelder-Mead simplex on a wrapper
//! that evaluates the objective at the candidate projected into the box and
//! adds a quadratic penalty on the distance outside it, so the simplex is
//! pulled back without the objective ever seeing an out-of-bounds vector.

use crate::objective::Objective;
use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use flowcal_core::{FlowcalError, FlowcalResult};
use serde::{Deserialize, Serialize};

/// Best point found by a minimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: u64,
}

pub trait BoundedMinimizer: Send + Sync {
    fn minimize(
        &self,
        objective: &dyn Objective,
        start: &[f64],
        bounds: &[(f64, f64)],
    ) -> FlowcalResult<Minimum>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadMinimizer {
    pub max_iters: u64,
    /// Stop when the standard deviation of the simplex costs drops below this.
    pub sd_tolerance: f64,
    /// Initial simplex edge as a fraction of each bound width.
    pub initial_step: f64,
    /// Weight of the squared out-of-bounds distance.
    pub penalty: f64,
}

impl Default for NelderMeadMinimizer {
    fn default() -> Self {
        Self {
            max_iters: 200,
            sd_tolerance: 1e-6,
            initial_step: 0.1,
            penalty: 1e6,
        }
    }
}

fn project_onto_bounds(x: &mut [f64], bounds: &[(f64, f64)]) {
    for (xi, (lb, ub)) in x.iter_mut().zip(bounds) {
        *xi = xi.max(*lb).min(*ub);
    }
}

struct BoundedProblem<'a> {
    objective: &'a dyn Objective,
    bounds: &'a [(f64, f64)],
    penalty: f64,
}

impl<'a> CostFunction for BoundedProblem<'a> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let mut inside = x.clone();
        project_onto_bounds(&mut inside, self.bounds);
        let violation: f64 = x
            .iter()
            .zip(&inside)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let value = self.objective.evaluate(&inside)?;
        Ok(value + self.penalty * violation)
    }
}

fn check_inputs(dimension: usize, start: &[f64], bounds: &[(f64, f64)]) -> FlowcalResult<()> {
    if dimension == 0 {
        return Err(FlowcalError::Config("nothing to calibrate".into()));
    }
    if start.len() != dimension || bounds.len() != dimension {
        return Err(FlowcalError::Validation(format!(
            "objective has {dimension} parameters, got {} start values and {} bounds",
            start.len(),
            bounds.len()
        )));
    }
    for (i, (lb, ub)) in bounds.iter().enumerate() {
        if !(lb.is_finite() && ub.is_finite() && lb <= ub) {
            return Err(FlowcalError::Config(format!(
                "invalid bounds [{lb}, {ub}] for parameter {i}"
            )));
        }
    }
    Ok(())
}

impl NelderMeadMinimizer {
    /// Start point plus one vertex per axis, stepped towards the far bound.
    fn simplex(&self, start: &[f64], bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let mut vertices = vec![start.to_vec()];
        for (i, (lb, ub)) in bounds.iter().enumerate() {
            let width = ub - lb;
            let step = if width > 0.0 {
                self.initial_step * width
            } else {
                self.initial_step * start[i].abs().max(1e-3)
            };
            let mut vertex = start.to_vec();
            vertex[i] = if start[i] + step <= *ub || width == 0.0 {
                start[i] + step
            } else {
                start[i] - step
            };
            vertices.push(vertex);
        }
        vertices
    }
}

impl BoundedMinimizer for NelderMeadMinimizer {
    fn minimize(
        &self,
        objective: &dyn Objective,
        start: &[f64],
        bounds: &[(f64, f64)],
    ) -> FlowcalResult<Minimum> {
        check_inputs(objective.dimension(), start, bounds)?;
        let mut start = start.to_vec();
        project_onto_bounds(&mut start, bounds);

        let problem = BoundedProblem {
            objective,
            bounds,
            penalty: self.penalty,
        };
        let solver = NelderMead::new(self.simplex(&start, bounds))
            .with_sd_tolerance(self.sd_tolerance)
            .map_err(|e| FlowcalError::Config(format!("Nelder-Mead setup: {e}")))?;

        tracing::info!(
            dimension = start.len(),
            max_iters = self.max_iters,
            "starting Nelder-Mead"
        );
        let result = Executor::new(problem, solver)
            .configure(|state| state.max_iters(self.max_iters))
            .run()
            .map_err(|e| FlowcalError::Other(format!("minimization failed: {e:#}")))?;

        let iterations = result.state().get_iter();
        let mut x = result
            .state()
            .get_best_param()
            .cloned()
            .unwrap_or_else(|| start.clone());
        project_onto_bounds(&mut x, bounds);
        let value = objective.evaluate(&x)?;
        tracing::info!(x = ?x, value, iterations, "Nelder-Mead finished");
        Ok(Minimum {
            x,
            value,
            iterations,
        })
    }
}
