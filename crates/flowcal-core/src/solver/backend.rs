use anyhow::{anyhow, Result};
use faer::{prelude::*, solvers::PartialPivLu, Mat};

/// Trait for solving dense linear systems (Ax = b).
///
/// The reduced susceptance system of the DC flow solve goes through this seam.
pub trait LinearSystemBackend: Send + Sync {
    /// Solve the linear system Ax = b
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>>;
}

/// LU with partial pivoting from `faer`.
#[derive(Debug, Clone, Default)]
pub struct FaerSolver;

impl LinearSystemBackend for FaerSolver {
    fn solve(&self, matrix: &[Vec<f64>], rhs: &[f64]) -> Result<Vec<f64>> {
        let n = matrix.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if rhs.len() != n {
            return Err(anyhow!(
                "rhs length ({}) does not match matrix dimension {}",
                rhs.len(),
                n
            ));
        }
        if matrix.iter().any(|row| row.len() != n) {
            return Err(anyhow!("matrix must be square"));
        }

        let mat = Mat::from_fn(n, n, |i, j| matrix[i][j]);
        let rhs_mat = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let lu = PartialPivLu::new(mat.as_ref());
        let sol = lu.solve(&rhs_mat);

        let solution: Vec<f64> = (0..n).map(|i| sol.read(i, 0)).collect();
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(anyhow!("singular matrix: non-finite solution"));
        }
        Ok(solution)
    }
}
