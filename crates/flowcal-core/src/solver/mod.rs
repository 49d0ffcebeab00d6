//! Dense linear algebra used by the DC flow solve.

pub mod backend;

pub use backend::{FaerSolver, LinearSystemBackend};
