//! Convergence criteria for the iterative correction loop.
//!
//! The integrator never implements test logic itself; callers supply any
//! type satisfying [`ConvergenceTest`]. Tests must be deterministic for
//! identical inputs and must never mutate the response state.

use crate::error::IntegratorError;
use crate::prelude::*;

/// Outcome of one convergence check. Produced fresh each iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Converged,
    NotConverged { norm: f64 },
    Failed(IntegratorError),
}

impl Verdict {
    /// True for `Converged` and `Failed`; the iteration loop stops on these.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::NotConverged { .. })
    }
}

/// Capability supplied by the caller to decide when iteration may stop.
pub trait ConvergenceTest {
    fn test(&self, residual: &VectorD, increment: &VectorD, iteration: usize) -> Verdict;
}

fn check_norm(norm: f64, tol: f64, what: &str) -> Verdict {
    if !norm.is_finite() {
        return Verdict::Failed(IntegratorError::ConvergenceTestFailure(format!(
            "non-finite {} norm",
            what
        )));
    }
    if norm <= tol {
        Verdict::Converged
    } else {
        Verdict::NotConverged { norm }
    }
}

//------------------------------------------------------------------------------
// Standard criteria
//------------------------------------------------------------------------------

/// Norm of the applied displacement increment.
#[derive(Debug, Clone, Copy)]
pub struct NormDispIncr {
    pub tol: f64,
}

impl ConvergenceTest for NormDispIncr {
    fn test(&self, _residual: &VectorD, increment: &VectorD, _iteration: usize) -> Verdict {
        check_norm(increment.norm(), self.tol, "displacement increment")
    }
}

/// Norm of the unbalanced-force residual.
#[derive(Debug, Clone, Copy)]
pub struct NormUnbalance {
    pub tol: f64,
}

impl ConvergenceTest for NormUnbalance {
    fn test(&self, residual: &VectorD, _increment: &VectorD, _iteration: usize) -> Verdict {
        check_norm(residual.norm(), self.tol, "unbalanced force")
    }
}

/// Absolute energy product `|Δu · R|` of increment and residual.
#[derive(Debug, Clone, Copy)]
pub struct EnergyIncr {
    pub tol: f64,
}

impl ConvergenceTest for EnergyIncr {
    fn test(&self, residual: &VectorD, increment: &VectorD, _iteration: usize) -> Verdict {
        if residual.len() != increment.len() {
            return Verdict::Failed(IntegratorError::ConvergenceTestFailure(format!(
                "residual ({}) and increment ({}) sizes differ",
                residual.len(),
                increment.len()
            )));
        }
        check_norm(increment.dot(residual).abs(), self.tol, "energy product")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_disp_incr() {
        let test = NormDispIncr { tol: 1e-6 };
        let r = VectorD::zeros(2);

        let small = VectorD::from_vec(vec![1e-8, 0.]);
        assert_eq!(test.test(&r, &small, 1), Verdict::Converged);

        let big = VectorD::from_vec(vec![3., 4.]);
        assert_eq!(test.test(&r, &big, 1), Verdict::NotConverged { norm: 5. });
    }

    #[test]
    fn test_norm_unbalance_ignores_increment() {
        let test = NormUnbalance { tol: 1e-6 };
        let big_incr = VectorD::from_element(3, 100.);
        let r = VectorD::zeros(3);
        assert_eq!(test.test(&r, &big_incr, 1), Verdict::Converged);
    }

    #[test]
    fn test_energy_incr() {
        let test = EnergyIncr { tol: 1e-8 };
        let r = VectorD::from_vec(vec![2., 0.]);
        let d = VectorD::from_vec(vec![3., 1.]);
        assert_eq!(test.test(&r, &d, 1), Verdict::NotConverged { norm: 6. });
    }

    #[test]
    fn test_non_finite_norm_fails() {
        let test = NormUnbalance { tol: 1e-6 };
        let r = VectorD::from_vec(vec![f64::NAN]);
        let d = VectorD::zeros(1);
        match test.test(&r, &d, 1) {
            Verdict::Failed(IntegratorError::ConvergenceTestFailure(_)) => {}
            other => panic!("expected failure verdict, got {:?}", other),
        }
    }

    #[test]
    fn test_determinism() {
        let test = EnergyIncr { tol: 1e-8 };
        let r = VectorD::from_vec(vec![1.5, -0.5]);
        let d = VectorD::from_vec(vec![0.25, 4.0]);
        assert_eq!(test.test(&r, &d, 1), test.test(&r, &d, 7));
    }
}
