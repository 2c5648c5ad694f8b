//! Contracts consumed from the equation-system collaborator.
//!
//! The integrator never assembles element contributions or factors matrices
//! itself; it hands the collaborator the coefficients that translate the
//! time discretization into algebraic tangent scaling and receives solved
//! displacement corrections back.

use serde::{Deserialize, Serialize};

use crate::error::IntegratorResult;
use crate::prelude::*;
use crate::state::State;

/// Mass- and stiffness-proportional damping factors, `C = alpha_m*M + beta_k*K`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RayleighDamping {
    pub alpha_m: f64,
    pub beta_k: f64,
}

/// Scale factors the assembler applies when forming the effective tangent:
/// `T = c_k*K + c_c*C + c_m*M`.
///
/// `rayleigh` is carried along so an assembler without explicit dampers can
/// form `C` from the mass and stiffness it already holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentCoeffs {
    pub c_k: f64,
    pub c_c: f64,
    pub c_m: f64,
    pub rayleigh: RayleighDamping,
}

/// The global equation system: assembly and linear solve.
///
/// `state` arguments are read-only views of the integrator's trial response;
/// implementations must not retain them across calls.
pub trait EquationSystem {
    /// Current number of active DOFs; re-queried after `domain_changed`.
    fn num_active_dofs(&self) -> usize;

    /// Assemble the effective tangent at the given trial state.
    fn form_tangent(&mut self, coeffs: &TangentCoeffs, state: &State) -> MatrixD;

    /// Assemble the unbalanced-force residual at the given trial state.
    fn form_residual(&mut self, state: &State) -> VectorD;

    /// Solve `tangent * x = residual` for the displacement correction.
    ///
    /// Fails with `SingularSystem` when the tangent cannot be factored.
    fn solve(&mut self, tangent: &MatrixD, residual: &VectorD) -> IntegratorResult<VectorD>;
}
