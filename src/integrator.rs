//! Newmark-beta transient integrator.
//!
//! The base [`Newmark`] integrator advances a committed response state by one
//! time step: a predictor forms the trial response, the caller drives
//! {assemble, solve, update} rounds against it, and `commit` promotes the
//! trial once the outer loop accepts it. [`hybrid::HybridSimulation`] wraps
//! this with the reduction-factor correction loop used in hybrid testing.

use serde::{Deserialize, Serialize};

use crate::error::{IntegratorError, IntegratorResult};
use crate::prelude::*;
use crate::state::State;
use crate::system::{EquationSystem, RayleighDamping, TangentCoeffs};

pub mod hybrid;
pub mod snapshot;

/// Time-discretization parameters. Immutable during a step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewmarkParameters {
    pub gamma: f64,
    pub beta: f64,
    /// Current step size; set at each `new_step`.
    pub dt: f64,
    pub rayleigh: RayleighDamping,
}

/// Newmark-beta integrator over the active DOFs.
///
/// Owns the committed response `state` and, between `new_step` and `commit`,
/// the trial response `state_next`. The equation-system collaborator only
/// ever sees read-only views of these.
#[derive(Debug, Clone)]
pub struct Newmark {
    params: NewmarkParameters,
    gamma_prime: f64, // gamma / (beta * dt)
    beta_prime: f64,  // 1 / (beta * dt^2)
    state: State,
    state_next: Option<State>,
    initialized: bool,
    resize_pending: bool,
}

impl Newmark {
    /// Requires `gamma` in (0, 1] and `beta` in (0, 0.5].
    pub fn new(gamma: f64, beta: f64) -> IntegratorResult<Self> {
        if !(gamma > 0. && gamma <= 1.) || !gamma.is_finite() {
            return Err(IntegratorError::InvalidParameter {
                name: "gamma",
                value: gamma,
            });
        }
        if !(beta > 0. && beta <= 0.5) || !beta.is_finite() {
            return Err(IntegratorError::InvalidParameter {
                name: "beta",
                value: beta,
            });
        }
        Ok(Newmark {
            params: NewmarkParameters {
                gamma,
                beta,
                dt: 0.,
                rayleigh: RayleighDamping::default(),
            },
            gamma_prime: 0.,
            beta_prime: 0.,
            state: State::zeros(0),
            state_next: None,
            initialized: false,
            resize_pending: false,
        })
    }

    pub fn with_rayleigh(mut self, rayleigh: RayleighDamping) -> Self {
        self.params.rayleigh = rayleigh;
        self
    }

    /// Size the committed state from the collaborator. Must be called once
    /// before the first `new_step`; the committed response starts at rest.
    pub fn initialize(&mut self, system: &dyn EquationSystem) {
        self.state = State::zeros(system.num_active_dofs());
        self.state_next = None;
        self.initialized = true;
        self.resize_pending = false;
    }

    /// Overwrite the committed response, e.g. with equilibrium initial
    /// conditions. Discards any open trial state.
    pub fn set_initial_conditions(
        &mut self,
        u: VectorD,
        v: VectorD,
        a: VectorD,
    ) -> IntegratorResult<()> {
        if !self.initialized {
            return Err(IntegratorError::DomainNotReady(
                "initialize must be called before setting initial conditions",
            ));
        }
        let ndofs = self.state.ndofs();
        for vec in [&u, &v, &a] {
            if vec.len() != ndofs {
                return Err(IntegratorError::DofMismatch {
                    expected: ndofs,
                    found: vec.len(),
                });
            }
        }
        self.state = State { u, v, a };
        self.state_next = None;
        Ok(())
    }

    /// Start a new step: form the trial response from the committed state
    /// using the Newmark predictor with the trial displacement held at the
    /// committed displacement.
    pub fn new_step(&mut self, dt: f64, system: &dyn EquationSystem) -> IntegratorResult<()> {
        if !(dt > 0.) || !dt.is_finite() {
            return Err(IntegratorError::InvalidStepSize(dt));
        }
        if !self.initialized {
            return Err(IntegratorError::DomainNotReady(
                "no committed state; call initialize first",
            ));
        }
        if self.resize_pending {
            // DOF layout changed underneath us; re-derive sizing
            self.state = State::zeros(system.num_active_dofs());
            self.resize_pending = false;
        }

        self.params.dt = dt;
        self.gamma_prime = self.params.gamma / (self.params.beta * dt);
        self.beta_prime = 1. / (self.params.beta * dt * dt);

        // Predictor at zero displacement increment
        let mut next = self.state.clone();
        next.a = -(1. / (self.params.beta * dt)) * &self.state.v
            - (0.5 / self.params.beta - 1.) * &self.state.a;
        next.v = &self.state.v
            + (1. - self.params.gamma) * dt * &self.state.a
            + self.params.gamma * dt * &next.a;
        self.state_next = Some(next);
        Ok(())
    }

    /// Coefficients the assembler applies when forming the effective
    /// tangent: `T = c_k*K + c_c*C + c_m*M`.
    pub fn tangent_coeffs(&self) -> TangentCoeffs {
        TangentCoeffs {
            c_k: 1.,
            c_c: self.gamma_prime,
            c_m: self.beta_prime,
            rayleigh: self.params.rayleigh,
        }
    }

    /// Delegate effective-tangent assembly to the collaborator at the trial
    /// state (or the committed state if no step is open).
    pub fn form_tangent(&self, system: &mut dyn EquationSystem) -> MatrixD {
        let coeffs = self.tangent_coeffs();
        system.form_tangent(&coeffs, self.state_next.as_ref().unwrap_or(&self.state))
    }

    /// Delegate residual assembly to the collaborator at the trial state
    /// (or the committed state if no step is open).
    pub fn form_residual(&self, system: &mut dyn EquationSystem) -> VectorD {
        system.form_residual(self.state_next.as_ref().unwrap_or(&self.state))
    }

    /// Apply a solved displacement correction to the trial response and
    /// recompute trial velocity/acceleration consistently:
    /// `u += du`, `v += gamma_prime*du`, `a += beta_prime*du`.
    pub fn update(&mut self, du: &VectorD) -> IntegratorResult<()> {
        let (gamma_prime, beta_prime) = (self.gamma_prime, self.beta_prime);
        let next = self.state_next.as_mut().ok_or(IntegratorError::DomainNotReady(
            "no step in progress; call new_step first",
        ))?;
        if du.len() != next.ndofs() {
            return Err(IntegratorError::DofMismatch {
                expected: next.ndofs(),
                found: du.len(),
            });
        }
        next.u.add_assign(du);
        next.v.add_assign(gamma_prime * du);
        next.a.add_assign(beta_prime * du);
        Ok(())
    }

    /// Promote trial -> committed. No-op when no step is open.
    pub fn commit(&mut self) {
        if let Some(next) = self.state_next.take() {
            self.state = next;
        }
    }

    /// Discard the trial response, restoring the last committed state.
    /// Always safe, idempotent.
    pub fn revert_to_last_step(&mut self) {
        self.state_next = None;
    }

    /// The DOF layout changed; vector sizes are re-derived from the
    /// collaborator on the next `new_step`. Any open trial is discarded.
    pub fn domain_changed(&mut self) {
        self.resize_pending = true;
        self.state_next = None;
    }

    pub fn parameters(&self) -> &NewmarkParameters {
        &self.params
    }

    /// Committed response at time t.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Trial response at the target time, if a step is open.
    pub fn trial(&self) -> Option<&State> {
        self.state_next.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
