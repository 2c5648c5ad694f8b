//! Hybrid-simulation extension of the Newmark integrator.
//!
//! Wraps [`Newmark`] with a caller-driven correction loop in which every
//! solved displacement increment is throttled by a fixed reduction factor
//! before being applied, emulating actuator limits of a physical
//! substructure. One `iterate` call performs one round of
//! {assemble, solve, scale, update, test}.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::convergence::{ConvergenceTest, Verdict};
use crate::error::{IntegratorError, IntegratorResult};
use crate::prelude::*;
use crate::state::State;
use crate::system::EquationSystem;

use super::{snapshot, Newmark};

/// Where the current step stands in the correction loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// No step is open.
    Idle,
    /// A trial state exists; corrections may be applied.
    Iterating,
    Converged,
    Failed,
}

/// Step-scoped bookkeeping of the correction loop. Created at `new_step`,
/// discarded on `commit`, `revert_to_last_step`, or `domain_changed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationContext {
    pub reduction_factor: f64,
    pub current_iteration: usize,
    pub max_iterations: usize,
    /// The last increment actually applied (already scaled by the
    /// reduction factor). Empty before the first correction.
    pub last_increment: VectorD,
    /// Unbalance formed after the last correction; reused as the next
    /// solve's right-hand side so the residual is assembled once per round.
    residual: Option<VectorD>,
}

/// Newmark integrator with the hybrid-simulation correction loop.
pub struct HybridSimulation {
    newmark: Newmark,
    test: Box<dyn ConvergenceTest>,
    reduction_factor: f64,
    max_iterations: usize,
    ctx: Option<IterationContext>,
    terminal: Option<Verdict>,
}

impl HybridSimulation {
    /// Requires `reduction_factor` in (0, 1] and `max_iterations > 0`.
    pub fn new(
        gamma: f64,
        beta: f64,
        test: Box<dyn ConvergenceTest>,
        reduction_factor: f64,
        max_iterations: usize,
    ) -> IntegratorResult<Self> {
        if !(reduction_factor > 0. && reduction_factor <= 1.) {
            return Err(IntegratorError::InvalidParameter {
                name: "reduction_factor",
                value: reduction_factor,
            });
        }
        if max_iterations == 0 {
            return Err(IntegratorError::InvalidParameter {
                name: "max_iterations",
                value: 0.,
            });
        }
        Ok(HybridSimulation {
            newmark: Newmark::new(gamma, beta)?,
            test,
            reduction_factor,
            max_iterations,
            ctx: None,
            terminal: None,
        })
    }

    pub fn with_rayleigh(mut self, rayleigh: crate::system::RayleighDamping) -> Self {
        self.newmark = self.newmark.with_rayleigh(rayleigh);
        self
    }

    pub fn initialize(&mut self, system: &dyn EquationSystem) {
        self.newmark.initialize(system);
        self.ctx = None;
        self.terminal = None;
    }

    pub fn set_initial_conditions(
        &mut self,
        u: VectorD,
        v: VectorD,
        a: VectorD,
    ) -> IntegratorResult<()> {
        self.newmark.set_initial_conditions(u, v, a)
    }

    /// Start a new step: run the Newmark predictor and reset the iteration
    /// context.
    pub fn new_step(&mut self, dt: f64, system: &dyn EquationSystem) -> IntegratorResult<()> {
        self.newmark.new_step(dt, system)?;
        self.ctx = Some(IterationContext {
            reduction_factor: self.reduction_factor,
            current_iteration: 0,
            max_iterations: self.max_iterations,
            last_increment: VectorD::zeros(0),
            residual: None,
        });
        self.terminal = None;
        Ok(())
    }

    /// Perform one correction round against the trial state.
    ///
    /// Returns the convergence verdict; once a terminal verdict is reached
    /// it is returned unchanged by further calls without touching the
    /// iteration count. `SingularSystem` from the solve propagates as an
    /// error. A failed step is never committed here; the caller must
    /// `revert_to_last_step` before retrying (e.g. with a smaller `dt`).
    pub fn iterate(&mut self, system: &mut dyn EquationSystem) -> IntegratorResult<Verdict> {
        if let Some(verdict) = &self.terminal {
            return Ok(verdict.clone());
        }
        if self.ctx.is_none() || self.newmark.trial().is_none() {
            return Err(IntegratorError::DomainNotReady(
                "no step in progress; call new_step first",
            ));
        }

        // A context restored at its limit (e.g. from a snapshot) must not
        // iterate further
        if let Some(ctx) = &self.ctx {
            if ctx.current_iteration >= ctx.max_iterations {
                let verdict = Verdict::Failed(IntegratorError::IterationLimitExceeded {
                    max: ctx.max_iterations,
                });
                self.terminal = Some(verdict.clone());
                return Ok(verdict);
            }
        }

        // Assemble at the current trial state; the residual may be carried
        // over from the previous round's post-update assembly.
        let residual = match self.ctx.as_mut().and_then(|c| c.residual.take()) {
            Some(r) => r,
            None => self.newmark.form_residual(system),
        };
        let tangent = self.newmark.form_tangent(system);

        // Solve for the full correction, then throttle it
        let du_solved = system.solve(&tangent, &residual)?;
        let du_applied = self.reduction_factor * &du_solved;
        self.newmark.update(&du_applied)?;

        let residual_new = self.newmark.form_residual(system);

        let ctx = self.ctx.as_mut().expect("iteration context checked above");
        ctx.current_iteration += 1;
        let verdict = self
            .test
            .test(&residual_new, &du_applied, ctx.current_iteration);
        ctx.last_increment = du_applied;
        ctx.residual = Some(residual_new);

        match verdict {
            Verdict::Converged => {
                debug!(
                    "step converged after {} correction(s)",
                    ctx.current_iteration
                );
                self.terminal = Some(Verdict::Converged);
                Ok(Verdict::Converged)
            }
            Verdict::NotConverged { norm } => {
                debug!(
                    "iteration {}/{}: norm = {:.6e}",
                    ctx.current_iteration, ctx.max_iterations, norm
                );
                if ctx.current_iteration >= ctx.max_iterations {
                    warn!(
                        "no convergence after {} corrections (norm = {:.6e})",
                        ctx.max_iterations, norm
                    );
                    let verdict = Verdict::Failed(IntegratorError::IterationLimitExceeded {
                        max: ctx.max_iterations,
                    });
                    self.terminal = Some(verdict.clone());
                    Ok(verdict)
                } else {
                    Ok(Verdict::NotConverged { norm })
                }
            }
            Verdict::Failed(reason) => {
                warn!(
                    "convergence test failed at iteration {}: {}",
                    ctx.current_iteration, reason
                );
                let verdict = Verdict::Failed(reason);
                self.terminal = Some(verdict.clone());
                Ok(verdict)
            }
        }
    }

    /// Promote trial -> committed and close the step.
    pub fn commit(&mut self) {
        self.newmark.commit();
        self.ctx = None;
        self.terminal = None;
    }

    /// Abandon the open step, restoring the last committed state. Always
    /// safe, idempotent.
    pub fn revert_to_last_step(&mut self) {
        self.newmark.revert_to_last_step();
        self.ctx = None;
        self.terminal = None;
    }

    /// The DOF layout changed underneath any open iteration; the context is
    /// discarded and sizing re-derived at the next `new_step`.
    pub fn domain_changed(&mut self) {
        self.newmark.domain_changed();
        self.ctx = None;
        self.terminal = None;
    }

    pub fn phase(&self) -> StepPhase {
        match (&self.terminal, &self.ctx) {
            (Some(Verdict::Converged), _) => StepPhase::Converged,
            (Some(_), _) => StepPhase::Failed,
            (None, Some(_)) => StepPhase::Iterating,
            (None, None) => StepPhase::Idle,
        }
    }

    pub fn context(&self) -> Option<&IterationContext> {
        self.ctx.as_ref()
    }

    /// Committed response at time t.
    pub fn state(&self) -> &State {
        self.newmark.state()
    }

    /// Trial response at the target time, if a step is open.
    pub fn trial(&self) -> Option<&State> {
        self.newmark.trial()
    }

    pub fn newmark(&self) -> &Newmark {
        &self.newmark
    }

    /// Capture the full integrator state, including any in-flight iteration
    /// context, as a byte sequence. The convergence test is externally
    /// supplied and is not part of the snapshot.
    pub fn serialize_state(&self) -> IntegratorResult<Vec<u8>> {
        let snap = snapshot::HybridSnapshot {
            newmark: snapshot::capture_newmark(&self.newmark),
            reduction_factor: self.reduction_factor,
            max_iterations: self.max_iterations,
            ctx: self.ctx.clone(),
        };
        serde_json::to_vec(&snap).map_err(|e| IntegratorError::Format(e.to_string()))
    }

    /// Restore integrator state from `serialize_state` output.
    ///
    /// Fails with `Format` on malformed or inconsistent input, in which
    /// case the current state is left unchanged.
    pub fn deserialize_state(&mut self, bytes: &[u8]) -> IntegratorResult<()> {
        let snap: snapshot::HybridSnapshot =
            serde_json::from_slice(bytes).map_err(|e| IntegratorError::Format(e.to_string()))?;
        snapshot::validate_newmark(&snap.newmark)?;
        if !(snap.reduction_factor > 0. && snap.reduction_factor <= 1.) {
            return Err(IntegratorError::Format(format!(
                "reduction factor = {} out of range",
                snap.reduction_factor
            )));
        }
        if snap.max_iterations == 0 {
            return Err(IntegratorError::Format("max_iterations = 0".into()));
        }
        if let Some(ctx) = &snap.ctx {
            if snap.newmark.state_next.is_none() {
                return Err(IntegratorError::Format(
                    "iteration context present without a trial state".into(),
                ));
            }
            if ctx.current_iteration > ctx.max_iterations {
                return Err(IntegratorError::Format(format!(
                    "iteration count {} exceeds limit {}",
                    ctx.current_iteration, ctx.max_iterations
                )));
            }
            let ndofs = snap.newmark.state.ndofs();
            if !ctx.last_increment.is_empty() && ctx.last_increment.len() != ndofs {
                return Err(IntegratorError::Format(format!(
                    "last increment sized for {} DOFs, state for {}",
                    ctx.last_increment.len(),
                    ndofs
                )));
            }
        }
        snapshot::apply_newmark(&mut self.newmark, snap.newmark);
        self.reduction_factor = snap.reduction_factor;
        self.max_iterations = snap.max_iterations;
        self.ctx = snap.ctx;
        self.terminal = None;
        Ok(())
    }
}
