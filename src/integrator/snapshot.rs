//! Checkpoint/restart serialization of integrator state.
//!
//! Snapshots round-trip the committed and trial response, the Newmark
//! parameters, and any in-flight iteration context exactly, independent of
//! transport. Malformed or inconsistent input is rejected before anything
//! is applied, so a failed restore leaves the integrator untouched.

use serde::{Deserialize, Serialize};

use crate::error::{IntegratorError, IntegratorResult};
use crate::state::State;

use super::hybrid::IterationContext;
use super::{Newmark, NewmarkParameters};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NewmarkSnapshot {
    pub(crate) params: NewmarkParameters,
    pub(crate) state: State,
    pub(crate) state_next: Option<State>,
    pub(crate) initialized: bool,
    pub(crate) resize_pending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HybridSnapshot {
    pub(crate) newmark: NewmarkSnapshot,
    pub(crate) reduction_factor: f64,
    pub(crate) max_iterations: usize,
    pub(crate) ctx: Option<IterationContext>,
}

pub(crate) fn capture_newmark(newmark: &Newmark) -> NewmarkSnapshot {
    NewmarkSnapshot {
        params: newmark.params,
        state: newmark.state.clone(),
        state_next: newmark.state_next.clone(),
        initialized: newmark.initialized,
        resize_pending: newmark.resize_pending,
    }
}

pub(crate) fn validate_newmark(snap: &NewmarkSnapshot) -> IntegratorResult<()> {
    let p = &snap.params;
    if !(p.gamma > 0. && p.gamma <= 1.) {
        return Err(IntegratorError::Format(format!(
            "gamma = {} out of range",
            p.gamma
        )));
    }
    if !(p.beta > 0. && p.beta <= 0.5) {
        return Err(IntegratorError::Format(format!(
            "beta = {} out of range",
            p.beta
        )));
    }
    if !p.dt.is_finite() || p.dt < 0. {
        return Err(IntegratorError::Format(format!("dt = {} invalid", p.dt)));
    }
    let ndofs = snap.state.ndofs();
    if !snap.state.is_sized(ndofs) {
        return Err(IntegratorError::Format(
            "committed response vectors have inconsistent sizes".into(),
        ));
    }
    if let Some(next) = &snap.state_next {
        if !next.is_sized(ndofs) {
            return Err(IntegratorError::Format(format!(
                "trial response sized for {} DOFs, committed for {}",
                next.ndofs(),
                ndofs
            )));
        }
        if snap.params.dt == 0. {
            return Err(IntegratorError::Format(
                "trial response present but dt = 0".into(),
            ));
        }
    }
    Ok(())
}

pub(crate) fn apply_newmark(newmark: &mut Newmark, snap: NewmarkSnapshot) {
    newmark.params = snap.params;
    // Update coefficients are derived, not stored
    if snap.params.dt > 0. {
        newmark.gamma_prime = snap.params.gamma / (snap.params.beta * snap.params.dt);
        newmark.beta_prime = 1. / (snap.params.beta * snap.params.dt * snap.params.dt);
    } else {
        newmark.gamma_prime = 0.;
        newmark.beta_prime = 0.;
    }
    newmark.state = snap.state;
    newmark.state_next = snap.state_next;
    newmark.initialized = snap.initialized;
    newmark.resize_pending = snap.resize_pending;
}

impl Newmark {
    /// Capture the full integrator state as a byte sequence.
    pub fn serialize_state(&self) -> IntegratorResult<Vec<u8>> {
        serde_json::to_vec(&capture_newmark(self)).map_err(|e| IntegratorError::Format(e.to_string()))
    }

    /// Restore integrator state from `serialize_state` output.
    ///
    /// Fails with `Format` on malformed or inconsistent input, in which
    /// case the current state is left unchanged.
    pub fn deserialize_state(&mut self, bytes: &[u8]) -> IntegratorResult<()> {
        let snap: NewmarkSnapshot =
            serde_json::from_slice(bytes).map_err(|e| IntegratorError::Format(e.to_string()))?;
        validate_newmark(&snap)?;
        apply_newmark(self, snap);
        Ok(())
    }
}
