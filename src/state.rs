use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Response quantities over the active degrees of freedom.
///
/// The integrator owns one committed `State` plus an optional trial `State`
/// that exists only between `new_step` and a successful `commit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub u: VectorD, // displacement
    pub v: VectorD, // velocity
    pub a: VectorD, // acceleration
}

impl State {
    pub fn zeros(ndofs: usize) -> Self {
        State {
            u: VectorD::zeros(ndofs),
            v: VectorD::zeros(ndofs),
            a: VectorD::zeros(ndofs),
        }
    }

    /// Number of active DOFs these quantities span.
    pub fn ndofs(&self) -> usize {
        self.u.len()
    }

    /// True when all three vectors share `ndofs` entries.
    pub fn is_sized(&self, ndofs: usize) -> bool {
        self.u.len() == ndofs && self.v.len() == ndofs && self.a.len() == ndofs
    }
}
