//! Newmark-family transient integration with an iterative correction loop,
//! including a hybrid-simulation mode in which each solved displacement
//! correction is throttled by a reduction factor before being applied.
//!
//! Spatial discretization, materials, and the global assembler are external;
//! they are consumed through the [`system::EquationSystem`] and
//! [`convergence::ConvergenceTest`] contracts.

pub mod convergence;
pub mod error;
pub mod integrator;
pub mod prelude;
pub mod state;
pub mod system;
