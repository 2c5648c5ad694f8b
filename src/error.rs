//! Error types for the integrator core.
//!
//! All fallible operations return `IntegratorResult<T>`. Solver failures
//! reported by the equation-system collaborator propagate unchanged; retry
//! policy (e.g. smaller step size) belongs to the outer analysis driver.

use thiserror::Error;

/// Convenience alias for `Result<T, IntegratorError>`.
pub type IntegratorResult<T> = Result<T, IntegratorError>;

/// Unified error type for the integrator core.
///
/// Payloads are plain values so convergence verdicts can carry a failure
/// reason by value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegratorError {
    /// Step size must be positive and finite.
    #[error("invalid step size dt = {0}; must be > 0")]
    InvalidStepSize(f64),

    /// Configuration value is outside its valid range.
    #[error("invalid parameter {name} = {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// The integrator has no committed state to advance from.
    #[error("domain not ready: {0}")]
    DomainNotReady(&'static str),

    /// A supplied vector does not match the active DOF count.
    #[error("DOF count mismatch: expected {expected}, found {found}")]
    DofMismatch { expected: usize, found: usize },

    /// The effective tangent could not be factored.
    #[error("singular effective tangent; system cannot be solved")]
    SingularSystem,

    /// The correction loop ran out of iterations without converging.
    #[error("iteration limit exceeded after {max} corrections")]
    IterationLimitExceeded { max: usize },

    /// The convergence test itself detected divergence (e.g. non-finite norms).
    #[error("convergence test failure: {0}")]
    ConvergenceTestFailure(String),

    /// Serialized state could not be decoded.
    #[error("malformed state snapshot: {0}")]
    Format(String),
}
