use nalgebra::Dyn;

pub use itertools::{izip, Itertools};
pub use std::ops::AddAssign;

//------------------------------------------------------------------------------
// Types
//------------------------------------------------------------------------------

/// Column vector (Degrees of Freedom)
pub type VectorD = nalgebra::DVector<f64>;

/// Matrix (DOFs x DOFs)
pub type MatrixD = nalgebra::OMatrix<f64, Dyn, Dyn>;
