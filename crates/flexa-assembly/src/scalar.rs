//! Numeric value type for boundary-load residuals.
//!
//! The small-disturbance pressure formulation is written once and
//! instantiated for real-valued (steady) and complex-valued (frequency
//! domain) unsteady pressure. [`LoadScalar`] is the bound that makes that
//! possible: conjugate-free arithmetic, scaling by real quadrature weights,
//! and access to the matching real/complex named fields of a boundary
//! condition.

use flexa_model::{BoundaryCondition, ModelError, Point3};
use nalgebra::Vector3;
use num_complex::Complex;
use num_traits::Zero;
use std::fmt::Debug;
use std::ops::{AddAssign, Mul};
use std::sync::Arc;

/// Scalar field evaluator yielding values of `S`
pub type ScalarField<S> = Arc<dyn Fn(&Point3, f64) -> S + Send + Sync>;

/// Vector field evaluator yielding 3-vectors of `S`
pub type VectorField<S> = Arc<dyn Fn(&Point3, f64) -> Vector3<S> + Send + Sync>;

/// Numeric value type of a boundary-load residual: real or complex
pub trait LoadScalar:
    Copy
    + Debug
    + Zero
    + AddAssign
    + Mul<f64, Output = Self>
    + nalgebra::Scalar
    + Send
    + Sync
    + 'static
{
    /// Lift a real value into this scalar type
    fn from_real(x: f64) -> Self;

    /// Named scalar field of a boundary condition, in this scalar type
    fn scalar_field(bc: &BoundaryCondition, name: &str) -> Result<ScalarField<Self>, ModelError>;

    /// Named vector field of a boundary condition, in this scalar type
    fn vector_field(bc: &BoundaryCondition, name: &str) -> Result<VectorField<Self>, ModelError>;
}

impl LoadScalar for f64 {
    fn from_real(x: f64) -> Self {
        x
    }

    fn scalar_field(bc: &BoundaryCondition, name: &str) -> Result<ScalarField<Self>, ModelError> {
        Ok(Arc::clone(bc.scalar(name)?))
    }

    fn vector_field(bc: &BoundaryCondition, name: &str) -> Result<VectorField<Self>, ModelError> {
        Ok(Arc::clone(bc.vector(name)?))
    }
}

impl LoadScalar for Complex<f64> {
    fn from_real(x: f64) -> Self {
        Complex::new(x, 0.0)
    }

    fn scalar_field(bc: &BoundaryCondition, name: &str) -> Result<ScalarField<Self>, ModelError> {
        Ok(Arc::clone(bc.complex_scalar(name)?))
    }

    fn vector_field(bc: &BoundaryCondition, name: &str) -> Result<VectorField<Self>, ModelError> {
        Ok(Arc::clone(bc.complex_vector(name)?))
    }
}
