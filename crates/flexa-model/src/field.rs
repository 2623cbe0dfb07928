//! Field functions: spatially and temporally varying model data.
//!
//! Property cards and boundary conditions expose their data as functions of
//! position and time rather than plain values, so loads and material fields
//! can vary over the domain without the numerical core knowing how. All
//! aliases are `Arc`-shared and thread-safe so parallel element evaluation
//! can borrow them freely.

use nalgebra::{DMatrix, Vector3};
use num_complex::Complex;
use std::sync::Arc;

/// Spatial position used by all field evaluations
pub type Point3 = Vector3<f64>;

/// Real scalar field `(position, time) -> f64`
pub type ScalarFn = Arc<dyn Fn(&Point3, f64) -> f64 + Send + Sync>;

/// Complex scalar field, used by small-disturbance (frequency-domain) data
pub type ComplexScalarFn = Arc<dyn Fn(&Point3, f64) -> Complex<f64> + Send + Sync>;

/// Real vector field `(position, time) -> Vector3`
pub type VectorFn = Arc<dyn Fn(&Point3, f64) -> Vector3<f64> + Send + Sync>;

/// Complex vector field
pub type ComplexVectorFn = Arc<dyn Fn(&Point3, f64) -> Vector3<Complex<f64>> + Send + Sync>;

/// Matrix-valued field, e.g. the sectional inertia matrix
pub type MatrixFn = Arc<dyn Fn(&Point3, f64) -> DMatrix<f64> + Send + Sync>;

/// Wrap a constant value as a scalar field
pub fn constant_scalar(value: f64) -> ScalarFn {
    Arc::new(move |_, _| value)
}

/// Wrap a constant value as a complex scalar field
pub fn constant_complex_scalar(value: Complex<f64>) -> ComplexScalarFn {
    Arc::new(move |_, _| value)
}

/// Wrap a constant vector as a vector field
pub fn constant_vector(value: Vector3<f64>) -> VectorFn {
    Arc::new(move |_, _| value)
}

/// Wrap a constant complex vector as a vector field
pub fn constant_complex_vector(value: Vector3<Complex<f64>>) -> ComplexVectorFn {
    Arc::new(move |_, _| value)
}
