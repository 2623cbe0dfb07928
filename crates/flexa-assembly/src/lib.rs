//! Residual and Jacobian assembly core for structural finite elements.
//!
//! Given a mesh of beam, shell, and solid elements (6 DOF per node),
//! property cards, and boundary loads, this crate assembles the global
//! residual vector, sparse Jacobian, matrix-free Jacobian-vector products,
//! and design-sensitivity right-hand sides consumed by an external
//! nonlinear solver.
//!
//! The solver-facing surface lives on [`AssemblyDriver`]; the per-element
//! physics on [`StructuralElement`]; boundary-load dispatch in
//! [`loads`](crate::loads).

pub mod diagnostics;
pub mod driver;
pub mod elements;
pub mod error;
pub mod frame;
pub mod loads;
pub mod quadrature;
pub mod scalar;
pub mod sensitivity;
pub mod system;

pub use driver::{AssemblyConfig, AssemblyDriver, PostAssembly};
pub use elements::StructuralElement;
pub use error::AssemblyError;
pub use frame::LocalFrame;
pub use scalar::{LoadScalar, ScalarField, VectorField};
pub use sensitivity::{DesignParameter, ParameterKind};
pub use system::{Discipline, DofMap, SystemInit};
