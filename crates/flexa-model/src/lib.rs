//! Structural model data shared by the assembly core and its configuration
//! collaborators: mesh entities, field functions, property cards, and
//! boundary conditions.

pub mod boundary;
pub mod error;
pub mod field;
pub mod mesh;
pub mod property;

pub use boundary::{BcType, BoundaryCondition, LoadMap};
pub use error::ModelError;
pub use field::{
    constant_complex_scalar, constant_complex_vector, constant_scalar, constant_vector,
    ComplexScalarFn, ComplexVectorFn, MatrixFn, Point3, ScalarFn, VectorFn,
};
pub use mesh::{BoundaryId, Element, ElemShape, Mesh, Node, SubdomainId, DOFS_PER_NODE};
pub use property::{BeamSection, Material, PropertyCard, Section, ShellSection};
