//! Boundary conditions and the load maps that key them.
//!
//! A boundary condition is a typed bag of named field functions. Which names
//! a condition must carry depends on its type tag:
//! - `SurfacePressure`: `"pressure"`
//! - `Temperature`: `"temperature"`, `"ref_temperature"`
//! - `SmallDisturbanceMotion`: `"pressure"`, `"dpressure"`, `"dnormal"`
//!   (the latter two real- or complex-valued)
//! - `Dirichlet`: none at this layer (enforced elsewhere)
//!
//! Conditions are keyed by boundary or subdomain id in a [`LoadMap`]
//! multimap; a single id may carry several conditions and a condition may be
//! registered under several ids.

use crate::error::ModelError;
use crate::field::{ComplexScalarFn, ComplexVectorFn, ScalarFn, VectorFn};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Boundary condition type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BcType {
    /// Scalar pressure acting along the surface normal
    SurfacePressure,
    /// Temperature load (volume dispatch only)
    Temperature,
    /// Frequency-domain pressure perturbation around a steady base state
    SmallDisturbanceMotion,
    /// Essential constraint, enforced outside residual assembly
    Dirichlet,
}

/// Named field-function stores, separated by value type
#[derive(Clone, Default)]
struct FieldBag {
    scalars: HashMap<String, ScalarFn>,
    complex_scalars: HashMap<String, ComplexScalarFn>,
    vectors: HashMap<String, VectorFn>,
    complex_vectors: HashMap<String, ComplexVectorFn>,
}

/// A typed boundary condition
#[derive(Clone)]
pub struct BoundaryCondition {
    bc_type: BcType,
    fields: FieldBag,
}

impl std::fmt::Debug for BoundaryCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryCondition")
            .field("bc_type", &self.bc_type)
            .field("scalars", &self.fields.scalars.keys().collect::<Vec<_>>())
            .field(
                "complex_scalars",
                &self.fields.complex_scalars.keys().collect::<Vec<_>>(),
            )
            .field("vectors", &self.fields.vectors.keys().collect::<Vec<_>>())
            .field(
                "complex_vectors",
                &self.fields.complex_vectors.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl BoundaryCondition {
    /// Create a condition of the given type with no fields
    pub fn new(bc_type: BcType) -> Self {
        Self {
            bc_type,
            fields: FieldBag::default(),
        }
    }

    /// The condition's type tag
    pub fn bc_type(&self) -> BcType {
        self.bc_type
    }

    /// Attach a named real scalar field
    pub fn with_scalar(mut self, name: impl Into<String>, f: ScalarFn) -> Self {
        self.fields.scalars.insert(name.into(), f);
        self
    }

    /// Attach a named complex scalar field
    pub fn with_complex_scalar(mut self, name: impl Into<String>, f: ComplexScalarFn) -> Self {
        self.fields.complex_scalars.insert(name.into(), f);
        self
    }

    /// Attach a named real vector field
    pub fn with_vector(mut self, name: impl Into<String>, f: VectorFn) -> Self {
        self.fields.vectors.insert(name.into(), f);
        self
    }

    /// Attach a named complex vector field
    pub fn with_complex_vector(mut self, name: impl Into<String>, f: ComplexVectorFn) -> Self {
        self.fields.complex_vectors.insert(name.into(), f);
        self
    }

    /// Look up a named real scalar field
    pub fn scalar(&self, name: &str) -> Result<&ScalarFn, ModelError> {
        self.fields.scalars.get(name).ok_or(ModelError::MissingField {
            kind: "scalar",
            name: name.to_string(),
        })
    }

    /// Look up a named complex scalar field
    pub fn complex_scalar(&self, name: &str) -> Result<&ComplexScalarFn, ModelError> {
        self.fields
            .complex_scalars
            .get(name)
            .ok_or(ModelError::MissingField {
                kind: "complex scalar",
                name: name.to_string(),
            })
    }

    /// Look up a named real vector field
    pub fn vector(&self, name: &str) -> Result<&VectorFn, ModelError> {
        self.fields.vectors.get(name).ok_or(ModelError::MissingField {
            kind: "vector",
            name: name.to_string(),
        })
    }

    /// Look up a named complex vector field
    pub fn complex_vector(&self, name: &str) -> Result<&ComplexVectorFn, ModelError> {
        self.fields
            .complex_vectors
            .get(name)
            .ok_or(ModelError::MissingField {
                kind: "complex vector",
                name: name.to_string(),
            })
    }
}

/// Multimap from boundary-or-subdomain id to boundary conditions
///
/// Lookup returns every condition registered under an id; the order of
/// conditions within an id is the registration order, but handlers must not
/// depend on it (contributions are purely additive).
#[derive(Debug, Clone, Default)]
pub struct LoadMap {
    map: BTreeMap<u32, Vec<Arc<BoundaryCondition>>>,
}

impl LoadMap {
    /// Create an empty load map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a condition under an id
    pub fn insert(&mut self, id: u32, bc: Arc<BoundaryCondition>) {
        self.map.entry(id).or_default().push(bc);
    }

    /// All conditions registered under an id (empty slice if none)
    pub fn matching(&self, id: u32) -> &[Arc<BoundaryCondition>] {
        self.map.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if no conditions are registered at all
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Total number of (id, condition) registrations
    pub fn len(&self) -> usize {
        self.map.values().map(Vec::len).sum()
    }
}
