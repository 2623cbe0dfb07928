//! Error types for flexa-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Node {0} not found in mesh")]
    NodeNotFound(i32),

    #[error("Element {element}: shape requires {expected} nodes, got {got}")]
    ConnectivityMismatch {
        element: i32,
        expected: usize,
        got: usize,
    },

    #[error("Material '{material}' missing {property}")]
    MissingMaterialProperty {
        material: String,
        property: &'static str,
    },

    #[error("Property card has no {expected} section")]
    SectionMismatch { expected: &'static str },

    #[error("Boundary condition missing {kind} field function '{name}'")]
    MissingField { kind: &'static str, name: String },

    #[error("No property card assigned to subdomain {0}")]
    NoPropertyCard(u32),
}
