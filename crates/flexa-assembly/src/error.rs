//! Error types for flexa-assembly

use flexa_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AssemblyError>;

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Element {element}: Jacobian requested with follower forces enabled")]
    FollowerForceJacobian { element: i32 },

    #[error("Boundary condition type {bc_type} not supported in {context} dispatch")]
    UnsupportedBc {
        context: &'static str,
        bc_type: &'static str,
    },

    #[error("Element {element}: degenerate geometry ({detail})")]
    DegenerateGeometry { element: i32, detail: String },

    #[error("Element {element}: {detail}")]
    InvalidLoad { element: i32, detail: String },

    #[error("Assembly driver is not attached to a system")]
    NotAttached,

    #[error("Vector length {got} does not match system size {expected}")]
    SizeMismatch { expected: usize, got: usize },
}
