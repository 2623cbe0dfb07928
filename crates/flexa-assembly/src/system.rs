//! System and discipline collaborators consumed by the assembly driver.
//!
//! [`SystemInit`] supplies the mesh handle and the DOF-to-global-index map;
//! [`Discipline`] supplies property cards by subdomain and the side/volume
//! load maps. Both outlive any single assembly pass.

use crate::error::AssemblyError;
use flexa_model::{
    BoundaryCondition, BoundaryId, Element, LoadMap, Mesh, ModelError, PropertyCard, SubdomainId,
    DOFS_PER_NODE,
};
use nalgebra::DVector;
use std::collections::HashMap;
use std::sync::Arc;

/// Node-major DOF numbering: node `n` owns global DOFs
/// `(n−1)·6 .. (n−1)·6+5`
///
/// Node ids need not be contiguous; the system is sized by the largest id,
/// as unattached rows stay empty under pure additive accumulation.
#[derive(Debug, Clone)]
pub struct DofMap {
    n_dofs: usize,
}

impl DofMap {
    /// Build the map for a mesh
    pub fn new(mesh: &Mesh) -> Self {
        let max_node_id = mesh.nodes.keys().max().copied().unwrap_or(0).max(0) as usize;
        Self {
            n_dofs: max_node_id * DOFS_PER_NODE,
        }
    }

    /// Total number of global DOFs
    pub fn n_dofs(&self) -> usize {
        self.n_dofs
    }

    /// First global DOF of a node
    pub fn node_base(&self, node_id: i32) -> usize {
        (node_id as usize - 1) * DOFS_PER_NODE
    }

    /// Global DOF indices of an element, in element-local DOF order
    pub fn element_dofs(&self, element: &Element) -> Vec<usize> {
        let mut dofs = Vec::with_capacity(element.nodes.len() * DOFS_PER_NODE);
        for &node_id in &element.nodes {
            let base = self.node_base(node_id);
            for offset in 0..DOFS_PER_NODE {
                dofs.push(base + offset);
            }
        }
        dofs
    }

    /// Gather an element's entries out of a global vector
    pub fn gather(
        &self,
        global: &DVector<f64>,
        element: &Element,
    ) -> Result<DVector<f64>, AssemblyError> {
        if global.len() != self.n_dofs {
            return Err(AssemblyError::SizeMismatch {
                expected: self.n_dofs,
                got: global.len(),
            });
        }
        let dofs = self.element_dofs(element);
        Ok(DVector::from_iterator(
            dofs.len(),
            dofs.iter().map(|&d| global[d]),
        ))
    }
}

/// Mesh plus DOF numbering handed to the driver at attach time
#[derive(Debug, Clone)]
pub struct SystemInit {
    /// The mesh iterated during assembly
    pub mesh: Arc<Mesh>,
    /// DOF numbering of the mesh
    pub dof_map: DofMap,
}

impl SystemInit {
    /// Create the system context for a mesh
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let dof_map = DofMap::new(&mesh);
        Self { mesh, dof_map }
    }

    /// Total number of global DOFs
    pub fn n_dofs(&self) -> usize {
        self.dof_map.n_dofs()
    }
}

/// Physics configuration: property cards and load maps
#[derive(Clone, Default)]
pub struct Discipline {
    properties: HashMap<SubdomainId, Arc<PropertyCard>>,
    /// Loads keyed by boundary id, dispatched per element side
    pub side_loads: LoadMap,
    /// Loads keyed by subdomain id, dispatched per element volume
    pub volume_loads: LoadMap,
    /// Enable deformation-following load directions (Jacobians unsupported)
    pub follower_forces: bool,
}

impl Discipline {
    /// Create an empty discipline
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a property card to a subdomain
    pub fn add_property_card(&mut self, subdomain: SubdomainId, card: Arc<PropertyCard>) {
        self.properties.insert(subdomain, card);
    }

    /// Property card of a subdomain
    pub fn card_for(&self, subdomain: SubdomainId) -> Result<&Arc<PropertyCard>, ModelError> {
        self.properties
            .get(&subdomain)
            .ok_or(ModelError::NoPropertyCard(subdomain))
    }

    /// Register a side (boundary-id keyed) load
    pub fn add_side_load(&mut self, boundary: BoundaryId, bc: Arc<BoundaryCondition>) {
        self.side_loads.insert(boundary, bc);
    }

    /// Register a volume (subdomain-id keyed) load
    pub fn add_volume_load(&mut self, subdomain: SubdomainId, bc: Arc<BoundaryCondition>) {
        self.volume_loads.insert(subdomain, bc);
    }
}
