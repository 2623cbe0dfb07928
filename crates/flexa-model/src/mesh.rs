//! Mesh data structures for structural assembly.
//!
//! The assembly core consumes a mesh of structural elements with a fixed
//! 6-DOF-per-node layout (3 translations + 3 rotations). Element shapes form
//! a closed set with one representative per spatial dimension, so dimension
//! dispatch is a total match rather than a runtime range check.

use crate::error::ModelError;
use std::collections::{BTreeMap, HashMap};

/// Identifier of a mesh boundary (side set)
pub type BoundaryId = u32;

/// Identifier of a mesh subdomain (volume region)
pub type SubdomainId = u32;

/// Degrees of freedom carried by every node: ux, uy, uz, tx, ty, tz
pub const DOFS_PER_NODE: usize = 6;

/// A node in the finite element mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node ID (1-based)
    pub id: i32,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Node {
    /// Create a new node
    pub fn new(id: i32, x: f64, y: f64, z: f64) -> Self {
        Self { id, x, y, z }
    }

    /// Get coordinates as an array
    pub fn coords(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Element shape: one structural family per spatial dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemShape {
    /// 2-node line element (beam)
    Bar2,
    /// 4-node quadrilateral element (shell)
    Quad4,
    /// 8-node hexahedral element (solid)
    Hex8,
}

impl ElemShape {
    /// Spatial dimension of the element
    pub fn dim(&self) -> usize {
        match self {
            ElemShape::Bar2 => 1,
            ElemShape::Quad4 => 2,
            ElemShape::Hex8 => 3,
        }
    }

    /// Number of nodes for this shape
    pub fn num_nodes(&self) -> usize {
        match self {
            ElemShape::Bar2 => 2,
            ElemShape::Quad4 => 4,
            ElemShape::Hex8 => 8,
        }
    }

    /// Number of sides (vertices for bars, edges for quads, faces for hexes)
    pub fn num_sides(&self) -> usize {
        match self {
            ElemShape::Bar2 => 2,
            ElemShape::Quad4 => 4,
            ElemShape::Hex8 => 6,
        }
    }

    /// Local node indices of a side, ordered so that side tangents produce an
    /// outward-facing normal for a positively oriented element
    pub fn side_nodes(&self, side: usize) -> &'static [usize] {
        match self {
            ElemShape::Bar2 => {
                static SIDES: [[usize; 1]; 2] = [[0], [1]];
                &SIDES[side]
            }
            ElemShape::Quad4 => {
                static SIDES: [[usize; 2]; 4] = [[0, 1], [1, 2], [2, 3], [3, 0]];
                &SIDES[side]
            }
            ElemShape::Hex8 => {
                static SIDES: [[usize; 4]; 6] = [
                    [0, 3, 2, 1], // zeta = -1
                    [0, 1, 5, 4], // eta = -1
                    [1, 2, 6, 5], // xi = +1
                    [2, 3, 7, 6], // eta = +1
                    [3, 0, 4, 7], // xi = -1
                    [4, 5, 6, 7], // zeta = +1
                ];
                &SIDES[side]
            }
        }
    }
}

/// A structural element: shape, connectivity, subdomain, per-side boundaries
///
/// Immutable once handed to an assembly pass. A side may carry any number of
/// boundary ids, and the same boundary id may appear on many elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element ID (1-based)
    pub id: i32,
    /// Element shape
    pub shape: ElemShape,
    /// Node IDs, in the shape's canonical order
    pub nodes: Vec<i32>,
    /// Subdomain this element belongs to
    pub subdomain: SubdomainId,
    /// Boundary ids registered on each side; empty entries mean no boundary
    pub side_boundaries: Vec<Vec<BoundaryId>>,
}

impl Element {
    /// Create a new element with no boundary registrations
    pub fn new(id: i32, shape: ElemShape, nodes: Vec<i32>, subdomain: SubdomainId) -> Self {
        let side_boundaries = vec![Vec::new(); shape.num_sides()];
        Self {
            id,
            shape,
            nodes,
            subdomain,
            side_boundaries,
        }
    }

    /// Register a boundary id on one side of the element
    pub fn add_side_boundary(&mut self, side: usize, boundary: BoundaryId) {
        self.side_boundaries[side].push(boundary);
    }

    /// Boundary ids on a given side (empty if none registered)
    pub fn boundaries_on_side(&self, side: usize) -> &[BoundaryId] {
        &self.side_boundaries[side]
    }

    /// Check connectivity length against the shape
    pub fn validate(&self) -> Result<(), ModelError> {
        let expected = self.shape.num_nodes();
        if self.nodes.len() != expected {
            return Err(ModelError::ConnectivityMismatch {
                element: self.id,
                expected,
                got: self.nodes.len(),
            });
        }
        Ok(())
    }
}

/// Finite element mesh
///
/// Elements are kept in id order so that every assembly pass visits them in
/// the same deterministic sequence.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// All nodes by ID
    pub nodes: HashMap<i32, Node>,
    /// All elements by ID, iterated in ascending id order
    pub elements: BTreeMap<i32, Element>,
}

impl Mesh {
    /// Create an empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the mesh
    pub fn add_node(&mut self, node: Node) {
        self.nodes.insert(node.id, node);
    }

    /// Add an element to the mesh, validating its connectivity
    pub fn add_element(&mut self, element: Element) -> Result<(), ModelError> {
        element.validate()?;
        self.elements.insert(element.id, element);
        Ok(())
    }

    /// Resolve an element's connectivity into node objects
    pub fn element_nodes(&self, element: &Element) -> Result<Vec<Node>, ModelError> {
        element
            .nodes
            .iter()
            .map(|&id| {
                self.nodes
                    .get(&id)
                    .cloned()
                    .ok_or(ModelError::NodeNotFound(id))
            })
            .collect()
    }

    /// Number of nodes in the mesh
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements in the mesh
    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_dimensions_and_counts() {
        assert_eq!(ElemShape::Bar2.dim(), 1);
        assert_eq!(ElemShape::Quad4.dim(), 2);
        assert_eq!(ElemShape::Hex8.dim(), 3);
        assert_eq!(ElemShape::Bar2.num_nodes(), 2);
        assert_eq!(ElemShape::Quad4.num_nodes(), 4);
        assert_eq!(ElemShape::Hex8.num_nodes(), 8);
        assert_eq!(ElemShape::Hex8.num_sides(), 6);
    }

    #[test]
    fn side_nodes_cover_all_element_nodes() {
        for shape in [ElemShape::Bar2, ElemShape::Quad4, ElemShape::Hex8] {
            let mut seen = vec![false; shape.num_nodes()];
            for side in 0..shape.num_sides() {
                for &n in shape.side_nodes(side) {
                    seen[n] = true;
                }
            }
            assert!(seen.iter().all(|&s| s), "{:?} leaves nodes uncovered", shape);
        }
    }

    #[test]
    fn rejects_connectivity_mismatch() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_node(Node::new(2, 1.0, 0.0, 0.0));

        let bad = Element::new(1, ElemShape::Quad4, vec![1, 2], 1);
        assert!(mesh.add_element(bad).is_err());
    }

    #[test]
    fn resolves_element_nodes() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_node(Node::new(2, 2.0, 0.0, 0.0));
        mesh.add_element(Element::new(1, ElemShape::Bar2, vec![1, 2], 1))
            .unwrap();

        let elem = mesh.elements.get(&1).unwrap();
        let nodes = mesh.element_nodes(elem).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].x, 2.0);
    }

    #[test]
    fn missing_node_is_an_error() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_element(Element::new(1, ElemShape::Bar2, vec![1, 99], 1))
            .unwrap();

        let elem = mesh.elements.get(&1).unwrap();
        assert!(mesh.element_nodes(elem).is_err());
    }

    #[test]
    fn elements_iterate_in_id_order() {
        let mut mesh = Mesh::new();
        for id in [1, 2, 3] {
            mesh.add_node(Node::new(id, id as f64, 0.0, 0.0));
        }
        mesh.add_node(Node::new(4, 4.0, 0.0, 0.0));
        for id in [7, 2, 5] {
            mesh.add_element(Element::new(id, ElemShape::Bar2, vec![1, 2], 1))
                .unwrap();
        }
        let ids: Vec<i32> = mesh.elements.keys().copied().collect();
        assert_eq!(ids, vec![2, 5, 7]);
    }

    #[test]
    fn side_boundary_registration() {
        let mut elem = Element::new(1, ElemShape::Quad4, vec![1, 2, 3, 4], 1);
        elem.add_side_boundary(2, 10);
        elem.add_side_boundary(2, 11);
        assert_eq!(elem.boundaries_on_side(2), &[10, 11]);
        assert!(elem.boundaries_on_side(0).is_empty());
    }
}
