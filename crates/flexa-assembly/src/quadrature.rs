//! Shape functions, Gauss rules, and precomputed integration-point tables.
//!
//! Volume points carry the interpolated position (for field-function
//! evaluation), shape-function values, and the weighted measure `JxW`. Side
//! points additionally carry the outward unit normal of the side, oriented
//! away from the element centroid. Shape-function values at side points are
//! stored over the full element connectivity (zero off the side) so the
//! resulting force vectors are already element-sized.

use crate::error::AssemblyError;
use flexa_model::{ElemShape, Point3};
use nalgebra::{Matrix3, Vector3};

/// 2-point Gauss abscissa, weight 1
const GP: f64 = 0.577_350_269_189_625_8; // 1/sqrt(3)

/// A volume integration point
#[derive(Debug, Clone)]
pub struct IntegrationPoint {
    /// Shape-function values, one per element node
    pub phi: Vec<f64>,
    /// Quadrature weight times the geometric Jacobian measure
    pub jxw: f64,
    /// Interpolated position in the frame of the supplied coordinates
    pub position: Point3,
}

/// A side (boundary) integration point
#[derive(Debug, Clone)]
pub struct SidePoint {
    /// Shape-function values over the full element connectivity
    pub phi: Vec<f64>,
    /// Quadrature weight times the side measure
    pub jxw: f64,
    /// Interpolated position in the frame of the supplied coordinates
    pub position: Point3,
    /// Outward unit normal of the side, in the frame of the coordinates
    pub normal: Vector3<f64>,
}

/// Natural coordinates of the Hex8 nodes
const HEX8_XI: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Natural coordinates of the Quad4 nodes
const QUAD4_XI: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Bar2 shape functions at natural coordinate ξ
pub fn bar2_phi(xi: f64) -> [f64; 2] {
    [0.5 * (1.0 - xi), 0.5 * (1.0 + xi)]
}

/// Quad4 bilinear shape functions at (ξ, η)
pub fn quad4_phi(xi: f64, eta: f64) -> [f64; 4] {
    let mut n = [0.0; 4];
    for (i, nat) in QUAD4_XI.iter().enumerate() {
        n[i] = 0.25 * (1.0 + nat[0] * xi) * (1.0 + nat[1] * eta);
    }
    n
}

/// Quad4 shape-function derivatives, `[dN/dξ, dN/dη]` per node
pub fn quad4_dphi(xi: f64, eta: f64) -> [[f64; 4]; 2] {
    let mut d = [[0.0; 4]; 2];
    for (i, nat) in QUAD4_XI.iter().enumerate() {
        d[0][i] = 0.25 * nat[0] * (1.0 + nat[1] * eta);
        d[1][i] = 0.25 * nat[1] * (1.0 + nat[0] * xi);
    }
    d
}

/// Hex8 trilinear shape functions at (ξ, η, ζ)
pub fn hex8_phi(xi: f64, eta: f64, zeta: f64) -> [f64; 8] {
    let mut n = [0.0; 8];
    for (i, nat) in HEX8_XI.iter().enumerate() {
        n[i] = 0.125 * (1.0 + nat[0] * xi) * (1.0 + nat[1] * eta) * (1.0 + nat[2] * zeta);
    }
    n
}

/// Hex8 shape-function derivatives, `[dN/dξ, dN/dη, dN/dζ]` per node
pub fn hex8_dphi(xi: f64, eta: f64, zeta: f64) -> [[f64; 8]; 3] {
    let mut d = [[0.0; 8]; 3];
    for (i, nat) in HEX8_XI.iter().enumerate() {
        d[0][i] = 0.125 * nat[0] * (1.0 + nat[1] * eta) * (1.0 + nat[2] * zeta);
        d[1][i] = 0.125 * nat[1] * (1.0 + nat[0] * xi) * (1.0 + nat[2] * zeta);
        d[2][i] = 0.125 * nat[2] * (1.0 + nat[0] * xi) * (1.0 + nat[1] * eta);
    }
    d
}

/// Geometric Jacobian of a Hex8 at a natural point
pub fn hex8_jacobian(coords: &[Point3], xi: f64, eta: f64, zeta: f64) -> Matrix3<f64> {
    let d = hex8_dphi(xi, eta, zeta);
    let mut j = Matrix3::zeros();
    for i in 0..8 {
        for row in 0..3 {
            j[(row, 0)] += d[row][i] * coords[i].x;
            j[(row, 1)] += d[row][i] * coords[i].y;
            j[(row, 2)] += d[row][i] * coords[i].z;
        }
    }
    j
}

fn interpolate(phi: &[f64], coords: &[Point3]) -> Point3 {
    let mut p = Point3::zeros();
    for (n, c) in phi.iter().zip(coords) {
        p += c * *n;
    }
    p
}

fn centroid(coords: &[Point3]) -> Point3 {
    let mut c = Point3::zeros();
    for p in coords {
        c += p;
    }
    c / coords.len() as f64
}

/// Volume integration points of an element
///
/// `coords` may be given in any frame; positions and measures come out in
/// the same frame (the measure is rotation-invariant).
pub fn volume_points(
    element: i32,
    shape: ElemShape,
    coords: &[Point3],
) -> Result<Vec<IntegrationPoint>, AssemblyError> {
    let mut points = Vec::new();
    match shape {
        ElemShape::Bar2 => {
            let tangent = (coords[1] - coords[0]) * 0.5;
            for &xi in &[-GP, GP] {
                let phi = bar2_phi(xi);
                points.push(IntegrationPoint {
                    phi: phi.to_vec(),
                    jxw: tangent.norm(),
                    position: interpolate(&phi, coords),
                });
            }
        }
        ElemShape::Quad4 => {
            for &xi in &[-GP, GP] {
                for &eta in &[-GP, GP] {
                    let phi = quad4_phi(xi, eta);
                    let d = quad4_dphi(xi, eta);
                    let mut t1 = Vector3::zeros();
                    let mut t2 = Vector3::zeros();
                    for i in 0..4 {
                        t1 += coords[i] * d[0][i];
                        t2 += coords[i] * d[1][i];
                    }
                    let measure = t1.cross(&t2).norm();
                    if measure < 1e-14 {
                        return Err(AssemblyError::DegenerateGeometry {
                            element,
                            detail: "zero surface measure".to_string(),
                        });
                    }
                    points.push(IntegrationPoint {
                        phi: phi.to_vec(),
                        jxw: measure,
                        position: interpolate(&phi, coords),
                    });
                }
            }
        }
        ElemShape::Hex8 => {
            for &xi in &[-GP, GP] {
                for &eta in &[-GP, GP] {
                    for &zeta in &[-GP, GP] {
                        let phi = hex8_phi(xi, eta, zeta);
                        let det = hex8_jacobian(coords, xi, eta, zeta).determinant();
                        if det <= 0.0 {
                            return Err(AssemblyError::DegenerateGeometry {
                                element,
                                detail: format!("non-positive Jacobian determinant {det}"),
                            });
                        }
                        points.push(IntegrationPoint {
                            phi: phi.to_vec(),
                            jxw: det,
                            position: interpolate(&phi, coords),
                        });
                    }
                }
            }
        }
    }
    Ok(points)
}

/// Side integration points of an element, with outward normals
///
/// `coords` are the element's node coordinates in the frame the caller wants
/// the normals expressed in (the local frame for 1D/2D elements). For Quad4
/// edges the coordinates are assumed to lie in the local z = const plane.
pub fn side_points(
    element: i32,
    shape: ElemShape,
    coords: &[Point3],
    side: usize,
) -> Result<Vec<SidePoint>, AssemblyError> {
    let side_nodes = shape.side_nodes(side);
    let center = centroid(coords);
    let mut points = Vec::new();

    match shape {
        ElemShape::Bar2 => {
            // A bar side is a single vertex with unit measure
            let i = side_nodes[0];
            let direction = coords[i] - center;
            let norm = direction.norm();
            if norm < 1e-14 {
                return Err(AssemblyError::DegenerateGeometry {
                    element,
                    detail: "zero-length bar".to_string(),
                });
            }
            let mut phi = vec![0.0; 2];
            phi[i] = 1.0;
            points.push(SidePoint {
                phi,
                jxw: 1.0,
                position: coords[i],
                normal: direction / norm,
            });
        }
        ElemShape::Quad4 => {
            let (a, b) = (side_nodes[0], side_nodes[1]);
            let tangent = (coords[b] - coords[a]) * 0.5;
            let plane_normal = Vector3::new(0.0, 0.0, 1.0);
            let mut normal = tangent.cross(&plane_normal);
            let norm = normal.norm();
            if norm < 1e-14 {
                return Err(AssemblyError::DegenerateGeometry {
                    element,
                    detail: "degenerate edge".to_string(),
                });
            }
            normal /= norm;
            // orient away from the element centroid
            let mid = (coords[a] + coords[b]) * 0.5;
            if normal.dot(&(mid - center)) < 0.0 {
                normal = -normal;
            }
            for &xi in &[-GP, GP] {
                let edge_phi = bar2_phi(xi);
                let mut phi = vec![0.0; 4];
                phi[a] = edge_phi[0];
                phi[b] = edge_phi[1];
                points.push(SidePoint {
                    phi: phi.clone(),
                    jxw: tangent.norm(),
                    position: interpolate(&phi, coords),
                    normal,
                });
            }
        }
        ElemShape::Hex8 => {
            let face: Vec<Point3> = side_nodes.iter().map(|&i| coords[i]).collect();
            for &xi in &[-GP, GP] {
                for &eta in &[-GP, GP] {
                    let face_phi = quad4_phi(xi, eta);
                    let d = quad4_dphi(xi, eta);
                    let mut t1 = Vector3::zeros();
                    let mut t2 = Vector3::zeros();
                    for i in 0..4 {
                        t1 += face[i] * d[0][i];
                        t2 += face[i] * d[1][i];
                    }
                    let area_vec = t1.cross(&t2);
                    let measure = area_vec.norm();
                    if measure < 1e-14 {
                        return Err(AssemblyError::DegenerateGeometry {
                            element,
                            detail: "degenerate face".to_string(),
                        });
                    }
                    let mut normal = area_vec / measure;
                    let mut phi = vec![0.0; 8];
                    for (k, &i) in side_nodes.iter().enumerate() {
                        phi[i] = face_phi[k];
                    }
                    let position = interpolate(&phi, coords);
                    if normal.dot(&(position - center)) < 0.0 {
                        normal = -normal;
                    }
                    points.push(SidePoint {
                        phi,
                        jxw: measure,
                        position,
                        normal,
                    });
                }
            }
        }
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_hex_coords() -> Vec<Point3> {
        HEX8_XI
            .iter()
            .map(|n| Point3::new(0.5 * (n[0] + 1.0), 0.5 * (n[1] + 1.0), 0.5 * (n[2] + 1.0)))
            .collect()
    }

    #[test]
    fn hex8_partition_of_unity() {
        for &(xi, eta, zeta) in &[(0.0, 0.0, 0.0), (0.3, -0.7, 0.2), (-1.0, 1.0, 1.0)] {
            let n = hex8_phi(xi, eta, zeta);
            let sum: f64 = n.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn unit_cube_volume() {
        let coords = unit_hex_coords();
        let points = volume_points(1, ElemShape::Hex8, &coords).unwrap();
        assert_eq!(points.len(), 8);
        let vol: f64 = points.iter().map(|p| p.jxw).sum();
        assert!((vol - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bar_length_from_jxw() {
        let coords = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 3.0, 4.0)];
        let points = volume_points(1, ElemShape::Bar2, &coords).unwrap();
        let len: f64 = points.iter().map(|p| p.jxw).sum();
        assert!((len - 5.0).abs() < 1e-12);
    }

    #[test]
    fn quad_area_from_jxw() {
        let coords = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let points = volume_points(1, ElemShape::Quad4, &coords).unwrap();
        let area: f64 = points.iter().map(|p| p.jxw).sum();
        assert!((area - 2.0).abs() < 1e-12);
    }

    #[test]
    fn hex_face_normals_point_outward() {
        let coords = unit_hex_coords();
        let center = Point3::new(0.5, 0.5, 0.5);
        for side in 0..6 {
            let points = side_points(1, ElemShape::Hex8, &coords, side).unwrap();
            assert_eq!(points.len(), 4);
            let area: f64 = points.iter().map(|p| p.jxw).sum();
            assert!((area - 1.0).abs() < 1e-12);
            for p in &points {
                assert!(p.normal.dot(&(p.position - center)) > 0.0);
                assert!((p.normal.norm() - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn quad_edge_normals_are_in_plane_and_outward() {
        let coords = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let expected = [
            Vector3::new(0.0, -1.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ];
        for side in 0..4 {
            let points = side_points(1, ElemShape::Quad4, &coords, side).unwrap();
            for p in &points {
                assert!((p.normal - expected[side]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn bar_vertex_sides() {
        let coords = [Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let left = side_points(1, ElemShape::Bar2, &coords, 0).unwrap();
        assert_eq!(left.len(), 1);
        assert!((left[0].normal - Vector3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
        assert_eq!(left[0].jxw, 1.0);
        assert_eq!(left[0].phi, vec![1.0, 0.0]);

        let right = side_points(1, ElemShape::Bar2, &coords, 1).unwrap();
        assert!((right[0].normal - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn inverted_hex_is_fatal() {
        let mut coords = unit_hex_coords();
        coords.swap(0, 1);
        coords.swap(4, 5);
        assert!(volume_points(1, ElemShape::Hex8, &coords).is_err());
    }
}
