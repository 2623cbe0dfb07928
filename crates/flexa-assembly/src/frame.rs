//! Element-local coordinate frames and block DOF transformations.
//!
//! Every 1D and 2D element carries an orthonormal local basis; residuals and
//! Jacobians are computed in that frame and transformed to the global frame
//! before scatter. The block transformation replicates the element's 3×3
//! rotation once per node for the translational DOF group and once for the
//! rotational group (6 DOF/node). 3D solids share the global frame and both
//! transform directions are genuine no-ops.

use crate::error::AssemblyError;
use crate::scalar::LoadScalar;
use flexa_model::Point3;
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

const PARALLEL_TOL: f64 = 1e-12;

/// Orthonormal local basis of an element
///
/// The rotation's columns are the local axes expressed in global
/// coordinates, so `v_global = R · v_local` and `v_local = Rᵀ · v_global`.
#[derive(Debug, Clone)]
pub struct LocalFrame {
    rotation: Matrix3<f64>,
    identity: bool,
}

impl LocalFrame {
    /// Global frame (3D solids): transforms are no-ops
    pub fn global_frame() -> Self {
        Self {
            rotation: Matrix3::identity(),
            identity: true,
        }
    }

    /// Local frame for a bar: x along the axis, y from the section's
    /// orientation vector or a reference-vector fallback
    pub fn for_bar(
        element: i32,
        p0: &Point3,
        p1: &Point3,
        y_orientation: Option<[f64; 3]>,
    ) -> Result<Self, AssemblyError> {
        let axis = p1 - p0;
        let length = axis.norm();
        if length < PARALLEL_TOL {
            return Err(AssemblyError::DegenerateGeometry {
                element,
                detail: "zero-length bar".to_string(),
            });
        }
        let ex = axis / length;

        let ey = match y_orientation {
            Some(y) => {
                let y = Vector3::new(y[0], y[1], y[2]);
                let in_plane = y - ex * y.dot(&ex);
                if in_plane.norm() < PARALLEL_TOL {
                    return Err(AssemblyError::DegenerateGeometry {
                        element,
                        detail: "section y-orientation parallel to bar axis".to_string(),
                    });
                }
                in_plane.normalize()
            }
            None => {
                // Reference vector not parallel to the axis
                let reference = if ex.x.abs() < 0.9 {
                    Vector3::new(1.0, 0.0, 0.0)
                } else {
                    Vector3::new(0.0, 1.0, 0.0)
                };
                let ez = ex.cross(&reference).normalize();
                ez.cross(&ex)
            }
        };
        let ez = ex.cross(&ey);

        Ok(Self::from_axes(ex, ey, ez))
    }

    /// Local frame for a quadrilateral: z along the surface normal from the
    /// diagonal cross product, x along the first edge projected in-plane
    pub fn for_quad(element: i32, coords: &[Point3]) -> Result<Self, AssemblyError> {
        let diag1 = coords[2] - coords[0];
        let diag2 = coords[3] - coords[1];
        let normal = diag1.cross(&diag2);
        if normal.norm() < PARALLEL_TOL {
            return Err(AssemblyError::DegenerateGeometry {
                element,
                detail: "zero surface normal".to_string(),
            });
        }
        let ez = normal.normalize();

        let edge = coords[1] - coords[0];
        let in_plane = edge - ez * edge.dot(&ez);
        if in_plane.norm() < PARALLEL_TOL {
            return Err(AssemblyError::DegenerateGeometry {
                element,
                detail: "first edge parallel to surface normal".to_string(),
            });
        }
        let ex = in_plane.normalize();
        let ey = ez.cross(&ex);

        Ok(Self::from_axes(ex, ey, ez))
    }

    fn from_axes(ex: Vector3<f64>, ey: Vector3<f64>, ez: Vector3<f64>) -> Self {
        Self {
            rotation: Matrix3::from_columns(&[ex, ey, ez]),
            identity: false,
        }
    }

    /// True when the local frame coincides with the global frame
    pub fn is_identity(&self) -> bool {
        self.identity
    }

    /// The 3×3 rotation (columns are local axes in global coordinates)
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    /// Express a global position in local coordinates relative to an origin
    pub fn point_to_local(&self, origin: &Point3, p: &Point3) -> Point3 {
        if self.identity {
            return *p - *origin;
        }
        self.rotation.transpose() * (p - origin)
    }

    /// Express a local position in global coordinates relative to an origin
    pub fn point_to_global(&self, origin: &Point3, p: &Point3) -> Point3 {
        if self.identity {
            return *origin + *p;
        }
        origin + self.rotation * p
    }

    /// Transform a global nodal DOF vector (length 6n) to the local frame
    pub fn to_local(&self, v: &DVector<f64>) -> DVector<f64> {
        if self.identity {
            return v.clone();
        }
        let r = &self.rotation;
        let mut out = DVector::zeros(v.len());
        for block in 0..v.len() / 3 {
            let base = block * 3;
            for a in 0..3 {
                let mut acc = 0.0;
                for b in 0..3 {
                    acc += r[(b, a)] * v[base + b];
                }
                out[base + a] = acc;
            }
        }
        out
    }

    /// Transform a local nodal DOF vector (length 6n) to the global frame
    ///
    /// Generic over the load scalar so the complex small-disturbance
    /// residual shares this path.
    pub fn to_global_vector<S: LoadScalar>(&self, v: &DVector<S>) -> DVector<S> {
        if self.identity {
            return v.clone();
        }
        let r = &self.rotation;
        let mut out = DVector::from_element(v.len(), S::zero());
        for block in 0..v.len() / 3 {
            let base = block * 3;
            for a in 0..3 {
                let mut acc = S::zero();
                for b in 0..3 {
                    acc += v[base + b] * r[(a, b)];
                }
                out[base + a] = acc;
            }
        }
        out
    }

    /// Similarity-transform a local 6n×6n matrix to the global frame
    pub fn to_global_matrix(&self, m: &DMatrix<f64>) -> DMatrix<f64> {
        if self.identity {
            return m.clone();
        }
        let t = self.block_transform(m.nrows());
        &t * m * t.transpose()
    }

    /// Expanded block transformation: the rotation repeated along the
    /// diagonal, one 3×3 block per node per DOF group
    fn block_transform(&self, n: usize) -> DMatrix<f64> {
        let mut t = DMatrix::zeros(n, n);
        for block in 0..n / 3 {
            let base = block * 3;
            for i in 0..3 {
                for j in 0..3 {
                    t[(base + i, base + j)] = self.rotation[(i, j)];
                }
            }
        }
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skew_bar_frame() -> LocalFrame {
        LocalFrame::for_bar(
            1,
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 2.0, 3.0),
            None,
        )
        .unwrap()
    }

    #[test]
    fn bar_frame_is_orthonormal() {
        let frame = skew_bar_frame();
        let r = frame.rotation();
        let should_be_eye = r.transpose() * r;
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((should_be_eye[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn bar_x_axis_along_element() {
        let frame = skew_bar_frame();
        let ex = frame.rotation().column(0);
        let axis = Vector3::new(1.0, 2.0, 3.0).normalize();
        assert!((ex - axis).norm() < 1e-12);
    }

    #[test]
    fn zero_length_bar_is_fatal() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(LocalFrame::for_bar(7, &p, &p, None).is_err());
    }

    #[test]
    fn quad_normal_from_diagonals() {
        let coords = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let frame = LocalFrame::for_quad(1, &coords).unwrap();
        let ez = frame.rotation().column(2);
        assert!((ez - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-12);
    }

    #[test]
    fn roundtrip_recovers_vector() {
        let frame = skew_bar_frame();
        let v = DVector::from_vec(vec![
            1.0, -2.0, 3.0, 0.5, 0.0, -1.5, //
            2.0, 2.0, -4.0, 1.0, -1.0, 0.25,
        ]);
        let back: DVector<f64> = frame.to_global_vector(&frame.to_local(&v));
        assert!((&back - &v).norm() < 1e-12);
    }

    #[test]
    fn identity_frame_is_a_no_op() {
        let frame = LocalFrame::global_frame();
        let v = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(frame.to_local(&v), v);
        let g: DVector<f64> = frame.to_global_vector(&v);
        assert_eq!(g, v);

        let m = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(frame.to_global_matrix(&m), m);
    }

    #[test]
    fn matrix_similarity_transform_preserves_symmetry() {
        let frame = skew_bar_frame();
        let mut m = DMatrix::zeros(12, 12);
        for i in 0..12 {
            for j in 0..12 {
                let v = ((i * 12 + j) % 7) as f64;
                m[(i, j)] += v;
                m[(j, i)] += v;
            }
        }
        let g = frame.to_global_matrix(&m);
        for i in 0..12 {
            for j in 0..12 {
                assert!((g[(i, j)] - g[(j, i)]).abs() < 1e-9);
            }
        }
    }
}
