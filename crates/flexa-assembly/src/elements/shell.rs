//! Local-frame matrices for the 4-node shell.
//!
//! Plane-stress membrane action, Mindlin plate bending with transverse
//! shear, and a drilling penalty on the rotation about the surface normal.
//! All matrices are built in the element's local plane (coordinates with
//! z = const) over the 24-DOF layout `[ux uy uz tx ty tz]` per node.

use crate::quadrature::{quad4_dphi, quad4_phi};
use flexa_model::{Point3, ShellSection};
use nalgebra::{DMatrix, DVector, Matrix2};

const SHEAR_CORRECTION: f64 = 5.0 / 6.0;
const DRILLING_FACTOR: f64 = 1.0e-3;
const GP: f64 = 0.577_350_269_189_625_8;

/// Plane-stress constitutive matrix (without thickness)
fn plane_stress(e: f64, nu: f64) -> DMatrix<f64> {
    let c = e / (1.0 - nu * nu);
    DMatrix::from_row_slice(
        3,
        3,
        &[c, c * nu, 0.0, c * nu, c, 0.0, 0.0, 0.0, c * (1.0 - nu) / 2.0],
    )
}

/// In-plane shape-function gradients and area measure at a natural point
fn plane_gradients(
    coords: &[Point3],
    xi: f64,
    eta: f64,
) -> Option<([f64; 4], [f64; 4], f64)> {
    let d = quad4_dphi(xi, eta);
    let mut j = Matrix2::zeros();
    for i in 0..4 {
        j[(0, 0)] += d[0][i] * coords[i].x;
        j[(0, 1)] += d[0][i] * coords[i].y;
        j[(1, 0)] += d[1][i] * coords[i].x;
        j[(1, 1)] += d[1][i] * coords[i].y;
    }
    let det = j.determinant();
    if det <= 0.0 {
        return None;
    }
    let j_inv = j.try_inverse()?;

    let mut dx = [0.0; 4];
    let mut dy = [0.0; 4];
    for i in 0..4 {
        dx[i] = j_inv[(0, 0)] * d[0][i] + j_inv[(0, 1)] * d[1][i];
        dy[i] = j_inv[(1, 0)] * d[0][i] + j_inv[(1, 1)] * d[1][i];
    }
    Some((dx, dy, det))
}

/// 24×24 elastic stiffness of the shell in its local frame
///
/// Returns `None` on a non-positive in-plane Jacobian; the caller maps that
/// to a degenerate-geometry error with element context.
pub fn local_stiffness(
    section: &ShellSection,
    e: f64,
    nu: f64,
    local_coords: &[Point3],
) -> Option<DMatrix<f64>> {
    let t = section.thickness;
    let d_membrane = plane_stress(e, nu) * t;
    let d_bending = plane_stress(e, nu) * (t.powi(3) / 12.0);
    let shear_modulus = e / (2.0 * (1.0 + nu));
    let d_shear = SHEAR_CORRECTION * shear_modulus * t;

    let mut k = DMatrix::zeros(24, 24);
    let mut area = 0.0;

    for &xi in &[-GP, GP] {
        for &eta in &[-GP, GP] {
            let phi = quad4_phi(xi, eta);
            let (dx, dy, jxw) = plane_gradients(local_coords, xi, eta)?;
            area += jxw;

            // membrane: eps = [du/dx, dv/dy, du/dy + dv/dx]
            let mut b_m = DMatrix::zeros(3, 24);
            // bending: kappa = [dbx/dx, dby/dy, dbx/dy + dby/dx]
            // with bx = ty (rotation about local y), by = -tx
            let mut b_b = DMatrix::zeros(3, 24);
            // transverse shear: gamma = [dw/dx + bx, dw/dy + by]
            let mut b_s = DMatrix::zeros(2, 24);

            for i in 0..4 {
                let (ux, uy, uz, tx, ty) =
                    (6 * i, 6 * i + 1, 6 * i + 2, 6 * i + 3, 6 * i + 4);

                b_m[(0, ux)] = dx[i];
                b_m[(1, uy)] = dy[i];
                b_m[(2, ux)] = dy[i];
                b_m[(2, uy)] = dx[i];

                b_b[(0, ty)] = dx[i];
                b_b[(1, tx)] = -dy[i];
                b_b[(2, ty)] = dy[i];
                b_b[(2, tx)] = -dx[i];

                b_s[(0, uz)] = dx[i];
                b_s[(0, ty)] = phi[i];
                b_s[(1, uz)] = dy[i];
                b_s[(1, tx)] = -phi[i];
            }

            k += (b_m.transpose() * &d_membrane * &b_m) * jxw;
            k += (b_b.transpose() * &d_bending * &b_b) * jxw;
            k += (b_s.transpose() * &b_s) * (d_shear * jxw);
        }
    }

    // drilling penalty keeps the rotation about the normal from being
    // unconstrained in the local stiffness
    let drill = DRILLING_FACTOR * shear_modulus * t * area / 4.0;
    for i in 0..4 {
        k[(6 * i + 5, 6 * i + 5)] += drill;
    }

    Some(k)
}

/// Equivalent membrane load of a uniform temperature rise above reference
pub fn thermal_load(
    section: &ShellSection,
    e: f64,
    nu: f64,
    alpha: f64,
    delta_t: f64,
    local_coords: &[Point3],
) -> Option<DVector<f64>> {
    let t = section.thickness;
    let d_membrane = plane_stress(e, nu) * t;
    let eps_th = DVector::from_vec(vec![alpha * delta_t, alpha * delta_t, 0.0]);
    let sigma_th = &d_membrane * eps_th;

    let mut f = DVector::zeros(24);
    for &xi in &[-GP, GP] {
        for &eta in &[-GP, GP] {
            let (dx, dy, jxw) = plane_gradients(local_coords, xi, eta)?;
            for i in 0..4 {
                let (ux, uy) = (6 * i, 6 * i + 1);
                f[ux] += (dx[i] * sigma_th[0] + dy[i] * sigma_th[2]) * jxw;
                f[uy] += (dy[i] * sigma_th[1] + dx[i] * sigma_th[2]) * jxw;
            }
        }
    }
    Some(f)
}
