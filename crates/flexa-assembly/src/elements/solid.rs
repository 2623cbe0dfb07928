//! Local matrices for the 8-node hexahedral solid.
//!
//! Trilinear isoparametric formulation, 2×2×2 Gauss quadrature. Solids share
//! the global frame; the matrices are nevertheless "local" in the sense of
//! the element DOF layout `[ux uy uz tx ty tz]` per node, with the rotation
//! rows left zero (a solid carries no rotational stiffness; constraining
//! those DOFs is the essential-condition mechanism's job).

use crate::quadrature::{hex8_dphi, hex8_jacobian};
use flexa_model::Point3;
use nalgebra::{DMatrix, DVector, Vector3};

const GP: f64 = 0.577_350_269_189_625_8;

/// 6×6 isotropic elasticity matrix (Voigt order xx, yy, zz, xy, yz, zx)
fn elasticity(e: f64, nu: f64) -> DMatrix<f64> {
    let factor = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
    let diag = (1.0 - nu) * factor;
    let off = nu * factor;
    let shear = (1.0 - 2.0 * nu) / 2.0 * factor;

    let mut d = DMatrix::zeros(6, 6);
    for i in 0..3 {
        for j in 0..3 {
            d[(i, j)] = if i == j { diag } else { off };
        }
    }
    for i in 3..6 {
        d[(i, i)] = shear;
    }
    d
}

/// Strain-displacement matrix over the 48-DOF layout at a natural point
///
/// Returns the B matrix and the Jacobian determinant, or `None` for
/// non-positive determinants.
fn strain_displacement(
    coords: &[Point3],
    xi: f64,
    eta: f64,
    zeta: f64,
) -> Option<(DMatrix<f64>, f64)> {
    let d_nat = hex8_dphi(xi, eta, zeta);
    let j = hex8_jacobian(coords, xi, eta, zeta);
    let det = j.determinant();
    if det <= 0.0 {
        return None;
    }
    let j_inv = j.try_inverse()?;

    let mut b = DMatrix::zeros(6, 48);
    for i in 0..8 {
        let d_global = j_inv * Vector3::new(d_nat[0][i], d_nat[1][i], d_nat[2][i]);
        let (dx, dy, dz) = (d_global[0], d_global[1], d_global[2]);
        let col = 6 * i;

        b[(0, col)] = dx;
        b[(1, col + 1)] = dy;
        b[(2, col + 2)] = dz;

        b[(3, col)] = dy;
        b[(3, col + 1)] = dx;

        b[(4, col + 1)] = dz;
        b[(4, col + 2)] = dy;

        b[(5, col + 2)] = dx;
        b[(5, col)] = dz;
    }
    Some((b, det))
}

/// 48×48 elastic stiffness `∫ Bᵗ·D·B dV`
pub fn local_stiffness(e: f64, nu: f64, coords: &[Point3]) -> Option<DMatrix<f64>> {
    let d = elasticity(e, nu);
    let mut k = DMatrix::zeros(48, 48);

    for &xi in &[-GP, GP] {
        for &eta in &[-GP, GP] {
            for &zeta in &[-GP, GP] {
                let (b, det) = strain_displacement(coords, xi, eta, zeta)?;
                k += (b.transpose() * &d * &b) * det;
            }
        }
    }
    Some(k)
}

/// Equivalent nodal load of a uniform temperature rise above reference
pub fn thermal_load(
    e: f64,
    nu: f64,
    alpha: f64,
    delta_t: f64,
    coords: &[Point3],
) -> Option<DVector<f64>> {
    let d = elasticity(e, nu);
    let eth = alpha * delta_t;
    let eps_th = DVector::from_vec(vec![eth, eth, eth, 0.0, 0.0, 0.0]);
    let sigma_th = &d * eps_th;

    let mut f = DVector::zeros(48);
    for &xi in &[-GP, GP] {
        for &eta in &[-GP, GP] {
            for &zeta in &[-GP, GP] {
                let (b, det) = strain_displacement(coords, xi, eta, zeta)?;
                f += (b.transpose() * &sigma_th) * det;
            }
        }
    }
    Some(f)
}
