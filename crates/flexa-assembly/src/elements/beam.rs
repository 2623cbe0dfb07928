//! Local-frame matrices for the 2-node beam.
//!
//! Euler-Bernoulli bending in two planes, axial and torsional stiffness, and
//! the consistent axial-force geometric (stress-stiffening) term. All
//! matrices use the element-local DOF order
//! `[ux uy uz tx ty tz | ux uy uz tx ty tz]` with x along the beam axis.

use flexa_model::{BeamSection, Material, ModelError};
use nalgebra::{DMatrix, DVector};

/// Bending-plane DOF quadruples `[w1, t1, w2, t2]` and the sign that
/// conjugates the rotation columns (moment-curvature convention differs
/// between the xy and xz planes)
const PLANE_XY: ([usize; 4], f64) = ([1, 5, 7, 11], 1.0);
const PLANE_XZ: ([usize; 4], f64) = ([2, 4, 8, 10], -1.0);

fn scatter_plane(k: &mut DMatrix<f64>, dofs: [usize; 4], sign: f64, block: [[f64; 4]; 4]) {
    // rotation DOFs are entries 1 and 3 of the quadruple
    let s = [1.0, sign, 1.0, sign];
    for i in 0..4 {
        for j in 0..4 {
            k[(dofs[i], dofs[j])] += s[i] * s[j] * block[i][j];
        }
    }
}

/// 12×12 elastic stiffness of the beam in its local frame
pub fn local_stiffness(
    section: &BeamSection,
    material: &Material,
    l: f64,
) -> Result<DMatrix<f64>, ModelError> {
    let e = material.require_elastic_modulus()?;
    let g = material.require_shear_modulus()?;
    let a = section.area;
    let j = section.torsion_constant;

    let mut k = DMatrix::zeros(12, 12);

    // axial (DOFs 0, 6)
    let k_axial = e * a / l;
    k[(0, 0)] = k_axial;
    k[(0, 6)] = -k_axial;
    k[(6, 0)] = -k_axial;
    k[(6, 6)] = k_axial;

    // torsion (DOFs 3, 9)
    let k_torsion = g * j / l;
    k[(3, 3)] = k_torsion;
    k[(3, 9)] = -k_torsion;
    k[(9, 3)] = -k_torsion;
    k[(9, 9)] = k_torsion;

    // bending, one plane at a time
    for (dofs, sign, inertia) in [
        (PLANE_XY.0, PLANE_XY.1, section.izz),
        (PLANE_XZ.0, PLANE_XZ.1, section.iyy),
    ] {
        let ei = e * inertia;
        let block = [
            [12.0 * ei / l.powi(3), 6.0 * ei / l.powi(2), -12.0 * ei / l.powi(3), 6.0 * ei / l.powi(2)],
            [6.0 * ei / l.powi(2), 4.0 * ei / l, -6.0 * ei / l.powi(2), 2.0 * ei / l],
            [-12.0 * ei / l.powi(3), -6.0 * ei / l.powi(2), 12.0 * ei / l.powi(3), -6.0 * ei / l.powi(2)],
            [6.0 * ei / l.powi(2), 2.0 * ei / l, -6.0 * ei / l.powi(2), 4.0 * ei / l],
        ];
        scatter_plane(&mut k, dofs, sign, block);
    }

    Ok(k)
}

/// 12×12 geometric stiffness per unit axial force
///
/// Multiply by the current axial force `N` to obtain the stress-stiffening
/// contribution; the consistent form couples transverse deflection and
/// rotation in both bending planes.
pub fn geometric_unit(l: f64) -> DMatrix<f64> {
    let mut g = DMatrix::zeros(12, 12);
    let c = 1.0 / (30.0 * l);
    let block = [
        [36.0 * c, 3.0 * l * c, -36.0 * c, 3.0 * l * c],
        [3.0 * l * c, 4.0 * l * l * c, -3.0 * l * c, -l * l * c],
        [-36.0 * c, -3.0 * l * c, 36.0 * c, -3.0 * l * c],
        [3.0 * l * c, -l * l * c, -3.0 * l * c, 4.0 * l * l * c],
    ];
    for (dofs, sign) in [PLANE_XY, PLANE_XZ] {
        scatter_plane(&mut g, dofs, sign, block);
    }
    g
}

/// Gradient of the axial force with respect to the local DOF vector
///
/// `N(u) = EA/L · (u_ax2 − u_ax1)`, so the gradient has two nonzero entries
/// at the axial DOFs.
pub fn axial_force_gradient(
    section: &BeamSection,
    material: &Material,
    l: f64,
) -> Result<DVector<f64>, ModelError> {
    let e = material.require_elastic_modulus()?;
    let ea_over_l = e * section.area / l;
    let mut g = DVector::zeros(12);
    g[0] = -ea_over_l;
    g[6] = ea_over_l;
    Ok(g)
}

/// Equivalent nodal load of a uniform temperature rise above reference
pub fn thermal_load(
    section: &BeamSection,
    material: &Material,
    delta_t: f64,
) -> Result<DVector<f64>, ModelError> {
    let e = material.require_elastic_modulus()?;
    let alpha = material.require_thermal_expansion()?;
    let axial = e * section.area * alpha * delta_t;
    let mut f = DVector::zeros(12);
    f[0] = -axial;
    f[6] = axial;
    Ok(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steel() -> Material {
        Material {
            name: "STEEL".to_string(),
            elastic_modulus: Some(200e9),
            poissons_ratio: Some(0.3),
            density: Some(7850.0),
            thermal_expansion: Some(1.2e-5),
        }
    }

    #[test]
    fn axial_stiffness_entries() {
        let section = BeamSection::custom(0.01, 1e-6, 1e-6, 1e-6);
        let k = local_stiffness(&section, &steel(), 1.0).unwrap();
        let expected = 200e9 * 0.01;
        assert!((k[(0, 0)] - expected).abs() / expected < 1e-12);
        assert!((k[(0, 6)] + expected).abs() / expected < 1e-12);
    }

    #[test]
    fn stiffness_is_symmetric() {
        let section = BeamSection::custom(0.01, 2e-6, 3e-6, 4e-6);
        let k = local_stiffness(&section, &steel(), 2.5).unwrap();
        for i in 0..12 {
            for j in 0..12 {
                assert!((k[(i, j)] - k[(j, i)]).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn rigid_body_translation_produces_no_force() {
        let section = BeamSection::custom(0.01, 2e-6, 3e-6, 4e-6);
        let k = local_stiffness(&section, &steel(), 2.0).unwrap();
        // uniform translation in y
        let mut u = DVector::zeros(12);
        u[1] = 1.0;
        u[7] = 1.0;
        let f = &k * &u;
        assert!(f.amax() < 1e-3);
    }

    #[test]
    fn geometric_stiffness_symmetric_and_annihilates_translation() {
        let g = geometric_unit(2.0);
        for i in 0..12 {
            for j in 0..12 {
                assert!((g[(i, j)] - g[(j, i)]).abs() < 1e-12);
            }
        }
        let mut u = DVector::zeros(12);
        u[2] = 1.0;
        u[8] = 1.0;
        assert!((&g * &u).amax() < 1e-12);
    }

    #[test]
    fn thermal_load_self_equilibrates_free_expansion() {
        let section = BeamSection::custom(0.01, 1e-6, 1e-6, 1e-6);
        let material = steel();
        let l = 2.0;
        let dt = 50.0;
        let k = local_stiffness(&section, &material, l).unwrap();
        let f = thermal_load(&section, &material, dt).unwrap();

        // free expansion displacement: node 2 moves by alpha*dt*l
        let mut u = DVector::zeros(12);
        u[6] = 1.2e-5 * dt * l;
        let residual = &k * &u - &f;
        assert!(residual.amax() < 1e-6);
    }
}
