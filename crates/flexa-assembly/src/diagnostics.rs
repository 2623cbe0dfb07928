//! Verification-only numerical Jacobian check.
//!
//! Perturbs the element solution component-wise, builds a central-difference
//! Jacobian from the internal residual, and compares it against the analytic
//! one. Discrepancies are reported on stderr for developer inspection; the
//! check never runs on the production evaluation path and never alters
//! control flow.

use crate::elements::StructuralElement;
use crate::error::AssemblyError;
use nalgebra::{DMatrix, DVector};

/// Compare the analytic element Jacobian against central differences
///
/// `x` is the element-gathered global-frame solution. Returns the largest
/// absolute discrepancy; entries beyond `tol` (relative to the analytic
/// entry's magnitude, floored at 1) are printed.
pub fn check_element_numerical_jacobian(
    element: &mut StructuralElement,
    x: &DVector<f64>,
    delta: f64,
    tol: f64,
) -> Result<f64, AssemblyError> {
    let n = element.n_dofs();

    element.set_solution(x);
    let mut f0 = DVector::zeros(n);
    let mut analytic = DMatrix::zeros(n, n);
    element.internal_residual(true, &mut f0, &mut analytic)?;

    let mut numerical = DMatrix::zeros(n, n);
    let mut dummy = DMatrix::zeros(n, n);
    for j in 0..n {
        let mut xp = x.clone();
        xp[j] += delta;
        element.set_solution(&xp);
        let mut fp = DVector::zeros(n);
        element.internal_residual(false, &mut fp, &mut dummy)?;

        let mut xm = x.clone();
        xm[j] -= delta;
        element.set_solution(&xm);
        let mut fm = DVector::zeros(n);
        element.internal_residual(false, &mut fm, &mut dummy)?;

        for i in 0..n {
            numerical[(i, j)] = (fp[i] - fm[i]) / (2.0 * delta);
        }
    }
    // restore the cached state
    element.set_solution(x);

    let mut max_diff = 0.0f64;
    for i in 0..n {
        for j in 0..n {
            let diff = (analytic[(i, j)] - numerical[(i, j)]).abs();
            max_diff = max_diff.max(diff);
            let scale = analytic[(i, j)].abs().max(1.0);
            if diff > tol * scale {
                eprintln!(
                    "element {}: Jacobian mismatch at ({}, {}): analytic {:e}, numerical {:e}",
                    element.id(),
                    i,
                    j,
                    analytic[(i, j)],
                    numerical[(i, j)]
                );
            }
        }
    }

    Ok(max_diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexa_model::{BeamSection, Element, ElemShape, Material, Mesh, Node, PropertyCard, Section};
    use std::sync::Arc;

    #[test]
    fn analytic_jacobian_passes_the_check() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_node(Node::new(2, 1.0, 0.5, 0.0));
        let elem = Element::new(1, ElemShape::Bar2, vec![1, 2], 1);
        mesh.add_element(elem.clone()).unwrap();

        let material = Material {
            name: "AL".to_string(),
            elastic_modulus: Some(70e9),
            poissons_ratio: Some(0.33),
            density: Some(2700.0),
            thermal_expansion: None,
        };
        let card = Arc::new(PropertyCard::new(
            material,
            Section::Beam(BeamSection::custom(0.002, 1e-8, 2e-8, 1e-8)),
        ));
        let mut se = StructuralElement::new(&elem, &mesh, card).unwrap();

        let mut x = DVector::zeros(12);
        for i in 0..12 {
            x[i] = 1e-4 * ((i % 5) as f64 - 2.0);
        }

        let max_diff = check_element_numerical_jacobian(&mut se, &x, 1e-7, 1e-4).unwrap();
        // internal residual is at most quadratic in x, so the central
        // difference is exact up to roundoff
        assert!(max_diff < 1.0);
    }
}
