//! Boundary-load dispatch and the load residual handlers.
//!
//! The dispatchers walk an element's sides (or its single subdomain), look
//! up every condition registered for the matching ids, and route each one to
//! its typed handler. Handlers accumulate additively into one local-frame
//! buffer; the dispatcher applies the global transform once at the end.
//!
//! Both dispatchers return whether any handler actually computed a Jacobian
//! contribution, combined with the caller's request flag, so the assembly
//! driver knows whether the Jacobian buffer is fully populated. Pressure
//! loads only carry a Jacobian in the follower-force case, which is
//! unsupported: requesting a Jacobian with follower forces enabled fails
//! fast instead of silently returning an incomplete Jacobian.

use crate::elements::{beam, shell, solid, StructuralElement};
use crate::error::AssemblyError;
use crate::quadrature::side_points;
use crate::scalar::LoadScalar;
use flexa_model::{BcType, BoundaryCondition, LoadMap, ElemShape, Point3};
use nalgebra::{DVector, Vector3};

impl StructuralElement {
    /// Dispatch side-registered boundary loads into the residual
    ///
    /// Sides with no registered boundary id are skipped. `Dirichlet`
    /// conditions are a no-op at this layer; `Temperature` is a volume-only
    /// tag and is a fatal dispatch error here.
    pub fn side_external_residual<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        f: &mut DVector<S>,
        loads: &LoadMap,
    ) -> Result<bool, AssemblyError> {
        let mut calculate_jac = false;
        let mut local_f = DVector::from_element(self.n_dofs(), S::zero());

        for side in 0..self.shape().num_sides() {
            let ids = self.element().boundaries_on_side(side);
            if ids.is_empty() {
                continue;
            }
            for &id in ids {
                for bc in loads.matching(id) {
                    match bc.bc_type() {
                        BcType::SurfacePressure => {
                            calculate_jac |= self.surface_pressure_residual_on_side(
                                request_jacobian,
                                &mut local_f,
                                side,
                                bc,
                            )?;
                        }
                        BcType::SmallDisturbanceMotion => {
                            calculate_jac |= self.small_disturbance_pressure_residual_on_side(
                                request_jacobian,
                                &mut local_f,
                                side,
                                bc,
                            )?;
                        }
                        BcType::Dirichlet => {
                            // enforced by the constraint mechanism, not here
                        }
                        BcType::Temperature => {
                            return Err(AssemblyError::UnsupportedBc {
                                context: "side",
                                bc_type: "Temperature",
                            });
                        }
                    }
                }
            }
        }

        let global_f = self.frame().to_global_vector(&local_f);
        for i in 0..global_f.len() {
            f[i] += global_f[i];
        }
        Ok(request_jacobian && calculate_jac)
    }

    /// Dispatch subdomain-registered loads into the residual
    ///
    /// Looks up the element's single subdomain id. `Dirichlet` is a
    /// side-only tag and is a fatal dispatch error here.
    pub fn volume_external_residual<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        f: &mut DVector<S>,
        loads: &LoadMap,
    ) -> Result<bool, AssemblyError> {
        let mut calculate_jac = false;
        let mut local_f = DVector::from_element(self.n_dofs(), S::zero());

        for bc in loads.matching(self.element().subdomain) {
            match bc.bc_type() {
                BcType::SurfacePressure => {
                    calculate_jac |=
                        self.surface_pressure_residual(request_jacobian, &mut local_f, bc)?;
                }
                BcType::Temperature => {
                    calculate_jac |= self.thermal_residual(request_jacobian, &mut local_f, bc)?;
                }
                BcType::SmallDisturbanceMotion => {
                    calculate_jac |= self.small_disturbance_pressure_residual(
                        request_jacobian,
                        &mut local_f,
                        bc,
                    )?;
                }
                BcType::Dirichlet => {
                    return Err(AssemblyError::UnsupportedBc {
                        context: "volume",
                        bc_type: "Dirichlet",
                    });
                }
            }
        }

        let global_f = self.frame().to_global_vector(&local_f);
        for i in 0..global_f.len() {
            f[i] += global_f[i];
        }
        Ok(request_jacobian && calculate_jac)
    }

    fn check_follower(&self, request_jacobian: bool) -> Result<(), AssemblyError> {
        if request_jacobian && self.follower_forces {
            return Err(AssemblyError::FollowerForceJacobian {
                element: self.id(),
            });
        }
        Ok(())
    }

    /// Assumed load direction when the element itself is the boundary:
    /// the negative local z-axis for 2D, negative local y-axis for 1D
    fn assumed_normal(&self) -> Result<Vector3<f64>, AssemblyError> {
        let mut normal = Vector3::zeros();
        match self.shape().dim() {
            d @ (1 | 2) => normal[d] = -1.0,
            _ => {
                return Err(AssemblyError::InvalidLoad {
                    element: self.id(),
                    detail: "whole-boundary pressure applies to 1D/2D elements only"
                        .to_string(),
                });
            }
        }
        Ok(normal)
    }

    fn position_to_global(&self, local: &Point3) -> Point3 {
        self.frame().point_to_global(&self.global_coords()[0], local)
    }

    /// Surface pressure on an explicit element side, integrated with the
    /// side's outward normals
    pub fn surface_pressure_residual_on_side<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        local_f: &mut DVector<S>,
        side: usize,
        bc: &BoundaryCondition,
    ) -> Result<bool, AssemblyError> {
        self.check_follower(request_jacobian)?;
        let press_fn = bc.scalar("pressure")?;

        let points = side_points(self.id(), self.shape(), self.local_coords(), side)?;
        for p in &points {
            let pos = self.position_to_global(&p.position);
            let press = press_fn(&pos, self.time());

            for (i, &phi) in p.phi.iter().enumerate() {
                if phi == 0.0 {
                    continue;
                }
                for d in 0..3 {
                    local_f[6 * i + d] += S::from_real(press * p.normal[d] * phi * p.jxw);
                }
            }
        }

        Ok(request_jacobian && self.follower_forces)
    }

    /// Surface pressure over the whole element when the element itself is
    /// the boundary (shell surface, beam lateral face), using the assumed
    /// local normal direction
    pub fn surface_pressure_residual<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        local_f: &mut DVector<S>,
        bc: &BoundaryCondition,
    ) -> Result<bool, AssemblyError> {
        self.check_follower(request_jacobian)?;
        let normal = self.assumed_normal()?;
        let press_fn = bc.scalar("pressure")?;

        for p in self.integration_points() {
            let press = press_fn(&p.position, self.time());
            for (i, &phi) in p.phi.iter().enumerate() {
                for d in 0..3 {
                    local_f[6 * i + d] += S::from_real(press * normal[d] * phi * p.jxw);
                }
            }
        }

        Ok(request_jacobian && self.follower_forces)
    }

    /// Small-disturbance pressure on an explicit side:
    /// `force = press·δnormal + δpress·normal`
    ///
    /// The steady pressure is always real; the perturbation pressure and
    /// normal change take the numeric type of the residual, so the same
    /// routine serves steady (real) and unsteady (complex) analyses.
    pub fn small_disturbance_pressure_residual_on_side<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        local_f: &mut DVector<S>,
        side: usize,
        bc: &BoundaryCondition,
    ) -> Result<bool, AssemblyError> {
        self.check_follower(request_jacobian)?;
        let press_fn = bc.scalar("pressure")?;
        let dpress_fn = S::scalar_field(bc, "dpressure")?;
        let dnormal_fn = S::vector_field(bc, "dnormal")?;

        let points = side_points(self.id(), self.shape(), self.local_coords(), side)?;
        for p in &points {
            let pos = self.position_to_global(&p.position);
            let press = press_fn(&pos, self.time());
            let dpress = dpress_fn(&pos, self.time());
            let dn = dnormal_fn(&pos, self.time());

            for (i, &phi) in p.phi.iter().enumerate() {
                if phi == 0.0 {
                    continue;
                }
                for d in 0..3 {
                    let mut force = dn[d] * press;
                    force += dpress * p.normal[d];
                    local_f[6 * i + d] += force * (phi * p.jxw);
                }
            }
        }

        Ok(request_jacobian && self.follower_forces)
    }

    /// Small-disturbance pressure over the whole element boundary, with the
    /// assumed local normal
    pub fn small_disturbance_pressure_residual<S: LoadScalar>(
        &self,
        request_jacobian: bool,
        local_f: &mut DVector<S>,
        bc: &BoundaryCondition,
    ) -> Result<bool, AssemblyError> {
        self.check_follower(request_jacobian)?;
        let normal = self.assumed_normal()?;
        let press_fn = bc.scalar("pressure")?;
        let dpress_fn = S::scalar_field(bc, "dpressure")?;
        let dnormal_fn = S::vector_field(bc, "dnormal")?;

        for p in self.integration_points() {
            let press = press_fn(&p.position, self.time());
            let dpress = dpress_fn(&p.position, self.time());
            let dn = dnormal_fn(&p.position, self.time());

            for (i, &phi) in p.phi.iter().enumerate() {
                for d in 0..3 {
                    let mut force = dn[d] * press;
                    force += dpress * normal[d];
                    local_f[6 * i + d] += force * (phi * p.jxw);
                }
            }
        }

        Ok(request_jacobian && self.follower_forces)
    }

    /// Equivalent thermal load from a temperature condition
    ///
    /// The temperature and reference fields are sampled at the element
    /// centroid; when the condition carries no `"ref_temperature"` field the
    /// property card's reference temperature is used. The load does not
    /// depend on the solution, so no Jacobian contribution exists.
    pub fn thermal_residual<S: LoadScalar>(
        &self,
        _request_jacobian: bool,
        local_f: &mut DVector<S>,
        bc: &BoundaryCondition,
    ) -> Result<bool, AssemblyError> {
        let centroid = {
            let mut c = Point3::zeros();
            for p in self.global_coords() {
                c += p;
            }
            c / self.global_coords().len() as f64
        };
        let temp = bc.scalar("temperature")?(&centroid, self.time());
        let t_ref = match bc.scalar("ref_temperature") {
            Ok(f) => f(&centroid, self.time()),
            Err(_) => self.properties().ref_temperature,
        };
        let delta_t = temp - t_ref;

        let material = &self.properties().material;
        let f_th: DVector<f64> = match self.shape() {
            ElemShape::Bar2 => {
                let section = self.properties().beam_section()?;
                beam::thermal_load(section, material, delta_t)?
            }
            ElemShape::Quad4 => {
                let section = self.properties().shell_section()?;
                let e = material.require_elastic_modulus()?;
                let nu = material.require_poissons_ratio()?;
                let alpha = material.require_thermal_expansion()?;
                shell::thermal_load(section, e, nu, alpha, delta_t, self.local_coords())
                    .ok_or_else(|| AssemblyError::DegenerateGeometry {
                        element: self.id(),
                        detail: "non-positive in-plane Jacobian".to_string(),
                    })?
            }
            ElemShape::Hex8 => {
                let e = material.require_elastic_modulus()?;
                let nu = material.require_poissons_ratio()?;
                let alpha = material.require_thermal_expansion()?;
                solid::thermal_load(e, nu, alpha, delta_t, self.global_coords()).ok_or_else(
                    || AssemblyError::DegenerateGeometry {
                        element: self.id(),
                        detail: "non-positive Jacobian".to_string(),
                    },
                )?
            }
        };

        for (i, &v) in f_th.iter().enumerate() {
            local_f[i] += S::from_real(v);
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexa_model::{
        constant_complex_scalar, constant_complex_vector, constant_scalar, constant_vector,
        BeamSection, Element, Material, Mesh, Node, PropertyCard, Section, ShellSection,
    };
    use num_complex::Complex;
    use std::sync::Arc;

    fn steel() -> Material {
        Material {
            name: "STEEL".to_string(),
            elastic_modulus: Some(200e9),
            poissons_ratio: Some(0.3),
            density: Some(7850.0),
            thermal_expansion: Some(1.2e-5),
        }
    }

    fn shell_element() -> (Mesh, StructuralElement) {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_node(Node::new(2, 1.0, 0.0, 0.0));
        mesh.add_node(Node::new(3, 1.0, 1.0, 0.0));
        mesh.add_node(Node::new(4, 0.0, 1.0, 0.0));
        let mut elem = Element::new(1, ElemShape::Quad4, vec![1, 2, 3, 4], 5);
        elem.add_side_boundary(0, 30);
        mesh.add_element(elem.clone()).unwrap();

        let card = Arc::new(PropertyCard::new(
            steel(),
            Section::Shell(ShellSection::new(0.01)),
        ));
        let se = StructuralElement::new(&elem, &mesh, card).unwrap();
        (mesh, se)
    }

    fn pressure_bc(p: f64) -> Arc<BoundaryCondition> {
        Arc::new(
            BoundaryCondition::new(BcType::SurfacePressure)
                .with_scalar("pressure", constant_scalar(p)),
        )
    }

    #[test]
    fn zero_pressure_gives_zero_residual() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(5, pressure_bc(0.0));

        let mut f = DVector::<f64>::zeros(24);
        let computed = se.volume_external_residual(false, &mut f, &loads).unwrap();
        assert!(!computed);
        assert!(f.amax() == 0.0);
    }

    #[test]
    fn whole_boundary_pressure_resultant_matches_area() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(5, pressure_bc(1000.0));

        let mut f = DVector::<f64>::zeros(24);
        se.volume_external_residual(false, &mut f, &loads).unwrap();

        // assumed direction is the negative local z-axis; the element lies
        // in the global xy plane with unit area
        let total_z: f64 = (0..4).map(|i| f[6 * i + 2]).sum();
        assert!((total_z + 1000.0).abs() < 1e-9);

        // no in-plane force
        let total_x: f64 = (0..4).map(|i| f[6 * i]).sum();
        assert!(total_x.abs() < 1e-9);
    }

    #[test]
    fn side_dispatch_skips_unregistered_sides() {
        let (_mesh, se) = shell_element();
        // loads registered for a boundary id the element does not carry
        let mut loads = LoadMap::new();
        loads.insert(99, pressure_bc(500.0));

        let mut f = DVector::<f64>::zeros(24);
        se.side_external_residual(false, &mut f, &loads).unwrap();
        assert_eq!(f.amax(), 0.0);
    }

    #[test]
    fn side_pressure_pulls_along_outward_normal() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(30, pressure_bc(10.0)); // boundary 30 is side 0 (y=0 edge)

        let mut f = DVector::<f64>::zeros(24);
        se.side_external_residual(false, &mut f, &loads).unwrap();

        // side 0 runs from node 1 to node 2 along y = 0; outward normal -y
        let total_y: f64 = (0..4).map(|i| f[6 * i + 1]).sum();
        assert!((total_y + 10.0).abs() < 1e-9, "edge length 1 × p = 10");
        // only the two edge nodes are loaded
        assert_eq!(f[13], 0.0);
        assert_eq!(f[19], 0.0);
    }

    #[test]
    fn temperature_on_side_map_is_fatal() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(
            30,
            Arc::new(
                BoundaryCondition::new(BcType::Temperature)
                    .with_scalar("temperature", constant_scalar(400.0)),
            ),
        );

        let mut f = DVector::<f64>::zeros(24);
        let err = se.side_external_residual(false, &mut f, &loads).unwrap_err();
        assert!(matches!(err, AssemblyError::UnsupportedBc { .. }));
    }

    #[test]
    fn dirichlet_on_volume_map_is_fatal() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(5, Arc::new(BoundaryCondition::new(BcType::Dirichlet)));

        let mut f = DVector::<f64>::zeros(24);
        let err = se.volume_external_residual(false, &mut f, &loads).unwrap_err();
        assert!(matches!(err, AssemblyError::UnsupportedBc { .. }));
    }

    #[test]
    fn dirichlet_on_side_map_is_a_no_op() {
        let (_mesh, se) = shell_element();
        let mut loads = LoadMap::new();
        loads.insert(30, Arc::new(BoundaryCondition::new(BcType::Dirichlet)));

        let mut f = DVector::<f64>::zeros(24);
        let computed = se.side_external_residual(true, &mut f, &loads).unwrap();
        assert!(!computed);
        assert_eq!(f.amax(), 0.0);
    }

    #[test]
    fn follower_forces_with_jacobian_fail_fast() {
        let (mesh, _) = shell_element();
        let elem = mesh.elements.get(&1).unwrap().clone();
        let card = Arc::new(PropertyCard::new(
            steel(),
            Section::Shell(ShellSection::new(0.01)),
        ));
        let mut se = StructuralElement::new(&elem, &mesh, card).unwrap();
        se.follower_forces = true;

        let mut loads = LoadMap::new();
        loads.insert(5, pressure_bc(100.0));

        let mut f = DVector::<f64>::zeros(24);
        let err = se.volume_external_residual(true, &mut f, &loads).unwrap_err();
        assert!(matches!(err, AssemblyError::FollowerForceJacobian { .. }));

        // without a Jacobian request the same load is fine
        let mut f2 = DVector::<f64>::zeros(24);
        assert!(se.volume_external_residual(false, &mut f2, &loads).is_ok());
    }

    #[test]
    fn small_disturbance_real_and_complex_agree_on_real_data() {
        let (_mesh, se) = shell_element();

        let real_bc = Arc::new(
            BoundaryCondition::new(BcType::SmallDisturbanceMotion)
                .with_scalar("pressure", constant_scalar(100.0))
                .with_scalar("dpressure", constant_scalar(7.0))
                .with_vector("dnormal", constant_vector(Vector3::new(0.1, 0.0, 0.2))),
        );
        let complex_bc = Arc::new(
            BoundaryCondition::new(BcType::SmallDisturbanceMotion)
                .with_scalar("pressure", constant_scalar(100.0))
                .with_complex_scalar("dpressure", constant_complex_scalar(Complex::new(7.0, 0.0)))
                .with_complex_vector(
                    "dnormal",
                    constant_complex_vector(Vector3::new(
                        Complex::new(0.1, 0.0),
                        Complex::new(0.0, 0.0),
                        Complex::new(0.2, 0.0),
                    )),
                ),
        );

        let mut real_loads = LoadMap::new();
        real_loads.insert(5, real_bc);
        let mut complex_loads = LoadMap::new();
        complex_loads.insert(5, complex_bc);

        let mut f_real: DVector<f64> = DVector::zeros(24);
        se.volume_external_residual(false, &mut f_real, &real_loads)
            .unwrap();

        let mut f_complex: DVector<Complex<f64>> =
            DVector::from_element(24, Complex::new(0.0, 0.0));
        se.volume_external_residual(false, &mut f_complex, &complex_loads)
            .unwrap();

        for i in 0..24 {
            assert!((f_complex[i].re - f_real[i]).abs() < 1e-12);
            assert!(f_complex[i].im.abs() < 1e-12);
        }
        assert!(f_real.amax() > 0.0);
    }

    #[test]
    fn thermal_load_on_beam_subdomain() {
        let mut mesh = Mesh::new();
        mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
        mesh.add_node(Node::new(2, 2.0, 0.0, 0.0));
        let elem = Element::new(1, ElemShape::Bar2, vec![1, 2], 7);
        mesh.add_element(elem.clone()).unwrap();

        let card = Arc::new(PropertyCard::new(
            steel(),
            Section::Beam(BeamSection::custom(0.01, 1e-6, 1e-6, 1e-6)),
        ));
        let se = StructuralElement::new(&elem, &mesh, card).unwrap();

        let mut loads = LoadMap::new();
        loads.insert(
            7,
            Arc::new(
                BoundaryCondition::new(BcType::Temperature)
                    .with_scalar("temperature", constant_scalar(350.0))
                    .with_scalar("ref_temperature", constant_scalar(300.0)),
            ),
        );

        let mut f = DVector::<f64>::zeros(12);
        let computed = se.volume_external_residual(true, &mut f, &loads).unwrap();
        assert!(!computed, "thermal load carries no Jacobian");

        let axial = 200e9 * 0.01 * 1.2e-5 * 50.0;
        assert!((f[6] - axial).abs() / axial < 1e-12);
        assert!((f[0] + axial).abs() / axial < 1e-12);
    }
}
