//! The per-element physics engine.
//!
//! A [`StructuralElement`] pairs one mesh element with its property card and
//! local frame, caches local-frame copies of the solution state, and
//! computes inertial and internal residual/Jacobian contributions. Boundary
//! loads are handled by the dispatcher in [`crate::loads`], which operates
//! on the same local-frame buffers.
//!
//! Every contribution is computed in the element's local frame and
//! transformed to the global frame once, just before it is returned.

use crate::error::AssemblyError;
use crate::frame::LocalFrame;
use crate::quadrature::{volume_points, IntegrationPoint};
use flexa_model::{Element, ElemShape, Mesh, Point3, PropertyCard};
use nalgebra::{DMatrix, DVector};
use std::sync::Arc;

pub mod beam;
pub mod shell;
pub mod solid;

/// One element's physics engine with cached local solution state
pub struct StructuralElement {
    elem: Element,
    props: Arc<PropertyCard>,
    frame: LocalFrame,
    global_coords: Vec<Point3>,
    local_coords: Vec<Point3>,
    points: Vec<IntegrationPoint>,
    local_sol: DVector<f64>,
    local_vel: DVector<f64>,
    local_accel: DVector<f64>,
    local_base_sol: DVector<f64>,
    time: f64,
    /// Loads whose direction follows the deformation; Jacobians are
    /// unsupported while this is set
    pub follower_forces: bool,
    lumped_sample_qp: usize,
}

impl StructuralElement {
    /// Build the physics engine for one mesh element
    ///
    /// Selects the local frame for the element family, precomputes the
    /// volume integration points, and initializes the local solution caches
    /// to zero.
    pub fn new(
        elem: &Element,
        mesh: &Mesh,
        props: Arc<PropertyCard>,
    ) -> Result<Self, AssemblyError> {
        elem.validate()?;
        let nodes = mesh.element_nodes(elem)?;
        let global_coords: Vec<Point3> = nodes
            .iter()
            .map(|n| Point3::new(n.x, n.y, n.z))
            .collect();

        let frame = match elem.shape {
            ElemShape::Bar2 => LocalFrame::for_bar(
                elem.id,
                &global_coords[0],
                &global_coords[1],
                props.beam_section()?.y_orientation,
            )?,
            ElemShape::Quad4 => LocalFrame::for_quad(elem.id, &global_coords)?,
            ElemShape::Hex8 => LocalFrame::global_frame(),
        };

        let origin = global_coords[0];
        let local_coords: Vec<Point3> = global_coords
            .iter()
            .map(|p| frame.point_to_local(&origin, p))
            .collect();

        let points = volume_points(elem.id, elem.shape, &global_coords)?;

        let n_dofs = 6 * elem.shape.num_nodes();
        Ok(Self {
            elem: elem.clone(),
            props,
            frame,
            global_coords,
            local_coords,
            points,
            local_sol: DVector::zeros(n_dofs),
            local_vel: DVector::zeros(n_dofs),
            local_accel: DVector::zeros(n_dofs),
            local_base_sol: DVector::zeros(n_dofs),
            time: 0.0,
            follower_forces: false,
            lumped_sample_qp: 0,
        })
    }

    /// Choose the quadrature point sampled by the lumped-mass approximation
    pub fn with_lumped_sample_qp(mut self, qp: usize) -> Self {
        self.lumped_sample_qp = qp;
        self
    }

    /// Element ID
    pub fn id(&self) -> i32 {
        self.elem.id
    }

    /// Element shape
    pub fn shape(&self) -> ElemShape {
        self.elem.shape
    }

    /// The underlying mesh element
    pub fn element(&self) -> &Element {
        &self.elem
    }

    /// The element's property card
    pub fn properties(&self) -> &PropertyCard {
        &self.props
    }

    /// The element's local frame
    pub fn frame(&self) -> &LocalFrame {
        &self.frame
    }

    /// Total number of element DOFs (6 per node)
    pub fn n_dofs(&self) -> usize {
        self.local_sol.len()
    }

    /// Node coordinates in the local frame
    pub fn local_coords(&self) -> &[Point3] {
        &self.local_coords
    }

    /// Node coordinates in the global frame
    pub fn global_coords(&self) -> &[Point3] {
        &self.global_coords
    }

    /// Precomputed volume integration points (positions in global frame)
    pub fn integration_points(&self) -> &[IntegrationPoint] {
        &self.points
    }

    /// Evaluation time pushed to all field functions
    pub fn set_time(&mut self, t: f64) {
        self.time = t;
    }

    /// Evaluation time
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Cache the element solution (global frame in, local copy derived)
    pub fn set_solution(&mut self, v: &DVector<f64>) {
        debug_assert_eq!(v.len(), self.n_dofs());
        self.local_sol = self.frame.to_local(v);
    }

    /// Cache the element velocity
    pub fn set_velocity(&mut self, v: &DVector<f64>) {
        debug_assert_eq!(v.len(), self.n_dofs());
        self.local_vel = self.frame.to_local(v);
    }

    /// Cache the element acceleration
    pub fn set_acceleration(&mut self, v: &DVector<f64>) {
        debug_assert_eq!(v.len(), self.n_dofs());
        self.local_accel = self.frame.to_local(v);
    }

    /// Cache the base (linearization) solution
    pub fn set_base_solution(&mut self, v: &DVector<f64>) {
        debug_assert_eq!(v.len(), self.n_dofs());
        self.local_base_sol = self.frame.to_local(v);
    }

    /// Local-frame copy of the cached solution
    pub fn local_solution(&self) -> &DVector<f64> {
        &self.local_sol
    }

    /// Local-frame copy of the cached velocity
    pub fn local_velocity(&self) -> &DVector<f64> {
        &self.local_vel
    }

    /// Local-frame copy of the cached acceleration
    pub fn local_acceleration(&self) -> &DVector<f64> {
        &self.local_accel
    }

    /// Local-frame copy of the cached base (linearization) solution
    pub fn local_base_solution(&self) -> &DVector<f64> {
        &self.local_base_sol
    }

    /// Shape-function operator mapping nodal DOFs to the 6 field variables
    /// at a point: `B[(var, 6·i + var)] = φ_i`
    fn shape_operator(&self, phi: &[f64]) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(6, self.n_dofs());
        for (i, &p) in phi.iter().enumerate() {
            for var in 0..6 {
                b[(var, 6 * i + var)] = p;
            }
        }
        b
    }

    /// Inertial residual `M·a` and, on request, the acceleration Jacobian
    ///
    /// The lumped path evaluates the inertia field once at the configured
    /// sampling point and approximates the diagonal mass as
    /// `(volume / node count) · inertia component`, a first-order
    /// approximation rather than full integration. The consistent path integrates
    /// `JxW · Bᵗ·M·B` over all quadrature points.
    pub fn inertial_residual(
        &self,
        request_jacobian: bool,
        f: &mut DVector<f64>,
        jac_xddot: &mut DMatrix<f64>,
    ) -> Result<bool, AssemblyError> {
        let n_nodes = self.elem.shape.num_nodes();
        let n2 = self.n_dofs();
        let inertia = self.props.inertia_matrix()?;

        let mut local_f = DVector::zeros(n2);
        let mut local_jac = DMatrix::zeros(n2, n2);

        if self.props.lumped_mass {
            let qp = self.lumped_sample_qp.min(self.points.len() - 1);
            let mat = inertia(&self.points[qp].position, self.time);

            let vol: f64 =
                self.points.iter().map(|p| p.jxw).sum::<f64>() / n_nodes as f64;
            for var in 0..6 {
                for i in 0..n_nodes {
                    local_jac[(6 * i + var, 6 * i + var)] = vol * mat[(var, var)];
                }
            }
            local_f = &local_jac * &self.local_accel;
        } else {
            for p in &self.points {
                let mat = inertia(&p.position, self.time);
                let b = self.shape_operator(&p.phi);
                let m_b = &mat * &b;

                let v1 = &m_b * &self.local_accel;
                local_f += (b.transpose() * v1) * p.jxw;

                if request_jacobian {
                    local_jac += (b.transpose() * &m_b) * p.jxw;
                }
            }
        }

        if self.frame.is_identity() {
            *f += local_f;
            if request_jacobian {
                *jac_xddot += local_jac;
            }
        } else {
            *f += self.frame.to_global_vector(&local_f);
            if request_jacobian {
                *jac_xddot += self.frame.to_global_matrix(&local_jac);
            }
        }

        Ok(request_jacobian)
    }

    /// Local elastic stiffness for the element family
    fn local_elastic_stiffness(&self) -> Result<DMatrix<f64>, AssemblyError> {
        let material = &self.props.material;
        match self.elem.shape {
            ElemShape::Bar2 => {
                let section = self.props.beam_section()?;
                let l = self.bar_length();
                Ok(beam::local_stiffness(section, material, l)?)
            }
            ElemShape::Quad4 => {
                let section = self.props.shell_section()?;
                let e = material.require_elastic_modulus()?;
                let nu = material.require_poissons_ratio()?;
                shell::local_stiffness(section, e, nu, &self.local_coords).ok_or_else(|| {
                    AssemblyError::DegenerateGeometry {
                        element: self.elem.id,
                        detail: "non-positive in-plane Jacobian".to_string(),
                    }
                })
            }
            ElemShape::Hex8 => {
                let e = material.require_elastic_modulus()?;
                let nu = material.require_poissons_ratio()?;
                solid::local_stiffness(e, nu, &self.global_coords).ok_or_else(|| {
                    AssemblyError::DegenerateGeometry {
                        element: self.elem.id,
                        detail: "non-positive Jacobian".to_string(),
                    }
                })
            }
        }
    }

    fn bar_length(&self) -> f64 {
        (self.local_coords[1] - self.local_coords[0]).norm()
    }

    /// Beam geometric-stiffness data: unit matrix `G`, axial-force gradient
    /// `g`, and the current axial force `N = g·u`
    fn beam_geometric(&self) -> Result<(DMatrix<f64>, DVector<f64>, f64), AssemblyError> {
        let section = self.props.beam_section()?;
        let l = self.bar_length();
        let g_unit = beam::geometric_unit(l);
        let grad = beam::axial_force_gradient(section, &self.props.material, l)?;
        let n_force = grad.dot(&self.local_sol);
        Ok((g_unit, grad, n_force))
    }

    /// Internal (stiffness) residual and, on request, its Jacobian
    ///
    /// Beams carry the axial-force geometric term, so their Jacobian
    /// includes the rank-one coupling between axial stretch and transverse
    /// stiffness.
    pub fn internal_residual(
        &self,
        request_jacobian: bool,
        f: &mut DVector<f64>,
        jac: &mut DMatrix<f64>,
    ) -> Result<bool, AssemblyError> {
        let k = self.local_elastic_stiffness()?;
        let u = &self.local_sol;

        let mut local_f = &k * u;
        let mut local_jac = if request_jacobian {
            k.clone()
        } else {
            DMatrix::zeros(0, 0)
        };

        if self.elem.shape == ElemShape::Bar2 {
            let (g_unit, grad, n_force) = self.beam_geometric()?;
            let g_u = &g_unit * u;
            local_f += &g_u * n_force;
            if request_jacobian {
                local_jac += &g_unit * n_force;
                local_jac += &g_u * grad.transpose();
            }
        }

        if self.frame.is_identity() {
            *f += local_f;
            if request_jacobian {
                *jac += local_jac;
            }
        } else {
            *f += self.frame.to_global_vector(&local_f);
            if request_jacobian {
                *jac += self.frame.to_global_matrix(&local_jac);
            }
        }

        Ok(request_jacobian)
    }

    /// `[J]·{dX}` contribution of this element, excluding constant forces
    ///
    /// `dx` is the element-gathered perturbation in the global frame; the
    /// result is returned in the global frame.
    pub fn linearized_jacobian_solution_product(
        &self,
        dx: &DVector<f64>,
    ) -> Result<DVector<f64>, AssemblyError> {
        let k = self.local_elastic_stiffness()?;
        let dxl = self.frame.to_local(dx);

        let mut v = &k * &dxl;
        if self.elem.shape == ElemShape::Bar2 {
            let (g_unit, grad, n_force) = self.beam_geometric()?;
            v += (&g_unit * &dxl) * n_force;
            v += (&g_unit * &self.local_sol) * grad.dot(&dxl);
        }

        Ok(self.frame.to_global_vector(&v))
    }

    /// `d([J]·{dX})/dX` contribution of this element
    ///
    /// Zero for the linear shell and solid families; for beams the geometric
    /// term yields `(G·dX)·gᵗ + (g·dX)·G`.
    pub fn second_derivative_dot_solution(
        &self,
        dx: &DVector<f64>,
    ) -> Result<DMatrix<f64>, AssemblyError> {
        let n2 = self.n_dofs();
        if self.elem.shape != ElemShape::Bar2 {
            return Ok(DMatrix::zeros(n2, n2));
        }

        let dxl = self.frame.to_local(dx);
        let (g_unit, grad, _) = self.beam_geometric()?;
        let g_dx = &g_unit * &dxl;
        let mut h = &g_dx * grad.transpose();
        h += &g_unit * grad.dot(&dxl);

        Ok(self.frame.to_global_matrix(&h))
    }
}
