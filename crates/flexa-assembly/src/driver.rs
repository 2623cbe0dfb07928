//! The assembly driver: the contract consumed by the external nonlinear
//! solver.
//!
//! One call per solver iteration: the driver walks all mesh elements in id
//! order, hands each one to the element physics engine, scatter-adds the
//! contributions into the global buffers, runs the optional post-assembly
//! hook, and returns. Either output may be withheld by the solver (pure
//! matrix-free inquiry or residual-only convergence check).
//!
//! Element evaluation is embarrassingly parallel; with `parallel` enabled
//! the per-element results are computed on the rayon pool and merged in a
//! single sequential pass in element-id order, keeping the assembled values
//! bit-for-bit independent of thread scheduling.

use crate::diagnostics;
use crate::elements::StructuralElement;
use crate::error::AssemblyError;
use crate::sensitivity::{DesignParameter, ParameterKind};
use crate::system::{Discipline, SystemInit};
use flexa_model::{BcType, Element, LoadMap};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CooMatrix;
use num_complex::Complex;
use num_traits::Zero;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Assembly tunables
///
/// The lumped-mass sampling point and the Jacobian-check tolerances are
/// implementation-specific simplifications, kept configurable rather than
/// hard-coded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    /// Evaluate elements on the rayon pool
    pub parallel: bool,
    /// Quadrature point sampled by the lumped-mass approximation
    pub lumped_sample_qp: usize,
    /// Perturbation size of the numerical Jacobian check
    pub jacobian_check_delta: f64,
    /// Relative tolerance above which the Jacobian check reports an entry
    pub jacobian_check_tol: f64,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            lumped_sample_qp: 0,
            jacobian_check_delta: 1e-7,
            jacobian_check_tol: 1e-4,
        }
    }
}

/// User-provided strategy invoked after full assembly, before control
/// returns to the solver
///
/// At most one hook is active at a time; registration is tied to the
/// attach/detach cycle and cleared by [`AssemblyDriver::detach`].
pub trait PostAssembly: Send {
    /// Called with the solution and whichever buffers were assembled
    fn post_assembly(
        &mut self,
        x: &DVector<f64>,
        r: Option<&DVector<f64>>,
        j: Option<&CooMatrix<f64>>,
    );
}

struct Context {
    discipline: Arc<Discipline>,
    system: Arc<SystemInit>,
}

/// Orchestrates the per-element loop and owns the caller-refreshed solution
/// state
#[derive(Default)]
pub struct AssemblyDriver {
    config: AssemblyConfig,
    context: Option<Context>,
    active: bool,
    time: f64,
    velocity: Option<DVector<f64>>,
    acceleration: Option<DVector<f64>>,
    base_solution: Option<DVector<f64>>,
    post_assembly: Option<Box<dyn PostAssembly>>,
}

/// Per-element evaluation context shared (read-only) across workers
struct ElemEval<'a> {
    discipline: &'a Discipline,
    system: &'a SystemInit,
    config: &'a AssemblyConfig,
    time: f64,
    x: &'a DVector<f64>,
    velocity: Option<&'a DVector<f64>>,
    acceleration: Option<&'a DVector<f64>>,
    base_solution: Option<&'a DVector<f64>>,
}

struct ElemContribution {
    dofs: Vec<usize>,
    f: DVector<f64>,
    jac: Option<DMatrix<f64>>,
}

impl ElemEval<'_> {
    fn build(&self, elem: &Element) -> Result<(StructuralElement, Vec<usize>), AssemblyError> {
        let card = self.discipline.card_for(elem.subdomain)?;
        let mut se = StructuralElement::new(elem, &self.system.mesh, Arc::clone(card))?
            .with_lumped_sample_qp(self.config.lumped_sample_qp);
        se.follower_forces = self.discipline.follower_forces;
        se.set_time(self.time);

        let dofs = self.system.dof_map.element_dofs(elem);
        se.set_solution(&self.system.dof_map.gather(self.x, elem)?);
        if let Some(v) = self.velocity {
            se.set_velocity(&self.system.dof_map.gather(v, elem)?);
        }
        if let Some(a) = self.acceleration {
            se.set_acceleration(&self.system.dof_map.gather(a, elem)?);
        }
        if let Some(b) = self.base_solution {
            se.set_base_solution(&self.system.dof_map.gather(b, elem)?);
        }
        Ok((se, dofs))
    }

    /// Full element evaluation: internal + inertial − external loads
    fn residual_and_jacobian(
        &self,
        elem: &Element,
        request_jacobian: bool,
    ) -> Result<ElemContribution, AssemblyError> {
        let (se, dofs) = self.build(elem)?;
        let n2 = se.n_dofs();

        let mut f = DVector::zeros(n2);
        let mut jac = DMatrix::zeros(n2, n2);
        se.internal_residual(request_jacobian, &mut f, &mut jac)?;

        // the acceleration block belongs to the transient integrator, not
        // to dR/dx, so only the force term enters here
        if self.acceleration.is_some() {
            let mut jac_xddot = DMatrix::zeros(n2, n2);
            se.inertial_residual(false, &mut f, &mut jac_xddot)?;
        }

        let mut f_ext = DVector::zeros(n2);
        se.side_external_residual::<f64>(request_jacobian, &mut f_ext, &self.discipline.side_loads)?;
        se.volume_external_residual::<f64>(
            request_jacobian,
            &mut f_ext,
            &self.discipline.volume_loads,
        )?;
        f -= f_ext;

        Ok(ElemContribution {
            dofs,
            f,
            jac: if request_jacobian { Some(jac) } else { None },
        })
    }
}

impl AssemblyDriver {
    /// Create a driver with the given configuration
    pub fn new(config: AssemblyConfig) -> Self {
        Self {
            config,
            context: None,
            active: false,
            time: 0.0,
            velocity: None,
            acceleration: None,
            base_solution: None,
            post_assembly: None,
        }
    }

    /// The driver's configuration
    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Associate the driver with a discipline and system context
    pub fn attach(&mut self, discipline: Arc<Discipline>, system: Arc<SystemInit>) {
        self.context = Some(Context { discipline, system });
        self.active = true;
    }

    /// Reattach to the system attached earlier; an error once [`Self::detach`]
    /// has cleared the association
    pub fn reattach(&mut self) -> Result<(), AssemblyError> {
        if self.context.is_none() {
            return Err(AssemblyError::NotAttached);
        }
        self.active = true;
        Ok(())
    }

    /// Clear the association, the post-assembly hook, and the cached
    /// solution state
    pub fn detach(&mut self) {
        self.context = None;
        self.active = false;
        self.post_assembly = None;
        self.velocity = None;
        self.acceleration = None;
        self.base_solution = None;
    }

    /// Register the post-assembly hook (replaces any previous one)
    pub fn set_post_assembly(&mut self, hook: Box<dyn PostAssembly>) {
        self.post_assembly = Some(hook);
    }

    /// Whether a post-assembly hook is currently registered
    pub fn has_post_assembly(&self) -> bool {
        self.post_assembly.is_some()
    }

    /// Evaluation time pushed to all field functions
    pub fn set_time(&mut self, t: f64) {
        self.time = t;
    }

    /// Refresh the global velocity vector
    pub fn set_velocity(&mut self, v: DVector<f64>) {
        self.velocity = Some(v);
    }

    /// Refresh the global acceleration vector
    pub fn set_acceleration(&mut self, a: DVector<f64>) {
        self.acceleration = Some(a);
    }

    /// Store the base solution for small-disturbance analysis
    pub fn set_base_solution(&mut self, x: DVector<f64>) {
        self.base_solution = Some(x);
    }

    /// Clear the stored base solution
    pub fn clear_base_solution(&mut self) {
        self.base_solution = None;
    }

    /// Total number of global DOFs of the attached system
    pub fn n_dofs(&self) -> Result<usize, AssemblyError> {
        Ok(self.context()?.system.n_dofs())
    }

    fn context(&self) -> Result<&Context, AssemblyError> {
        if !self.active {
            return Err(AssemblyError::NotAttached);
        }
        self.context.as_ref().ok_or(AssemblyError::NotAttached)
    }

    fn context_arcs(&self) -> Result<(Arc<Discipline>, Arc<SystemInit>), AssemblyError> {
        let ctx = self.context()?;
        Ok((Arc::clone(&ctx.discipline), Arc::clone(&ctx.system)))
    }

    fn check_len(&self, n: usize, v: &DVector<f64>) -> Result<(), AssemblyError> {
        if v.len() != n {
            return Err(AssemblyError::SizeMismatch {
                expected: n,
                got: v.len(),
            });
        }
        Ok(())
    }

    fn eval<'a>(
        &'a self,
        discipline: &'a Discipline,
        system: &'a SystemInit,
        x: &'a DVector<f64>,
    ) -> ElemEval<'a> {
        ElemEval {
            discipline,
            system,
            config: &self.config,
            time: self.time,
            x,
            velocity: self.velocity.as_ref(),
            acceleration: self.acceleration.as_ref(),
            base_solution: self.base_solution.as_ref(),
        }
    }

    fn for_each_element<T, F>(&self, system: &SystemInit, op: F) -> Result<Vec<T>, AssemblyError>
    where
        T: Send,
        F: Fn(&Element) -> Result<T, AssemblyError> + Send + Sync,
    {
        let elements: Vec<&Element> = system.mesh.elements.values().collect();
        if self.config.parallel {
            elements.par_iter().map(|e| op(e)).collect()
        } else {
            elements.iter().map(|e| op(e)).collect()
        }
    }

    /// Assemble the residual and/or Jacobian at solution `x`
    ///
    /// Supplied buffers are zeroed first; withheld buffers are skipped
    /// entirely. With both withheld the element loop degenerates to a no-op,
    /// but the post-assembly hook still runs before control returns.
    pub fn residual_and_jacobian(
        &mut self,
        x: &DVector<f64>,
        mut r: Option<&mut DVector<f64>>,
        mut j: Option<&mut CooMatrix<f64>>,
    ) -> Result<(), AssemblyError> {
        let (discipline, system) = self.context_arcs()?;
        let n = system.n_dofs();
        self.check_len(n, x)?;

        if let Some(r) = r.as_deref_mut() {
            self.check_len(n, r)?;
            r.fill(0.0);
        }
        if let Some(j) = j.as_deref_mut() {
            *j = CooMatrix::new(n, n);
        }

        let request_r = r.is_some();
        let request_j = j.is_some();

        if request_r || request_j {
            let eval = self.eval(&discipline, &system, x);
            let contributions =
                self.for_each_element(&system, |e| eval.residual_and_jacobian(e, request_j))?;

            // deterministic merge in element-id order
            for c in contributions {
                if let Some(r) = r.as_deref_mut() {
                    for (i_local, &i_global) in c.dofs.iter().enumerate() {
                        r[i_global] += c.f[i_local];
                    }
                }
                if let (Some(j), Some(mat)) = (j.as_deref_mut(), c.jac.as_ref()) {
                    for (i_local, &i_global) in c.dofs.iter().enumerate() {
                        for (j_local, &j_global) in c.dofs.iter().enumerate() {
                            let v = mat[(i_local, j_local)];
                            if v != 0.0 {
                                j.push(i_global, j_global, v);
                            }
                        }
                    }
                }
            }
        }

        if let Some(hook) = self.post_assembly.as_mut() {
            hook.post_assembly(x, r.as_deref(), j.as_deref());
        }
        Ok(())
    }

    /// Compute `[J]·{dX}` without forming the Jacobian
    ///
    /// Each element contributes its linearized-product terms only; constant
    /// force terms are excluded by construction.
    pub fn linearized_jacobian_solution_product(
        &self,
        x: &DVector<f64>,
        dx: &DVector<f64>,
        jdx: &mut DVector<f64>,
    ) -> Result<(), AssemblyError> {
        let (discipline, system) = self.context_arcs()?;
        let n = system.n_dofs();
        self.check_len(n, x)?;
        self.check_len(n, dx)?;
        self.check_len(n, jdx)?;
        jdx.fill(0.0);

        let eval = self.eval(&discipline, &system, x);
        let products = self.for_each_element(&system, |e| {
            let (se, dofs) = eval.build(e)?;
            let dxe = system.dof_map.gather(dx, e)?;
            let v = se.linearized_jacobian_solution_product(&dxe)?;
            Ok((dofs, v))
        })?;

        for (dofs, v) in products {
            for (i_local, &i_global) in dofs.iter().enumerate() {
                jdx[i_global] += v[i_local];
            }
        }
        Ok(())
    }

    /// Assemble `d([J]·{dX})/dX` for higher-order sensitivity and stability
    /// analysis
    pub fn second_derivative_dot_solution_assembly(
        &self,
        x: &DVector<f64>,
        dx: &DVector<f64>,
        out: &mut CooMatrix<f64>,
    ) -> Result<(), AssemblyError> {
        let (discipline, system) = self.context_arcs()?;
        let n = system.n_dofs();
        self.check_len(n, x)?;
        self.check_len(n, dx)?;
        *out = CooMatrix::new(n, n);

        let eval = self.eval(&discipline, &system, x);
        let blocks = self.for_each_element(&system, |e| {
            let (se, dofs) = eval.build(e)?;
            let dxe = system.dof_map.gather(dx, e)?;
            let h = se.second_derivative_dot_solution(&dxe)?;
            Ok((dofs, h))
        })?;

        for (dofs, h) in blocks {
            for (i_local, &i_global) in dofs.iter().enumerate() {
                for (j_local, &j_global) in dofs.iter().enumerate() {
                    let v = h[(i_local, j_local)];
                    if v != 0.0 {
                        out.push(i_global, j_global, v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Assemble the complex small-disturbance load residual around a base
    /// solution
    ///
    /// Drives the complex instantiation of the boundary dispatchers; loads
    /// enter with the same negative sign they carry in the real residual. A
    /// stored base solution (see [`Self::set_base_solution`]) takes
    /// precedence over `x_base`.
    pub fn small_disturbance_residual(
        &self,
        x_base: &DVector<f64>,
        r: &mut DVector<Complex<f64>>,
    ) -> Result<(), AssemblyError> {
        let (discipline, system) = self.context_arcs()?;
        let n = system.n_dofs();
        self.check_len(n, x_base)?;
        if r.len() != n {
            return Err(AssemblyError::SizeMismatch {
                expected: n,
                got: r.len(),
            });
        }
        r.fill(Complex::zero());

        let base = self.base_solution.as_ref().unwrap_or(x_base);
        let mut eval = self.eval(&discipline, &system, base);
        eval.base_solution = Some(base);

        let contributions = self.for_each_element(&system, |e| {
            let (se, dofs) = eval.build(e)?;
            let mut f_ext = DVector::from_element(se.n_dofs(), Complex::zero());
            se.side_external_residual(false, &mut f_ext, &discipline.side_loads)?;
            se.volume_external_residual(false, &mut f_ext, &discipline.volume_loads)?;
            Ok((dofs, f_ext))
        })?;

        for (dofs, f_ext) in contributions {
            for (i_local, &i_global) in dofs.iter().enumerate() {
                r[i_global] -= f_ext[i_local];
            }
        }
        Ok(())
    }

    /// Analytic residual sensitivity with respect to parameter `i`
    ///
    /// On success `rhs` holds `−dR/dp` (the sensitivity right-hand side)
    /// and the call returns `true`. Returning `false` is not an error: it
    /// signals the caller to fall back to a finite-difference estimate.
    pub fn sensitivity_assemble(
        &self,
        parameters: &[DesignParameter],
        i: usize,
        rhs: &mut DVector<f64>,
    ) -> Result<bool, AssemblyError> {
        let Some(param) = parameters.get(i) else {
            return Ok(false);
        };
        let (discipline, system) = self.context_arcs()?;
        let n = system.n_dofs();
        self.check_len(n, rhs)?;
        rhs.fill(0.0);

        match &param.kind {
            ParameterKind::Custom(_) => Ok(false),

            ParameterKind::PressureScale { boundary } => {
                // the load is linear in the scale, so dF/dp = F/p; a zero
                // current value leaves nothing to factor out
                if param.value == 0.0 {
                    return Ok(false);
                }

                let mut side = LoadMap::new();
                for bc in discipline.side_loads.matching(*boundary) {
                    if bc.bc_type() == BcType::SurfacePressure {
                        side.insert(*boundary, Arc::clone(bc));
                    }
                }
                let mut volume = LoadMap::new();
                for bc in discipline.volume_loads.matching(*boundary) {
                    if bc.bc_type() == BcType::SurfacePressure {
                        volume.insert(*boundary, Arc::clone(bc));
                    }
                }
                if side.is_empty() && volume.is_empty() {
                    return Ok(false);
                }

                let zero_x = DVector::zeros(n);
                let eval = self.eval(&discipline, &system, &zero_x);
                let contributions = self.for_each_element(&system, |e| {
                    let (se, dofs) = eval.build(e)?;
                    let mut f_ext = DVector::zeros(se.n_dofs());
                    se.side_external_residual::<f64>(false, &mut f_ext, &side)?;
                    se.volume_external_residual::<f64>(false, &mut f_ext, &volume)?;
                    Ok((dofs, f_ext))
                })?;

                // R = internal − F_ext, so −dR/dp = +F/p
                for (dofs, f_ext) in contributions {
                    for (i_local, &i_global) in dofs.iter().enumerate() {
                        rhs[i_global] += f_ext[i_local] / param.value;
                    }
                }
                Ok(true)
            }

            ParameterKind::MaterialDensity { subdomain } => {
                // the inertial term is linear in density: dR/dρ = (M·a)/ρ
                let Some(accel) = self.acceleration.as_ref() else {
                    // no acceleration state: the derivative is analytic and
                    // identically zero
                    return Ok(true);
                };
                self.check_len(n, accel)?;

                let zero_x = DVector::zeros(n);
                let eval = self.eval(&discipline, &system, &zero_x);
                let target = *subdomain;
                let contributions = self.for_each_element(&system, |e| {
                    if e.subdomain != target {
                        return Ok(None);
                    }
                    let card = discipline.card_for(e.subdomain)?;
                    let rho = card.material.require_density()?;
                    if rho == 0.0 {
                        return Ok(None);
                    }
                    let (se, dofs) = eval.build(e)?;
                    let n2 = se.n_dofs();
                    let mut f = DVector::zeros(n2);
                    let mut jac_xddot = DMatrix::zeros(n2, n2);
                    se.inertial_residual(false, &mut f, &mut jac_xddot)?;
                    Ok(Some((dofs, f, rho)))
                })?;

                for c in contributions.into_iter().flatten() {
                    let (dofs, f, rho) = c;
                    for (i_local, &i_global) in dofs.iter().enumerate() {
                        rhs[i_global] -= f[i_local] / rho;
                    }
                }
                Ok(true)
            }
        }
    }

    /// Diagnostic: compare every element's analytic Jacobian against a
    /// central-difference estimate
    ///
    /// Never part of the production evaluation path; discrepancies are
    /// reported on stderr and the largest one is returned.
    pub fn check_numerical_jacobian(&self, x: &DVector<f64>) -> Result<f64, AssemblyError> {
        let (discipline, system) = self.context_arcs()?;
        self.check_len(system.n_dofs(), x)?;

        let eval = self.eval(&discipline, &system, x);
        let mut worst = 0.0f64;
        for elem in system.mesh.elements.values() {
            let (mut se, _) = eval.build(elem)?;
            let xe = system.dof_map.gather(x, elem)?;
            let diff = diagnostics::check_element_numerical_jacobian(
                &mut se,
                &xe,
                self.config.jacobian_check_delta,
                self.config.jacobian_check_tol,
            )?;
            worst = worst.max(diff);
        }
        Ok(worst)
    }
}
