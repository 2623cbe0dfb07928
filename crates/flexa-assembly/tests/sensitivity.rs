//! Sensitivity assembly: analytic right-hand sides against finite
//! differences, and the finite-difference fallback signal for unsupported
//! parameters.

use flexa_assembly::{
    AssemblyConfig, AssemblyDriver, DesignParameter, Discipline, ParameterKind, SystemInit,
};
use flexa_model::{
    constant_scalar, BcType, BoundaryCondition, Element, ElemShape, Material, Mesh, Node,
    PropertyCard, Section, ShellSection,
};
use nalgebra::DVector;
use std::sync::Arc;

fn steel(density: f64) -> Material {
    Material {
        name: "STEEL".to_string(),
        elastic_modulus: Some(200e9),
        poissons_ratio: Some(0.3),
        density: Some(density),
        thermal_expansion: Some(1.2e-5),
    }
}

fn plate_mesh() -> Mesh {
    let mut mesh = Mesh::new();
    mesh.add_node(Node::new(1, 0.0, 0.0, 0.0));
    mesh.add_node(Node::new(2, 1.0, 0.0, 0.0));
    mesh.add_node(Node::new(3, 1.0, 1.0, 0.0));
    mesh.add_node(Node::new(4, 0.0, 1.0, 0.0));
    mesh.add_element(Element::new(1, ElemShape::Quad4, vec![1, 2, 3, 4], 6))
        .unwrap();
    mesh
}

fn scaled_pressure_bc(scale: f64, base: f64) -> Arc<BoundaryCondition> {
    Arc::new(
        BoundaryCondition::new(BcType::SurfacePressure)
            .with_scalar("pressure", constant_scalar(scale * base)),
    )
}

fn make_driver(pressure_scale: f64, density: f64) -> (AssemblyDriver, usize) {
    let mesh = plate_mesh();
    let mut discipline = Discipline::new();
    discipline.add_property_card(
        6,
        Arc::new(PropertyCard::new(
            steel(density),
            Section::Shell(ShellSection::new(0.01)),
        )),
    );
    discipline.add_volume_load(6, scaled_pressure_bc(pressure_scale, 1000.0));

    let system = Arc::new(SystemInit::new(Arc::new(mesh)));
    let n = system.n_dofs();
    let mut driver = AssemblyDriver::new(AssemblyConfig::default());
    driver.attach(Arc::new(discipline), system);
    (driver, n)
}

fn residual(driver: &mut AssemblyDriver, n: usize) -> DVector<f64> {
    let x = DVector::zeros(n);
    let mut r = DVector::zeros(n);
    driver.residual_and_jacobian(&x, Some(&mut r), None).unwrap();
    r
}

#[test]
fn pressure_scale_sensitivity_matches_negative_fd() {
    let theta = 2.0;
    let (mut driver, n) = make_driver(theta, 7850.0);

    let params = vec![DesignParameter::new(
        "p_scale",
        ParameterKind::PressureScale { boundary: 6 },
        theta,
    )];
    let mut rhs = DVector::zeros(n);
    let supported = driver.sensitivity_assemble(&params, 0, &mut rhs).unwrap();
    assert!(supported);
    assert!(rhs.amax() > 0.0);

    // finite-difference dR/dθ from two perturbed assemblies
    let h = 1e-4;
    let (mut drv_p, _) = make_driver(theta + h, 7850.0);
    let (mut drv_m, _) = make_driver(theta - h, 7850.0);
    let rp = residual(&mut drv_p, n);
    let rm = residual(&mut drv_m, n);

    for i in 0..n {
        let fd = (rp[i] - rm[i]) / (2.0 * h);
        // rhs is −dR/dθ
        assert!(
            (rhs[i] + fd).abs() < 1e-6 * rhs.amax(),
            "rhs[{}] = {} vs −fd = {}",
            i,
            rhs[i],
            -fd
        );
    }
}

#[test]
fn density_sensitivity_matches_negative_fd() {
    let rho = 7850.0;
    let (mut driver, n) = make_driver(1.0, rho);

    let mut accel = DVector::zeros(n);
    for i in 0..n {
        accel[i] = 0.25 * ((i % 5) as f64 - 2.0);
    }
    driver.set_acceleration(accel.clone());

    let params = vec![DesignParameter::new(
        "rho",
        ParameterKind::MaterialDensity { subdomain: 6 },
        rho,
    )];
    let mut rhs = DVector::zeros(n);
    let supported = driver.sensitivity_assemble(&params, 0, &mut rhs).unwrap();
    assert!(supported);
    assert!(rhs.amax() > 0.0);

    let h = 1.0; // density perturbation
    let (mut drv_p, _) = make_driver(1.0, rho + h);
    drv_p.set_acceleration(accel.clone());
    let (mut drv_m, _) = make_driver(1.0, rho - h);
    drv_m.set_acceleration(accel);
    let rp = residual(&mut drv_p, n);
    let rm = residual(&mut drv_m, n);

    for i in 0..n {
        let fd = (rp[i] - rm[i]) / (2.0 * h);
        assert!(
            (rhs[i] + fd).abs() < 1e-6 * rhs.amax().max(1e-12),
            "rhs[{}] = {} vs −fd = {}",
            i,
            rhs[i],
            -fd
        );
    }
}

#[test]
fn unsupported_parameter_reports_fallback() {
    let (driver, n) = make_driver(1.0, 7850.0);

    let params = vec![DesignParameter::new(
        "sweep_angle",
        ParameterKind::Custom("sweep_angle".into()),
        0.2,
    )];
    let mut rhs = DVector::zeros(n);
    let supported = driver.sensitivity_assemble(&params, 0, &mut rhs).unwrap();
    assert!(!supported, "custom parameters have no analytic path");
    assert_eq!(rhs.amax(), 0.0);

    // the framework falls back to finite differencing without aborting:
    // both perturbed assemblies evaluate cleanly
    let h = 1e-3;
    let (mut drv_p, _) = make_driver(1.0 + h, 7850.0);
    let (mut drv_m, _) = make_driver(1.0 - h, 7850.0);
    let rp = residual(&mut drv_p, n);
    let rm = residual(&mut drv_m, n);
    let fd: DVector<f64> = (rp - rm) / (2.0 * h);
    assert!(fd.amax() > 0.0);
}

#[test]
fn out_of_range_parameter_index_reports_fallback() {
    let (driver, n) = make_driver(1.0, 7850.0);
    let mut rhs = DVector::zeros(n);
    let supported = driver.sensitivity_assemble(&[], 3, &mut rhs).unwrap();
    assert!(!supported);
}
