//! Property cards: material and section data shared by elements.
//!
//! A property card is owned by the discipline configuration and referenced
//! read-only by every element of a subdomain. Field data is exposed through
//! the field-function contract of [`crate::field`] so the numerical core
//! never sees raw material constants directly.

use crate::error::ModelError;
use crate::field::MatrixFn;
use nalgebra::DMatrix;
use std::sync::Arc;

/// A material definition
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    /// Material name
    pub name: String,
    /// Young's modulus (E) [Pa]
    pub elastic_modulus: Option<f64>,
    /// Poisson's ratio (ν) [-]
    pub poissons_ratio: Option<f64>,
    /// Density (ρ) [kg/m³]
    pub density: Option<f64>,
    /// Thermal expansion coefficient (α) [1/K]
    pub thermal_expansion: Option<f64>,
}

impl Material {
    /// Create a new material with a given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Get the shear modulus (G) from E and ν
    pub fn shear_modulus(&self) -> Option<f64> {
        match (self.elastic_modulus, self.poissons_ratio) {
            (Some(e), Some(nu)) => Some(e / (2.0 * (1.0 + nu))),
            _ => None,
        }
    }

    fn missing(&self, property: &'static str) -> ModelError {
        ModelError::MissingMaterialProperty {
            material: self.name.clone(),
            property,
        }
    }

    /// Young's modulus, or an error naming the material
    pub fn require_elastic_modulus(&self) -> Result<f64, ModelError> {
        self.elastic_modulus.ok_or_else(|| self.missing("elastic modulus"))
    }

    /// Poisson's ratio, or an error naming the material
    pub fn require_poissons_ratio(&self) -> Result<f64, ModelError> {
        self.poissons_ratio.ok_or_else(|| self.missing("Poisson's ratio"))
    }

    /// Density, or an error naming the material
    pub fn require_density(&self) -> Result<f64, ModelError> {
        self.density.ok_or_else(|| self.missing("density"))
    }

    /// Thermal expansion coefficient, or an error naming the material
    pub fn require_thermal_expansion(&self) -> Result<f64, ModelError> {
        self.thermal_expansion
            .ok_or_else(|| self.missing("thermal expansion coefficient"))
    }

    /// Shear modulus, or an error naming the material
    pub fn require_shear_modulus(&self) -> Result<f64, ModelError> {
        self.shear_modulus()
            .ok_or_else(|| self.missing("shear modulus (requires E and ν)"))
    }
}

/// Beam section properties
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSection {
    /// Cross-sectional area [m²]
    pub area: f64,
    /// Second moment of area about local y-axis [m⁴]
    pub iyy: f64,
    /// Second moment of area about local z-axis [m⁴]
    pub izz: f64,
    /// Torsional constant (J) [m⁴]
    pub torsion_constant: f64,
    /// Orientation of the local y-axis; a reference-vector fallback is used
    /// when not given
    pub y_orientation: Option<[f64; 3]>,
}

impl BeamSection {
    /// Create a circular beam section
    pub fn circular(radius: f64) -> Self {
        let area = std::f64::consts::PI * radius.powi(2);
        let i = std::f64::consts::PI * radius.powi(4) / 4.0;
        let j = std::f64::consts::PI * radius.powi(4) / 2.0;
        Self {
            area,
            iyy: i,
            izz: i,
            torsion_constant: j,
            y_orientation: None,
        }
    }

    /// Create a custom beam section with explicit properties
    pub fn custom(area: f64, iyy: f64, izz: f64, j: f64) -> Self {
        Self {
            area,
            iyy,
            izz,
            torsion_constant: j,
            y_orientation: None,
        }
    }
}

/// Shell section properties
#[derive(Debug, Clone, PartialEq)]
pub struct ShellSection {
    /// Shell thickness [m]
    pub thickness: f64,
}

impl ShellSection {
    /// Create a new shell section with specified thickness
    pub fn new(thickness: f64) -> Self {
        Self { thickness }
    }
}

/// Section data per element family
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// 1D beam section
    Beam(BeamSection),
    /// 2D shell section
    Shell(ShellSection),
    /// 3D solid (no sectional reduction)
    Solid,
}

/// Per-subdomain material and section data
///
/// Shared read-only by all elements referencing the same physical region.
#[derive(Clone)]
pub struct PropertyCard {
    /// Material of the region
    pub material: Material,
    /// Section data matching the element family of the region
    pub section: Section,
    /// Diagonal (lumped) vs consistent mass formulation
    pub lumped_mass: bool,
    /// Stress-free reference temperature [K]
    pub ref_temperature: f64,
    /// Optional replacement for the built-in inertia-matrix field
    pub inertia_override: Option<MatrixFn>,
}

impl std::fmt::Debug for PropertyCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCard")
            .field("material", &self.material)
            .field("section", &self.section)
            .field("lumped_mass", &self.lumped_mass)
            .field("ref_temperature", &self.ref_temperature)
            .field("inertia_override", &self.inertia_override.is_some())
            .finish()
    }
}

impl PropertyCard {
    /// Create a property card with a consistent mass formulation
    pub fn new(material: Material, section: Section) -> Self {
        Self {
            material,
            section,
            lumped_mass: false,
            ref_temperature: 0.0,
            inertia_override: None,
        }
    }

    /// Switch to the diagonal (lumped) mass formulation
    pub fn with_lumped_mass(mut self) -> Self {
        self.lumped_mass = true;
        self
    }

    /// Set the stress-free reference temperature
    pub fn with_ref_temperature(mut self, t: f64) -> Self {
        self.ref_temperature = t;
        self
    }

    /// The beam section, or an error if this card carries a different family
    pub fn beam_section(&self) -> Result<&BeamSection, ModelError> {
        match &self.section {
            Section::Beam(s) => Ok(s),
            _ => Err(ModelError::SectionMismatch { expected: "beam" }),
        }
    }

    /// The shell section, or an error if this card carries a different family
    pub fn shell_section(&self) -> Result<&ShellSection, ModelError> {
        match &self.section {
            Section::Shell(s) => Ok(s),
            _ => Err(ModelError::SectionMismatch { expected: "shell" }),
        }
    }

    /// Sectional inertia matrix as a field function `(position, time) -> 6×6`
    ///
    /// Rows/columns follow the nodal DOF order ux, uy, uz, tx, ty, tz. The
    /// built-in field is spatially constant; cards may override it to model
    /// varying density.
    pub fn inertia_matrix(&self) -> Result<MatrixFn, ModelError> {
        if let Some(f) = &self.inertia_override {
            return Ok(Arc::clone(f));
        }

        let rho = self.material.require_density()?;
        let diag: [f64; 6] = match &self.section {
            Section::Beam(s) => {
                let polar = s.iyy + s.izz;
                [
                    rho * s.area,
                    rho * s.area,
                    rho * s.area,
                    rho * polar,
                    rho * s.iyy,
                    rho * s.izz,
                ]
            }
            Section::Shell(s) => {
                let t = s.thickness;
                let rotary = rho * t.powi(3) / 12.0;
                [rho * t, rho * t, rho * t, rotary, rotary, 0.0]
            }
            Section::Solid => [rho, rho, rho, 0.0, 0.0, 0.0],
        };

        Ok(Arc::new(move |_, _| {
            let mut m = DMatrix::zeros(6, 6);
            for (i, &v) in diag.iter().enumerate() {
                m[(i, i)] = v;
            }
            m
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Point3;

    fn steel() -> Material {
        Material {
            name: "STEEL".to_string(),
            elastic_modulus: Some(210e9),
            poissons_ratio: Some(0.3),
            density: Some(7850.0),
            thermal_expansion: Some(1.2e-5),
        }
    }

    #[test]
    fn shear_modulus_from_e_and_nu() {
        let m = steel();
        let g = m.shear_modulus().unwrap();
        assert!((g - 210e9 / 2.6).abs() / g < 1e-12);
    }

    #[test]
    fn missing_property_names_the_material() {
        let m = Material::new("EMPTY");
        let err = m.require_density().unwrap_err();
        assert!(err.to_string().contains("EMPTY"));
        assert!(err.to_string().contains("density"));
    }

    #[test]
    fn circular_section_properties() {
        let r = 0.05;
        let s = BeamSection::circular(r);
        let expected_area = std::f64::consts::PI * r.powi(2);
        let expected_i = std::f64::consts::PI * r.powi(4) / 4.0;
        assert!((s.area - expected_area).abs() < 1e-10);
        assert!((s.iyy - expected_i).abs() < 1e-12);
        assert!((s.torsion_constant - 2.0 * expected_i).abs() < 1e-12);
    }

    #[test]
    fn beam_inertia_matrix_diagonal() {
        let card = PropertyCard::new(steel(), Section::Beam(BeamSection::custom(0.01, 2e-6, 3e-6, 4e-6)));
        let inertia = card.inertia_matrix().unwrap();
        let m = inertia(&Point3::zeros(), 0.0);

        assert!((m[(0, 0)] - 7850.0 * 0.01).abs() < 1e-9);
        assert!((m[(3, 3)] - 7850.0 * 5e-6).abs() < 1e-9);
        assert!((m[(4, 4)] - 7850.0 * 2e-6).abs() < 1e-9);
        assert!((m[(5, 5)] - 7850.0 * 3e-6).abs() < 1e-9);
        assert_eq!(m[(0, 1)], 0.0);
    }

    #[test]
    fn inertia_matrix_requires_density() {
        let card = PropertyCard::new(Material::new("NODENS"), Section::Solid);
        assert!(card.inertia_matrix().is_err());
    }

    #[test]
    fn inertia_override_wins() {
        let mut card = PropertyCard::new(steel(), Section::Solid);
        card.inertia_override = Some(Arc::new(|_, _| DMatrix::identity(6, 6)));
        let inertia = card.inertia_matrix().unwrap();
        let m = inertia(&Point3::zeros(), 0.0);
        assert_eq!(m[(5, 5)], 1.0);
    }

    #[test]
    fn section_mismatch_is_an_error() {
        let card = PropertyCard::new(steel(), Section::Solid);
        assert!(card.beam_section().is_err());
        assert!(card.shell_section().is_err());
    }
}
