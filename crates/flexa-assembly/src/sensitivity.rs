//! Design parameters for residual sensitivity assembly.
//!
//! A parameter names a quantity the optimizer varies. Kinds with an
//! analytic residual derivative are assembled exactly; for every other kind
//! `sensitivity_assemble` reports `false` and the caller falls back to
//! finite differencing. The decision is local to each parameter, so
//! sensitivities across distinct parameters are independent.

use flexa_model::{BoundaryId, SubdomainId};

/// What a design parameter controls
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// Multiplier on the pressure fields of every condition registered
    /// under one boundary id (analytic: the load is linear in the scale)
    PressureScale { boundary: BoundaryId },
    /// Material density of one subdomain (analytic: the mass matrix is
    /// linear in the density)
    MaterialDensity { subdomain: SubdomainId },
    /// A parameter with no analytic residual derivative in this core
    Custom(String),
}

/// A named design parameter with its current value
#[derive(Debug, Clone, PartialEq)]
pub struct DesignParameter {
    /// Parameter name (for reporting)
    pub name: String,
    /// What the parameter controls
    pub kind: ParameterKind,
    /// Current value of the parameter
    pub value: f64,
}

impl DesignParameter {
    /// Create a parameter
    pub fn new(name: impl Into<String>, kind: ParameterKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
        }
    }

    /// Whether this core has an analytic residual derivative for the kind
    pub fn has_analytic_sensitivity(&self) -> bool {
        !matches!(self.kind, ParameterKind::Custom(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analytic_support_by_kind() {
        let p = DesignParameter::new("p0", ParameterKind::PressureScale { boundary: 4 }, 2.0);
        assert!(p.has_analytic_sensitivity());

        let rho = DesignParameter::new(
            "rho",
            ParameterKind::MaterialDensity { subdomain: 1 },
            7850.0,
        );
        assert!(rho.has_analytic_sensitivity());

        let shape = DesignParameter::new("sweep", ParameterKind::Custom("sweep".into()), 0.3);
        assert!(!shape.has_analytic_sensitivity());
    }
}
