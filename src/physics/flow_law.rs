use serde::{Deserialize, Serialize};

use super::parameters::{Enthalpy, ParameterField, PhysicalConstants};
use crate::discretization::vertical::sigma_levels;
use crate::discretization::NodeField;

const IDEAL_GAS_CONSTANT: f64 = 8.31441;

/// Ice rheology: hardness `B` in `tau = B * D^(1/n)`.
pub trait FlowLaw {
    fn exponent(&self) -> f64;
    fn hardness(&self, enthalpy: f64, pressure: f64) -> f64;
}

/// Constant hardness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsothermalGlen {
    pub exponent: f64,
    pub hardness: f64,
}

impl FlowLaw for IsothermalGlen {
    fn exponent(&self) -> f64 {
        self.exponent
    }

    fn hardness(&self, _enthalpy: f64, _pressure: f64) -> f64 {
        self.hardness
    }
}

/// Paterson-Budd Arrhenius law for cold ice.
///
/// Enthalpy is measured relative to ice at `reference_temperature`; temperatures are
/// capped at the pressure-melting point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatersonBudd {
    pub exponent: f64,
    pub specific_heat: f64,
    pub reference_temperature: f64,
    pub melting_point: f64,
    /// Clausius-Clapeyron constant, K Pa-1.
    pub beta_cc: f64,
    pub critical_temperature: f64,
    pub a_cold: f64,
    pub a_warm: f64,
    pub q_cold: f64,
    pub q_warm: f64,
}

impl Default for PatersonBudd {
    fn default() -> Self {
        Self {
            exponent: 3.0,
            specific_heat: 2009.0,
            reference_temperature: 223.15,
            melting_point: 273.15,
            beta_cc: 7.9e-8,
            critical_temperature: 263.15,
            a_cold: 3.61e-13,
            a_warm: 1.73e3,
            q_cold: 6.0e4,
            q_warm: 13.9e4,
        }
    }
}

impl PatersonBudd {
    pub fn pressure_adjusted_temperature(&self, enthalpy: f64, pressure: f64) -> f64 {
        let melting = self.melting_point - self.beta_cc * pressure;
        let temperature = (self.reference_temperature + enthalpy / self.specific_heat).min(melting);
        temperature + self.beta_cc * pressure
    }

    pub fn softness(&self, enthalpy: f64, pressure: f64) -> f64 {
        let t_pa = self.pressure_adjusted_temperature(enthalpy, pressure);
        let (a, q) = if t_pa < self.critical_temperature {
            (self.a_cold, self.q_cold)
        } else {
            (self.a_warm, self.q_warm)
        };
        a * (-q / (IDEAL_GAS_CONSTANT * t_pa)).exp()
    }
}

impl FlowLaw for PatersonBudd {
    fn exponent(&self) -> f64 {
        self.exponent
    }

    fn hardness(&self, enthalpy: f64, pressure: f64) -> f64 {
        self.softness(enthalpy, pressure).powf(-1.0 / self.exponent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowLawConfig {
    Isothermal(IsothermalGlen),
    PatersonBudd(PatersonBudd),
}

impl Default for FlowLawConfig {
    fn default() -> Self {
        FlowLawConfig::PatersonBudd(PatersonBudd::default())
    }
}

impl FlowLaw for FlowLawConfig {
    fn exponent(&self) -> f64 {
        match self {
            FlowLawConfig::Isothermal(law) => law.exponent(),
            FlowLawConfig::PatersonBudd(law) => law.exponent(),
        }
    }

    fn hardness(&self, enthalpy: f64, pressure: f64) -> f64 {
        match self {
            FlowLawConfig::Isothermal(law) => law.hardness(enthalpy, pressure),
            FlowLawConfig::PatersonBudd(law) => law.hardness(enthalpy, pressure),
        }
    }
}

/// Ice hardness at the `mz` sigma levels of every owned column.
pub fn ice_hardness<L: FlowLaw>(
    law: &L,
    parameters: &ParameterField,
    enthalpy: &Enthalpy,
    constants: &PhysicalConstants,
    mz: usize,
) -> NodeField<Vec<f64>> {
    let sigma = sigma_levels(mz);
    let mut hardness = parameters.map(|_| vec![0.0; mz]);
    for (i, j) in parameters.owned_indices() {
        let thickness = parameters[(i, j)].thickness;
        hardness[(i, j)] = sigma
            .iter()
            .map(|s| {
                let z = s * thickness;
                let pressure = constants.rho_ice_g() * (thickness - z);
                law.hardness(enthalpy.at_height(i, j, z), pressure)
            })
            .collect();
    }
    hardness
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn paterson_budd_is_continuous_enough_and_softens_with_warming() {
        let law = PatersonBudd::default();
        let cold = law.hardness(0.0, 0.0);
        let warm = law.hardness(40.0 * law.specific_heat, 0.0);
        assert!(cold > warm);
        // -50 C ice
        assert_relative_eq!(
            law.softness(0.0, 0.0),
            3.61e-13 * (-6.0e4 / (IDEAL_GAS_CONSTANT * 223.15)).exp(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn temperature_is_capped_at_the_melting_point() {
        let law = PatersonBudd::default();
        let p = 1e7;
        let t_pa = law.pressure_adjusted_temperature(1e9, p);
        assert_relative_eq!(t_pa, law.melting_point, epsilon = 1e-9);
    }

    #[test]
    fn isothermal_ignores_state() {
        let law = FlowLawConfig::Isothermal(IsothermalGlen {
            exponent: 1.0,
            hardness: 2.0e13,
        });
        assert_eq!(law.hardness(1e5, 1e6), 2.0e13);
        assert_eq!(law.exponent(), 1.0);
    }
}
