use serde::{Deserialize, Serialize};

use super::node_type::{classify, NodeType};
use crate::discretization::{GhostExchange, GridTopology, NodeField};

/// Per-node 2D inputs of the stress balance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Parameters {
    pub thickness: f64,
    /// Elevation of the ice bottom: the bed where grounded, the flotation depth where
    /// floating.
    pub bed: f64,
    pub sea_level: f64,
    /// Basal yield stress.
    pub tauc: f64,
    pub node_type: NodeType,
    /// Floating minus grounded surface elevation; positive where the ice floats.
    pub floatation: f64,
}

impl Parameters {
    pub fn surface(&self) -> f64 {
        self.bed + self.thickness
    }
}

pub type ParameterField = NodeField<Parameters>;

pub const SECONDS_PER_YEAR: f64 = 3.155_692_597_47e7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicalConstants {
    pub ice_density: f64,
    pub sea_water_density: f64,
    pub standard_gravity: f64,
}

impl Default for PhysicalConstants {
    fn default() -> Self {
        Self {
            ice_density: 910.0,
            sea_water_density: 1028.0,
            standard_gravity: 9.81,
        }
    }
}

impl PhysicalConstants {
    pub fn rho_ice_g(&self) -> f64 {
        self.ice_density * self.standard_gravity
    }

    pub fn rho_ocean_g(&self) -> f64 {
        self.sea_water_density * self.standard_gravity
    }
}

/// Ice enthalpy columns on the model's (physical) vertical grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Enthalpy {
    /// Heights above the ice base of the enthalpy levels, increasing, starting at 0.
    pub levels: Vec<f64>,
    pub values: NodeField<Vec<f64>>,
}

impl Enthalpy {
    pub fn uniform(grid: &GridTopology, levels: Vec<f64>, value: f64) -> Self {
        let values = NodeField::new(grid, vec![value; levels.len()]);
        Self { levels, values }
    }

    /// Linear interpolation in height; constant above the top level.
    pub fn at_height(&self, i: i32, j: i32, z: f64) -> f64 {
        let column = &self.values[(i, j)];
        let mz = self.levels.len();
        let k0 = self
            .levels
            .iter()
            .rposition(|&level| level <= z)
            .unwrap_or(0);
        if k0 + 1 < mz {
            let lambda = (z - self.levels[k0]) / (self.levels[k0 + 1] - self.levels[k0]);
            (1.0 - lambda) * column[k0] + lambda * column[k0 + 1]
        } else {
            column[mz - 1]
        }
    }
}

/// Geometry and basal inputs of one update; only owned values are read.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub thickness: NodeField<f64>,
    pub bed: NodeField<f64>,
    pub sea_level: NodeField<f64>,
    pub tauc: NodeField<f64>,
    pub enthalpy: Enthalpy,
}

/// Computes the parameter field on the finest level from the inputs of one update.
pub fn build_parameters<E: GhostExchange>(
    grid: &GridTopology,
    inputs: &Inputs,
    constants: &PhysicalConstants,
    min_thickness: f64,
    exchange: &E,
) -> ParameterField {
    let alpha = constants.ice_density / constants.sea_water_density;

    let mut parameters = ParameterField::new(grid, Parameters::default());
    for (i, j) in parameters.owned_indices().collect::<Vec<_>>() {
        let (b, h, sea) = (
            inputs.bed[(i, j)],
            inputs.thickness[(i, j)],
            inputs.sea_level[(i, j)],
        );

        let b_grounded = b;
        let b_floating = sea - alpha * h;
        let s_grounded = b + h;
        let s_floating = sea + (1.0 - alpha) * h;

        parameters[(i, j)] = Parameters {
            thickness: h,
            bed: b_grounded.max(b_floating),
            sea_level: sea,
            tauc: inputs.tauc[(i, j)],
            node_type: NodeType::Exterior,
            floatation: s_floating - s_grounded,
        };
    }
    exchange.update_ghosts(&mut parameters);

    update_node_types(grid, &mut parameters, min_thickness, exchange);
    parameters
}

/// Re-derives node types from the thickness stored in `parameters` (ghosts current).
pub fn update_node_types<E: GhostExchange>(
    grid: &GridTopology,
    parameters: &mut ParameterField,
    min_thickness: f64,
    exchange: &E,
) {
    let thickness = parameters.map(|p| p.thickness);
    let node_type = classify(grid, &thickness, min_thickness, exchange);
    for (i, j) in parameters.ghosted_indices().collect::<Vec<_>>() {
        parameters[(i, j)].node_type = node_type[(i, j)];
    }
    exchange.update_ghosts(parameters);
}
