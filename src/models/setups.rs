//! Geometries used by the binary, the benchmarks and the verification tests.

use log::info;

use crate::discretization::{GridTopology, NodeField};
use crate::physics::parameters::{Enthalpy, Inputs};

/// Enthalpy of ice 30 K above the Paterson-Budd reference temperature.
pub const COLD_ICE_ENTHALPY: f64 = 30.0 * 2009.0;

/// Grounded slab of uniform thickness on a bed parallel to the surface
/// `s = surface_elevation - slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slab {
    pub thickness: f64,
    pub surface_elevation: f64,
    pub slope: f64,
    pub tauc: f64,
}

impl Default for Slab {
    fn default() -> Self {
        Self {
            thickness: 1000.0,
            surface_elevation: 2000.0,
            slope: 1e-3,
            tauc: 1e5,
        }
    }
}

impl Slab {
    pub fn inputs(&self, grid: &GridTopology) -> Inputs {
        let surface = |i: usize| self.surface_elevation - self.slope * grid.x(i as i32);
        Inputs {
            thickness: NodeField::new(grid, self.thickness),
            bed: NodeField::from_global_fn(grid, |i, _| surface(i) - self.thickness),
            sea_level: NodeField::new(grid, -1e4),
            tauc: NodeField::new(grid, self.tauc),
            enthalpy: Enthalpy::uniform(grid, vec![0.0, 2.0 * self.thickness], COLD_ICE_ENTHALPY),
        }
    }
}

/// Ice sheet on a seaward-sloping marine bed, thinning towards a floating margin that ends
/// at a calving cliff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarineIceSheet {
    pub max_thickness: f64,
    /// Bed elevation at `x = 0`.
    pub bed_elevation: f64,
    /// Bed elevation drop over the domain.
    pub bed_drop: f64,
    /// Fraction of the domain covered by ice.
    pub extent: f64,
    pub tauc: f64,
}

impl Default for MarineIceSheet {
    fn default() -> Self {
        Self {
            max_thickness: 2000.0,
            bed_elevation: 200.0,
            bed_drop: 1200.0,
            extent: 0.8,
            tauc: 5e4,
        }
    }
}

impl MarineIceSheet {
    pub fn inputs(&self, grid: &GridTopology) -> Inputs {
        let length = grid.x(grid.mx as i32 - 1).max(grid.dx);
        let front = self.extent * length;
        info!(
            "marine ice sheet: {} x {} nodes, calving front at x = {:.1} km",
            grid.mx,
            grid.my,
            front / 1e3
        );

        let thickness = |i: usize| {
            let x = grid.x(i as i32);
            if x <= front {
                self.max_thickness * (1.0 - 0.9 * x / front).sqrt()
            } else {
                0.0
            }
        };
        Inputs {
            thickness: NodeField::from_global_fn(grid, |i, _| thickness(i)),
            bed: NodeField::from_global_fn(grid, |i, _| {
                self.bed_elevation - self.bed_drop * grid.x(i as i32) / length
            }),
            sea_level: NodeField::new(grid, 0.0),
            tauc: NodeField::new(grid, self.tauc),
            enthalpy: Enthalpy::uniform(
                grid,
                vec![0.0, self.max_thickness],
                COLD_ICE_ENTHALPY,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::Periodicity;

    #[test]
    fn marine_sheet_ends_in_open_water() {
        let grid = GridTopology::serial(11, 3, 1e4, 1e4, Periodicity::None).unwrap();
        let inputs = MarineIceSheet::default().inputs(&grid);
        assert_eq!(inputs.thickness[(0, 1)], 2000.0);
        assert!(inputs.thickness[(8, 1)] > 0.0);
        assert_eq!(inputs.thickness[(9, 1)], 0.0);
        assert!(inputs.bed[(10, 1)] < inputs.sea_level[(10, 1)]);
    }
}
