//! Model parameters on every level of the multigrid hierarchy.
//!
//! Coarse levels are created and refilled on demand by the nonlinear solver through the
//! [`LevelHierarchy`] hooks. Node types are never restricted: every coarse level
//! re-classifies its nodes from the restricted ice thickness.

use std::sync::Arc;

use log::debug;

use crate::discretization::vertical::coarse_mz;
use crate::discretization::{GhostExchange, GridTopology, NodeField};
use crate::numerics::multigrid::Restriction;
use crate::numerics::solver::LevelHierarchy;
use crate::physics::node_type::NodeType;
use crate::physics::parameters::{update_node_types, ParameterField, Parameters};

/// Data of one level; level 0 is the finest.
#[derive(Debug, Clone, PartialEq)]
pub struct GridLevel {
    pub index: usize,
    pub grid: Arc<GridTopology>,
    pub mz: usize,
    pub parameters: ParameterField,
    /// Ice hardness at the `mz` levels of each column.
    pub hardness: NodeField<Vec<f64>>,
}

impl GridLevel {
    pub fn new(
        index: usize,
        grid: Arc<GridTopology>,
        mz: usize,
        parameters: ParameterField,
        hardness: NodeField<Vec<f64>>,
    ) -> Self {
        Self {
            index,
            grid,
            mz,
            parameters,
            hardness,
        }
    }

    pub fn num_columns(&self) -> usize {
        self.grid.xm * self.grid.ym
    }

    /// Owned columns in storage order.
    pub fn columns(&self) -> impl Iterator<Item = (i32, i32)> {
        self.parameters.owned_indices()
    }
}

pub struct MultigridHierarchy<E, R> {
    levels: Vec<GridLevel>,
    exchange: E,
    restriction: R,
    min_thickness: f64,
    factor: usize,
}

impl<E: GhostExchange, R: Restriction> MultigridHierarchy<E, R> {
    pub fn new(finest: GridLevel, exchange: E, restriction: R, min_thickness: f64, factor: usize) -> Self {
        Self {
            levels: vec![finest],
            exchange,
            restriction,
            min_thickness,
            factor,
        }
    }

    pub fn finest(&self) -> &GridLevel {
        &self.levels[0]
    }

    pub fn into_finest(mut self) -> GridLevel {
        self.levels.swap_remove(0)
    }

    fn restrict_field(
        &self,
        grid: &GridTopology,
        fine: &ParameterField,
        component: impl Fn(&Parameters) -> f64,
    ) -> NodeField<f64> {
        self.restriction.restrict_2d(grid, &fine.map(component))
    }
}

impl<E: GhostExchange, R: Restriction> LevelHierarchy for MultigridHierarchy<E, R> {
    fn coarsen(&mut self, fine: usize) -> usize {
        let fine_level = &self.levels[fine];
        let mz = coarse_mz(fine_level.mz, self.factor);
        let grid = Arc::clone(&fine_level.grid);
        let coarse = GridLevel::new(
            fine + 1,
            Arc::clone(&grid),
            mz,
            ParameterField::new(&grid, Parameters::default()),
            NodeField::new(&grid, vec![0.0; mz]),
        );
        debug!("allocating multigrid level {} with Mz = {mz}", fine + 1);

        self.levels.truncate(fine + 1);
        self.levels.push(coarse);
        fine + 1
    }

    fn restrict(&mut self, fine: usize, coarse: usize) {
        let grid = Arc::clone(&self.levels[fine].grid);
        let source = &self.levels[fine].parameters;

        let thickness = self.restrict_field(&grid, source, |p| p.thickness);
        let bed = self.restrict_field(&grid, source, |p| p.bed);
        let sea_level = self.restrict_field(&grid, source, |p| p.sea_level);
        let tauc = self.restrict_field(&grid, source, |p| p.tauc);
        let floatation = self.restrict_field(&grid, source, |p| p.floatation);

        let mut hardness = self.levels[coarse].hardness.clone();
        for n in self.levels[fine].hardness.owned_indices() {
            hardness[n] = self.restriction.restrict_column(&self.levels[fine].hardness[n]);
        }
        self.exchange.update_ghosts(&mut hardness);

        let mut parameters = ParameterField::new(&grid, Parameters::default());
        for n in parameters.owned_indices().collect::<Vec<_>>() {
            parameters[n] = Parameters {
                thickness: thickness[n],
                bed: bed[n],
                sea_level: sea_level[n],
                tauc: tauc[n],
                node_type: NodeType::Exterior,
                floatation: floatation[n],
            };
        }
        self.exchange.update_ghosts(&mut parameters);
        update_node_types(&grid, &mut parameters, self.min_thickness, &self.exchange);

        let level = &mut self.levels[coarse];
        level.parameters = parameters;
        level.hardness = hardness;
    }

    fn level(&self, index: usize) -> &GridLevel {
        &self.levels[index]
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::{LocalExchange, Periodicity};
    use crate::numerics::multigrid::SemiCoarsening;

    /// Horizontal 9-point full weighting on an unchanged grid.
    struct Smoothing;

    impl Restriction for Smoothing {
        fn restrict_2d(&self, _grid: &GridTopology, fine: &NodeField<f64>) -> NodeField<f64> {
            let mut result = fine.clone();
            for (i, j) in fine.owned_indices() {
                let (mut sum, mut weight) = (0.0, 0.0);
                for dj in -1..=1 {
                    for di in -1..=1 {
                        if let Some(v) = fine.get(i + di, j + dj) {
                            let w = ((2 - di.abs()) * (2 - dj.abs())) as f64;
                            sum += w * v;
                            weight += w;
                        }
                    }
                }
                result[(i, j)] = sum / weight;
            }
            result
        }

        fn restrict_column(&self, fine: &[f64]) -> Vec<f64> {
            SemiCoarsening { factor: 2 }.restrict_column(fine)
        }
    }

    fn finest(grid: &Arc<GridTopology>, thickness: impl Fn(usize, usize) -> f64, min: f64) -> GridLevel {
        let mut parameters = NodeField::from_global_fn(grid, |i, j| Parameters {
            thickness: thickness(i, j),
            bed: 0.0,
            sea_level: -100.0,
            tauc: 1e5,
            node_type: NodeType::Exterior,
            floatation: -1.0,
        });
        update_node_types(grid, &mut parameters, min, &LocalExchange);
        let hardness = NodeField::new(grid, vec![1.0; 5]);
        GridLevel::new(0, Arc::clone(grid), 5, parameters, hardness)
    }

    #[test]
    fn coarse_levels_reclassify_restricted_thickness() {
        let grid = Arc::new(GridTopology::serial(8, 8, 1.0, 1.0, Periodicity::XY).unwrap());
        // no element has four thick corners, so every fine node is exterior
        let level = finest(&grid, |i, j| if (i + j) % 2 == 0 { 100.0 } else { 0.0 }, 40.0);
        assert!(level.columns().all(|n| level.parameters[n].node_type == NodeType::Exterior));

        let mut hierarchy = MultigridHierarchy::new(level, LocalExchange, Smoothing, 40.0, 2);
        let coarse = hierarchy.coarsen(0);
        hierarchy.restrict(0, coarse);

        let coarse_level = hierarchy.level(coarse);
        assert_eq!(coarse_level.mz, 3);
        assert!(coarse_level
            .columns()
            .all(|n| (coarse_level.parameters[n].thickness - 50.0).abs() < 1e-12));
        assert!(coarse_level
            .columns()
            .all(|n| coarse_level.parameters[n].node_type == NodeType::Interior));

        // carrying the fine labels over instead gives a different answer at every node
        let fine_level = hierarchy.level(0);
        let carried = fine_level.parameters.map(|p| p.node_type);
        let derived = coarse_level.parameters.map(|p| p.node_type);
        assert!(coarse_level.columns().all(|n| carried[n] != derived[n]));
        assert_ne!(carried, derived);
    }

    #[test]
    fn every_level_is_handled_by_the_same_hooks() {
        let grid = Arc::new(GridTopology::serial(4, 4, 1.0, 1.0, Periodicity::None).unwrap());
        let mut level = finest(&grid, |_, _| 500.0, 10.0);
        level.mz = 9;
        level.hardness = NodeField::new(&grid, (0..9).map(|k| k as f64).collect());

        let mut hierarchy =
            MultigridHierarchy::new(level, LocalExchange, SemiCoarsening { factor: 2 }, 10.0, 2);
        let mut fine = 0;
        for expected_mz in [5, 3, 2] {
            let coarse = hierarchy.coarsen(fine);
            hierarchy.restrict(fine, coarse);
            let coarse_level = hierarchy.level(coarse);
            assert_eq!(coarse_level.index, coarse);
            assert_eq!(coarse_level.mz, expected_mz);
            assert_eq!(coarse_level.hardness[(1, 1)].len(), expected_mz);
            assert_eq!(coarse_level.parameters[(1, 1)].node_type, NodeType::Interior);
            assert_eq!(coarse_level.parameters[(0, 0)].node_type, NodeType::Boundary);
            fine = coarse;
        }
        assert_eq!(hierarchy.num_levels(), 4);

        // a new solve rebuilds the coarse levels below the finest one
        let coarse = hierarchy.coarsen(0);
        assert_eq!(coarse, 1);
        assert_eq!(hierarchy.num_levels(), 2);
    }
}
