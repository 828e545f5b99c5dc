//! Blatter-Pattyn stress balance: parameter setup, continuation solve and post-processing.

use std::sync::Arc;

use log::info;
use nalgebra::DVector;
use thiserror::Error;

use crate::config::{BlatterConfig, ConfigError};
use crate::discretization::vertical::sigma_levels;
use crate::discretization::{GhostExchange, GridError, GridTopology, LocalExchange, NodeField};
use crate::models::column_shear::ColumnShearModel;
use crate::numerics::continuation::{ContinuationError, ContinuationReport, ContinuationSolver};
use crate::numerics::hierarchy::{GridLevel, MultigridHierarchy};
use crate::numerics::multigrid::SemiCoarsening;
use crate::numerics::newton::HierarchicalSolve;
use crate::physics::flow_law::{ice_hardness, FlowLaw};
use crate::physics::parameters::{build_parameters, Inputs};
use crate::processing::restart::{RestartError, RestartRecord};

#[derive(Debug, Error)]
pub enum StressBalanceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Continuation(#[from] ContinuationError),
    #[error(transparent)]
    Restart(#[from] RestartError),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Results of one update on the nodes owned by this rank (ghosts up to date).
#[derive(Debug, Clone, PartialEq)]
pub struct StressBalanceOutput {
    /// Column-averaged horizontal velocity.
    pub velocity: NodeField<[f64; 2]>,
    pub basal_velocity: NodeField<[f64; 2]>,
    pub basal_frictional_heating: NodeField<f64>,
    pub report: ContinuationReport,
}

pub struct Blatter<E: GhostExchange = LocalExchange> {
    grid: Arc<GridTopology>,
    config: BlatterConfig,
    exchange: E,
    model: ColumnShearModel,
    /// Solution of the last successful update, also the next initial guess.
    x: DVector<f64>,
    u_sigma: NodeField<Vec<f64>>,
    v_sigma: NodeField<Vec<f64>>,
}

impl Blatter<LocalExchange> {
    /// Serial solver on the grid described by `config`.
    pub fn from_config(config: BlatterConfig) -> Result<Self, StressBalanceError> {
        let grid = Arc::new(config.grid.topology(0)?);
        Self::new(grid, config, LocalExchange)
    }
}

impl<E: GhostExchange> Blatter<E> {
    /// `grid` is the ownership window of this rank; `config.grid` is not consulted.
    pub fn new(
        grid: Arc<GridTopology>,
        config: BlatterConfig,
        exchange: E,
    ) -> Result<Self, StressBalanceError> {
        let mz_levels = config.validate()?;
        info!(
            "Blatter: {} x {} x {} grid, {} multigrid level(s) with Mz = {:?}",
            grid.mx,
            grid.my,
            config.mz,
            mz_levels.len(),
            mz_levels
        );

        let model = ColumnShearModel::new(
            config.constants,
            config.sliding,
            config.flow_law.exponent(),
            config.min_thickness,
        );
        let size = grid.xm * grid.ym * config.mz * 2;
        let zero = NodeField::new(&grid, vec![0.0; config.mz]);
        Ok(Self {
            grid,
            config,
            exchange,
            model,
            x: DVector::zeros(size),
            u_sigma: zero.clone(),
            v_sigma: zero,
        })
    }

    /// Sets the initial guess: zero, or the velocity stored in a restart record.
    pub fn init(&mut self, restart: Option<&RestartRecord>) -> Result<(), StressBalanceError> {
        match restart {
            Some(record) => {
                let (u, v) = record.velocity(&self.grid, self.config.mz)?;
                self.u_sigma = u;
                self.v_sigma = v;
                self.x = self.pack();
            }
            None => {
                self.x.fill(0.0);
                self.u_sigma.fill(vec![0.0; self.config.mz]);
                self.v_sigma.fill(vec![0.0; self.config.mz]);
            }
        }
        Ok(())
    }

    /// Solves the stress balance for new geometry and ice enthalpy.
    ///
    /// On failure the previous solution is kept as the initial guess of the next update.
    pub fn update(&mut self, inputs: &Inputs) -> Result<StressBalanceOutput, StressBalanceError> {
        let config = &self.config;
        let parameters = build_parameters(
            &self.grid,
            inputs,
            &config.constants,
            config.min_thickness,
            &self.exchange,
        );
        let hardness = ice_hardness(
            &config.flow_law,
            &parameters,
            &inputs.enthalpy,
            &config.constants,
            config.mz,
        );
        let finest = GridLevel::new(0, Arc::clone(&self.grid), config.mz, parameters, hardness);
        let mut hierarchy = MultigridHierarchy::new(
            finest,
            &self.exchange,
            SemiCoarsening {
                factor: config.coarsening_factor,
            },
            config.min_thickness,
            config.coarsening_factor,
        );

        let mut x = self.x.clone();
        let report = {
            let mut solve = HierarchicalSolve {
                solver: &config.newton,
                model: &self.model,
                hierarchy: &mut hierarchy,
            };
            ContinuationSolver::new(config.continuation).run(&mut solve, &mut x, config.eps_target())?
        };
        let level = hierarchy.into_finest();

        self.x = x;
        let (u, v) = self.unpack();
        self.u_sigma = u;
        self.v_sigma = v;
        Ok(self.post_process(&level, report))
    }

    /// x-component of the velocity at the sigma levels of every column.
    pub fn velocity_u_sigma(&self) -> &NodeField<Vec<f64>> {
        &self.u_sigma
    }

    pub fn velocity_v_sigma(&self) -> &NodeField<Vec<f64>> {
        &self.v_sigma
    }

    pub fn restart_record(&self) -> RestartRecord {
        let mut record = RestartRecord::new(self.grid.mx, self.grid.my, self.config.mz);
        record.insert(&self.u_sigma, &self.v_sigma);
        record
    }

    pub fn grid(&self) -> &Arc<GridTopology> {
        &self.grid
    }

    pub fn config(&self) -> &BlatterConfig {
        &self.config
    }

    fn index(&self, column: usize, k: usize, component: usize) -> usize {
        (column * self.config.mz + k) * 2 + component
    }

    fn pack(&self) -> DVector<f64> {
        let mut x = DVector::zeros(self.x.len());
        for (col, n) in self.u_sigma.owned_indices().enumerate() {
            for k in 0..self.config.mz {
                x[self.index(col, k, 0)] = self.u_sigma[n][k];
                x[self.index(col, k, 1)] = self.v_sigma[n][k];
            }
        }
        x
    }

    fn unpack(&self) -> (NodeField<Vec<f64>>, NodeField<Vec<f64>>) {
        let mz = self.config.mz;
        let (mut u, mut v) = (self.u_sigma.clone(), self.v_sigma.clone());
        for (col, n) in self.u_sigma.owned_indices().enumerate() {
            u[n] = (0..mz).map(|k| self.x[self.index(col, k, 0)]).collect();
            v[n] = (0..mz).map(|k| self.x[self.index(col, k, 1)]).collect();
        }
        self.exchange.update_ghosts(&mut u);
        self.exchange.update_ghosts(&mut v);
        (u, v)
    }

    fn post_process(&self, level: &GridLevel, report: ContinuationReport) -> StressBalanceOutput {
        let sigma = sigma_levels(level.mz);
        let mut velocity = NodeField::new(&self.grid, [0.0; 2]);
        let mut basal_velocity = NodeField::new(&self.grid, [0.0; 2]);
        let mut heating = NodeField::new(&self.grid, 0.0);

        for (col, (i, j)) in level.columns().enumerate() {
            let u = |k: usize, c: usize| self.x[self.index(col, k, c)];
            basal_velocity[(i, j)] = [u(0, 0), u(0, 1)];
            if level.parameters[(i, j)].thickness > 0.0 {
                velocity[(i, j)] = [0, 1].map(|c| {
                    sigma
                        .windows(2)
                        .enumerate()
                        .map(|(k, s)| 0.5 * (u(k, c) + u(k + 1, c)) * (s[1] - s[0]))
                        .sum::<f64>()
                });
            }
            heating[(i, j)] = self
                .model
                .basal_frictional_heating(level, i, j, u(0, 0), u(0, 1));
        }

        self.exchange.update_ghosts(&mut velocity);
        self.exchange.update_ghosts(&mut basal_velocity);
        self.exchange.update_ghosts(&mut heating);
        StressBalanceOutput {
            velocity,
            basal_velocity,
            basal_frictional_heating: heating,
            report,
        }
    }
}
