//! Run configuration, loaded from TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discretization::vertical::{check_coarsening, VerticalGridError};
use crate::discretization::{GridError, GridTopology, Periodicity};
use crate::models::column_shear::SlidingLaw;
use crate::numerics::continuation::{ContinuationError, ContinuationParameters};
use crate::numerics::newton::NewtonArmijoSolver;
use crate::physics::flow_law::FlowLawConfig;
use crate::physics::parameters::{PhysicalConstants, SECONDS_PER_YEAR};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Vertical(#[from] VerticalGridError),
    #[error(transparent)]
    Continuation(#[from] ContinuationError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Map-plane grid and its partition into ranks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub mx: usize,
    pub my: usize,
    pub dx: f64,
    pub dy: f64,
    pub periodicity: Periodicity,
    pub procs_x: usize,
    pub procs_y: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            mx: 21,
            my: 3,
            dx: 5e3,
            dy: 5e3,
            periodicity: Periodicity::Y,
            procs_x: 1,
            procs_y: 1,
        }
    }
}

impl GridConfig {
    pub fn topology(&self, rank: usize) -> Result<GridTopology, GridError> {
        GridTopology::partition(
            self.mx,
            self.my,
            self.procs_x,
            self.procs_y,
            rank,
            1,
            self.periodicity,
            self.dx,
            self.dy,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlatterConfig {
    pub grid: GridConfig,
    /// Vertical levels of the finest grid.
    pub mz: usize,
    pub coarsening_factor: usize,
    /// Thickness below which a node does not count as ice-covered.
    pub min_thickness: f64,
    pub constants: PhysicalConstants,
    /// Length scale of the strain rate regularization.
    pub schoof_length: f64,
    /// Velocity scale of the strain rate regularization.
    pub schoof_velocity: f64,
    pub continuation: ContinuationParameters,
    pub newton: NewtonArmijoSolver,
    pub flow_law: FlowLawConfig,
    pub sliding: SlidingLaw,
}

impl Default for BlatterConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            mz: 5,
            coarsening_factor: 4,
            min_thickness: 10.0,
            constants: PhysicalConstants::default(),
            schoof_length: 1e6,
            schoof_velocity: 1.0 / SECONDS_PER_YEAR,
            continuation: ContinuationParameters::default(),
            newton: NewtonArmijoSolver::default(),
            flow_law: FlowLawConfig::default(),
            sliding: SlidingLaw::default(),
        }
    }
}

impl BlatterConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Number of vertical levels at every multigrid level.
    pub fn validate(&self) -> Result<Vec<usize>, ConfigError> {
        let levels = check_coarsening(self.mz, self.newton.mg_levels, self.coarsening_factor)?;
        self.continuation.validate()?;
        if !(self.schoof_length > 0.0 && self.schoof_velocity > 0.0) {
            return Err(ConfigError::Invalid(
                "schoof_length and schoof_velocity have to be positive".to_string(),
            ));
        }
        if self.min_thickness <= 0.0 {
            return Err(ConfigError::Invalid("min_thickness has to be positive".to_string()));
        }
        if self.newton.max_iterations == 0 {
            return Err(ConfigError::Invalid(
                "the nonlinear solver needs at least one iteration".to_string(),
            ));
        }
        Ok(levels)
    }

    /// Regularization of the target problem, `(schoof_velocity / schoof_length)^2`.
    pub fn eps_target(&self) -> f64 {
        (self.schoof_velocity / self.schoof_length).powi(2)
    }
}
