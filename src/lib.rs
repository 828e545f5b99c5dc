pub mod config;
pub mod discretization;
pub mod fem;
pub mod models;
pub mod numerics;
pub mod physics;
pub mod processing;
pub mod stressbalance;

pub use config::BlatterConfig;
pub use stressbalance::{Blatter, StressBalanceError, StressBalanceOutput};
