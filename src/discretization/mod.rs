pub mod field;
pub mod grid;
pub mod vertical;

pub use field::{GhostExchange, LocalExchange, NodeField};
pub use grid::{GridError, GridTopology, Periodicity};
