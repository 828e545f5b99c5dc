pub mod flow_law;
pub mod node_type;
pub mod parameters;
