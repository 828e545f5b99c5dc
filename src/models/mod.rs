pub mod column_shear;
pub mod setups;
