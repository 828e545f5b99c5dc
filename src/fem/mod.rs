pub mod q1;
pub mod quadrature;

pub use quadrature::Quadrature;
