pub mod domain;
pub mod sensor_simulator;

pub use domain::*;
pub use sensor_simulator::*;
