mod reading_generator;
mod simulator_service;

pub use reading_generator::*;
pub use simulator_service::*;
