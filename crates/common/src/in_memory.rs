mod feed;
mod patient_store;

pub use feed::*;
pub use patient_store::*;
