pub mod domain;
pub mod feed;
pub mod vitals_ingest;

pub use domain::*;
pub use feed::*;
pub use vitals_ingest::*;
