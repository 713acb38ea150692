mod error;
mod feed_event_router;
mod persistence_writer;
mod reading_normalizer;
mod reading_service;
mod status_classifier;

pub use error::*;
pub use feed_event_router::*;
pub use persistence_writer::*;
pub use reading_normalizer::*;
pub use reading_service::*;
pub use status_classifier::*;
