mod event;
mod feed;
mod patient_store;
mod reading;
mod result;

pub use event::*;
pub use feed::*;
pub use patient_store::*;
pub use reading::*;
pub use result::*;
