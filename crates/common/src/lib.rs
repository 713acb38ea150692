pub mod cipher;
pub mod domain;
pub mod firebase;
pub mod in_memory;
pub mod telemetry;

pub use cipher::*;
pub use domain::*;
pub use firebase::*;
pub use in_memory::*;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockFeedPublisher;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockFeedSubscriber;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockPatientStore;
