mod firestore_client;
mod firestore_value;
mod rtdb_client;
mod sse;

pub use firestore_client::*;
pub use firestore_value::*;
pub use rtdb_client::*;
pub use sse::*;
