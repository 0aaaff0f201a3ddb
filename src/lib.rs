pub mod config;
mod core;
pub mod error;
pub mod network;
mod test_support;

// Re-export commonly used types for consumers and integration tests
pub use crate::core::finger_table::{Finger, FingerTable};
pub use crate::core::identifier::{Identifier, Ring, MAX_BITS};
pub use crate::core::storage::{Storage, Value};
pub use crate::core::Node;
pub use crate::error::ChordError;
pub use crate::network::{Lookup, Network};
