//! Remote table handles: endpoint validation, the per-URL cache, and the
//! in-memory table used by tests and the demo binary.

mod filter;
pub mod memory;
pub mod registry;

pub use memory::{InMemoryTable, InMemoryTableFactory};
pub use registry::{Endpoint, HandleCreationError, TableHandle, TableRegistry};
