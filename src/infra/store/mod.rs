//! Backing document store adapters.

mod http;
mod memory;

pub use http::{HttpDocumentStore, classify_status};
pub use memory::{MemoryStore, StoreCalls};
