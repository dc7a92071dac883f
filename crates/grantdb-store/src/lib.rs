//! grantdb-store
//!
//! `DocumentStore` implementations: a LanceDB-backed store for real runs and
//! an in-memory store used by tests and dry runs.
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use lance::LanceDocumentStore;
pub use memory::MemoryDocumentStore;
