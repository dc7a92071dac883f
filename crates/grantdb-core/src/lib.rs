//! grantdb-core
//!
//! Shared vocabulary for the grant pipeline: domain records, error types,
//! layered settings, and the seams (`DocumentStore`, `TaskProcessor`) the
//! storage and ingestion crates plug into.
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::Settings;
pub use error::{ConfigError, StoreError};
pub use traits::{DocumentStore, TaskContext, TaskProcessor};
pub use types::{
    Classification, LinkState, LinkStatus, Patent, RawRecord, StorageId, Task, TaskKind, XmlElement, XmlNode,
};
