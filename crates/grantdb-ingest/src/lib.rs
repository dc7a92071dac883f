//! grantdb-ingest
//!
//! Everything between "here is a link" and "the grants are searchable":
//! duplicate suppression, admission, the bounded task queue, download,
//! recursive archive extraction, grant parsing, and the per-task processor
//! that stores and indexes each grant.
pub mod admission;
pub mod archive;
pub mod downloader;
pub mod error;
pub mod link_guard;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod queue;

pub use admission::{Accepted, Admission, AdmissionError, Rejection};
pub use archive::Extractor;
pub use downloader::Downloader;
pub use error::{ArchiveError, DecodeError, IngestError};
pub use link_guard::{link_hash, Claim, LinkGuard};
pub use pipeline::Pipeline;
pub use processor::IngestProcessor;
pub use queue::{QueueError, TaskQueue};
