//! grantdb-text
//!
//! Tantivy-backed patent index. Each indexed document carries the serialized
//! patent as a stored blob, so hits resolve to full records without a second
//! lookup and the searchable fields and the blob are committed together.
pub mod error;
pub mod index;
pub mod tantivy_utils;

pub use error::IndexError;
pub use index::PatentIndex;
