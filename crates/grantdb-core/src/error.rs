use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by a `DocumentStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage call exceeded {0:?}")]
    Timeout(Duration),

    #[error("Storage backend failed: {0}")]
    Backend(String),

    #[error("Stored document could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Wrap any backend error by its display form.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
