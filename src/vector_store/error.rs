//! Vector store error type, shared by all backends.

use thiserror::Error;

/// Errors that can occur during vector store operations
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// Backend storage failure
    #[error("Storage failed: {0}")]
    Storage(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    Query(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Vector dimensionality did not match the store
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorStoreError {
    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a query error
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
