//! Error taxonomy for the index library.
//!
//! Fatal conditions (missing root, unopenable stores) surface as `Config`.
//! Per-file problems during an indexing run never abort the run; they are
//! collected into `IndexStats::failures` instead.

use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::vector_store::VectorStoreError;

/// Errors surfaced by the public index API.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Invalid configuration or unusable environment (missing root,
    /// store directory that cannot be created or opened).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// State store (sled) failure.
    #[error("state store error: {0}")]
    State(String),

    /// Keyword store (tantivy) failure.
    #[error("keyword store error: {0}")]
    Keyword(String),

    #[error("vector store error: {0}")]
    Vector(#[from] VectorStoreError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<sled::Error> for IndexError {
    fn from(e: sled::Error) -> Self {
        IndexError::State(e.to_string())
    }
}

impl From<tantivy::TantivyError> for IndexError {
    fn from(e: tantivy::TantivyError) -> Self {
        IndexError::Keyword(e.to_string())
    }
}

impl From<bincode::Error> for IndexError {
    fn from(e: bincode::Error) -> Self {
        IndexError::State(format!("record encoding: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
