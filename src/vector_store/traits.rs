//! Vector store backend trait definition
//!
//! Defines the interface that all vector storage backends must implement.

use async_trait::async_trait;

use super::VectorHit;
use super::error::VectorStoreError;
use crate::chunk::{Chunk, ChunkId};
use crate::embeddings::Embedding;

/// Trait for vector storage backends
///
/// Implementations must be Send + Sync for use with async runtimes.
/// All operations are async to support both embedded and remote backends.
#[async_trait]
pub trait VectorStoreBackend: Send + Sync {
    /// Insert or update chunks with their embeddings
    async fn upsert_chunks(
        &self,
        chunks_with_embeddings: Vec<(ChunkId, Embedding, Chunk)>,
    ) -> Result<(), VectorStoreError>;

    /// Search for similar chunks using a query vector, best first
    async fn search(
        &self,
        query_vector: Embedding,
        limit: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError>;

    /// Delete chunks by their IDs; unknown ids are ignored
    async fn delete_chunks(&self, chunk_ids: Vec<ChunkId>) -> Result<(), VectorStoreError>;

    /// Whether a chunk id is present
    async fn contains(&self, chunk_id: ChunkId) -> Result<bool, VectorStoreError>;

    /// Get the total number of vectors in the store
    async fn count(&self) -> Result<usize, VectorStoreError>;

    /// Clear all vectors
    async fn clear(&self) -> Result<(), VectorStoreError>;
}
