//! Vector storage capability.
//!
//! The nearest-neighbor engine sits behind [`VectorStoreBackend`]; the
//! default backend is an embedded sled-backed store doing a brute-force
//! cosine scan, which is plenty for repository-scale indexes and keeps the
//! crate self-contained. [`VectorStore`] is the cloneable handle the rest
//! of the crate uses.

pub mod embedded;
pub mod error;
pub mod traits;

// Re-exports
pub use embedded::EmbeddedBackend;
pub use error::VectorStoreError;
pub use traits::VectorStoreBackend;

use std::path::Path;
use std::sync::Arc;

use crate::chunk::{Chunk, ChunkId};
use crate::embeddings::Embedding;

/// One vector search hit. `score` is cosine similarity in [-1, 1].
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub chunk_id: ChunkId,
    pub score: f32,
    pub chunk: Chunk,
}

/// Handle to a vector store backend. Clones share the backend.
#[derive(Clone)]
pub struct VectorStore {
    backend: Arc<dyn VectorStoreBackend>,
}

impl VectorStore {
    pub fn new(backend: Arc<dyn VectorStoreBackend>) -> Self {
        Self { backend }
    }

    /// Open the embedded backend at `path`.
    pub fn open_embedded(path: &Path) -> Result<Self, VectorStoreError> {
        Ok(Self::new(Arc::new(EmbeddedBackend::open(path)?)))
    }

    pub async fn upsert_chunks(
        &self,
        chunks_with_embeddings: Vec<(ChunkId, Embedding, Chunk)>,
    ) -> Result<(), VectorStoreError> {
        self.backend.upsert_chunks(chunks_with_embeddings).await
    }

    pub async fn search(
        &self,
        query_vector: Embedding,
        limit: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        self.backend.search(query_vector, limit).await
    }

    pub async fn delete_chunks(&self, chunk_ids: Vec<ChunkId>) -> Result<(), VectorStoreError> {
        self.backend.delete_chunks(chunk_ids).await
    }

    pub async fn contains(&self, chunk_id: ChunkId) -> Result<bool, VectorStoreError> {
        self.backend.contains(chunk_id).await
    }

    pub async fn count(&self) -> Result<usize, VectorStoreError> {
        self.backend.count().await
    }

    pub async fn clear(&self) -> Result<(), VectorStoreError> {
        self.backend.clear().await
    }
}
