//! Embedded vector store backend.
//!
//! Persists `(embedding, chunk)` pairs in a sled tree keyed by chunk id and
//! answers searches with a brute-force cosine scan. No index structure, no
//! external process; linear scan over a few tens of thousands of vectors is
//! well under typical query budgets.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::VectorStoreError;
use super::traits::VectorStoreBackend;
use super::VectorHit;
use crate::chunk::{Chunk, ChunkId};
use crate::embeddings::Embedding;

#[derive(Serialize, Deserialize)]
struct StoredVector {
    embedding: Embedding,
    chunk: Chunk,
}

pub struct EmbeddedBackend {
    db: sled::Db,
    vectors: sled::Tree,
}

impl EmbeddedBackend {
    pub fn open(path: &Path) -> Result<Self, VectorStoreError> {
        let db = sled::open(path).map_err(|e| VectorStoreError::storage(e.to_string()))?;
        let vectors = db
            .open_tree("vectors")
            .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        Ok(Self { db, vectors })
    }
}

#[async_trait]
impl VectorStoreBackend for EmbeddedBackend {
    async fn upsert_chunks(
        &self,
        chunks_with_embeddings: Vec<(ChunkId, Embedding, Chunk)>,
    ) -> Result<(), VectorStoreError> {
        for (chunk_id, embedding, chunk) in chunks_with_embeddings {
            let stored = StoredVector { embedding, chunk };
            let bytes = bincode::serialize(&stored)
                .map_err(|e| VectorStoreError::serialization(e.to_string()))?;
            self.vectors
                .insert(chunk_id.as_bytes(), bytes)
                .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        }
        self.db
            .flush_async()
            .await
            .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Embedding,
        limit: usize,
    ) -> Result<Vec<VectorHit>, VectorStoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut hits = Vec::new();
        for item in self.vectors.iter() {
            let (key, bytes) = item.map_err(|e| VectorStoreError::query(e.to_string()))?;
            let stored: StoredVector = bincode::deserialize(&bytes)
                .map_err(|e| VectorStoreError::serialization(e.to_string()))?;
            if stored.embedding.len() != query_vector.len() {
                return Err(VectorStoreError::DimensionMismatch {
                    expected: stored.embedding.len(),
                    actual: query_vector.len(),
                });
            }
            let score = cosine_similarity(&query_vector, &stored.embedding);
            let chunk_id = chunk_id_from_key(&key)?;
            hits.push(VectorHit {
                chunk_id,
                score,
                chunk: stored.chunk,
            });
        }
        // Best first; ties broken by id for stable ordering.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_chunks(&self, chunk_ids: Vec<ChunkId>) -> Result<(), VectorStoreError> {
        for chunk_id in chunk_ids {
            self.vectors
                .remove(chunk_id.as_bytes())
                .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn contains(&self, chunk_id: ChunkId) -> Result<bool, VectorStoreError> {
        self.vectors
            .contains_key(chunk_id.as_bytes())
            .map_err(|e| VectorStoreError::query(e.to_string()))
    }

    async fn count(&self) -> Result<usize, VectorStoreError> {
        Ok(self.vectors.len())
    }

    async fn clear(&self) -> Result<(), VectorStoreError> {
        self.vectors
            .clear()
            .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| VectorStoreError::storage(e.to_string()))?;
        Ok(())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn chunk_id_from_key(key: &[u8]) -> Result<ChunkId, VectorStoreError> {
    let bytes: [u8; 16] = key
        .try_into()
        .map_err(|_| VectorStoreError::serialization("malformed chunk id key".to_string()))?;
    Ok(ChunkId::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_chunk(name: &str) -> Chunk {
        let path = PathBuf::from("src/lib.rs");
        Chunk {
            id: ChunkId::derive(&path, ChunkKind::Function, name, 1),
            kind: ChunkKind::Function,
            name: name.to_string(),
            content: format!("fn {name}() {{}}"),
            file_path: path,
            language_tag: "rust".to_string(),
            line_start: 1,
            line_end: 1,
            signature: None,
            namespace_path: Vec::new(),
            parent_kind: None,
            parent_name: None,
            synthetic: false,
        }
    }

    async fn backend() -> (TempDir, EmbeddedBackend) {
        let dir = TempDir::new().unwrap();
        let backend = EmbeddedBackend::open(&dir.path().join("vectors")).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn upsert_search_returns_nearest_first() {
        let (_dir, backend) = backend().await;
        let a = test_chunk("alpha");
        let b = test_chunk("beta");
        backend
            .upsert_chunks(vec![
                (a.id, vec![1.0, 0.0], a.clone()),
                (b.id, vec![0.0, 1.0], b.clone()),
            ])
            .await
            .unwrap();

        let hits = backend.search(vec![0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, a.id);
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn upsert_replaces_existing_vector() {
        let (_dir, backend) = backend().await;
        let a = test_chunk("alpha");
        backend
            .upsert_chunks(vec![(a.id, vec![1.0, 0.0], a.clone())])
            .await
            .unwrap();
        backend
            .upsert_chunks(vec![(a.id, vec![0.0, 1.0], a.clone())])
            .await
            .unwrap();

        assert_eq!(backend.count().await.unwrap(), 1);
        let hits = backend.search(vec![0.0, 1.0], 1).await.unwrap();
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn delete_and_clear_remove_vectors() {
        let (_dir, backend) = backend().await;
        let a = test_chunk("alpha");
        let b = test_chunk("beta");
        backend
            .upsert_chunks(vec![
                (a.id, vec![1.0, 0.0], a.clone()),
                (b.id, vec![0.0, 1.0], b.clone()),
            ])
            .await
            .unwrap();

        backend.delete_chunks(vec![a.id]).await.unwrap();
        assert!(!backend.contains(a.id).await.unwrap());
        assert!(backend.contains(b.id).await.unwrap());

        backend.clear().await.unwrap();
        assert_eq!(backend.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_store_searches_empty() {
        let (_dir, backend) = backend().await;
        let hits = backend.search(vec![1.0, 0.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let (_dir, backend) = backend().await;
        let a = test_chunk("alpha");
        backend
            .upsert_chunks(vec![(a.id, vec![1.0, 0.0], a)])
            .await
            .unwrap();
        let err = backend.search(vec![1.0, 0.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }
}
