//! Write coordination for dual-store consistency.
//!
//! Per-file write order: embed and upsert vectors, replace keyword
//! documents, then retract stale chunk ids from both stores and the name
//! index.
//! Retraction runs last so a crash mid-update leaves stale chunks
//! retrievable rather than a file invisible; the in-flight marker in the
//! state store gets the file rewritten on the next run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::chunk::{Chunk, ChunkId};
use crate::embeddings::{Embedder, Embedding};
use crate::error::Result;
use crate::keyword::KeywordStore;
use crate::state::StateStore;
use crate::vector_store::VectorStore;

use super::retry::retry_with_backoff;

/// Applies chunk updates to both stores in a consistent order, at most one
/// in-flight write per path.
pub struct WriteCoordinator {
    embedder: Arc<dyn Embedder>,
    vectors: VectorStore,
    keywords: Arc<KeywordStore>,
    state: StateStore,
    embed_batch_size: usize,
    max_retries: u32,
    retry_initial_delay: Duration,
    in_flight: Mutex<HashSet<String>>,
    released: Notify,
}

impl WriteCoordinator {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: VectorStore,
        keywords: Arc<KeywordStore>,
        state: StateStore,
        embed_batch_size: usize,
        max_retries: u32,
        retry_initial_delay: Duration,
    ) -> Self {
        Self {
            embedder,
            vectors,
            keywords,
            state,
            embed_batch_size: embed_batch_size.max(1),
            max_retries,
            retry_initial_delay,
            in_flight: Mutex::new(HashSet::new()),
            released: Notify::new(),
        }
    }

    /// Write `new_chunks` for `path` and retract whatever of
    /// `old_chunk_ids` they do not replace. Returns the retracted count.
    ///
    /// Keyword documents are only queued; call [`commit_keywords`] to make
    /// them searchable.
    ///
    /// [`commit_keywords`]: WriteCoordinator::commit_keywords
    pub async fn apply(
        &self,
        path: &str,
        new_chunks: &[Chunk],
        old_chunk_ids: &[ChunkId],
    ) -> Result<usize> {
        self.acquire(path).await;
        let result = self.apply_inner(path, new_chunks, old_chunk_ids).await;
        self.release(path).await;
        result
    }

    async fn apply_inner(
        &self,
        path: &str,
        new_chunks: &[Chunk],
        old_chunk_ids: &[ChunkId],
    ) -> Result<usize> {
        let embeddings = self.embed_all(new_chunks).await?;
        let payload: Vec<(ChunkId, Embedding, Chunk)> = new_chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| (chunk.id, embedding, chunk.clone()))
            .collect();

        retry_with_backoff(
            || {
                let payload = payload.clone();
                async move { self.vectors.upsert_chunks(payload).await }
            },
            self.max_retries,
            self.retry_initial_delay,
        )
        .await?;

        // The vector tree overwrites by key, but tantivy appends. Queue a
        // delete for every id this write produces; within one commit the
        // deletes land before the adds, so exactly one document per chunk
        // survives a re-apply that keeps ids.
        let new_ids: Vec<ChunkId> = new_chunks.iter().map(|c| c.id).collect();
        self.keywords.delete_chunks(&new_ids)?;
        self.keywords.add_chunks(new_chunks)?;
        self.state.insert_symbols(new_chunks)?;

        // Ids the new chunk set no longer produces.
        let new_id_set: HashSet<ChunkId> = new_ids.into_iter().collect();
        let stale: Vec<ChunkId> = old_chunk_ids
            .iter()
            .filter(|id| !new_id_set.contains(id))
            .copied()
            .collect();
        if !stale.is_empty() {
            debug!(path, count = stale.len(), "retracting stale chunks");
            self.retract(&stale).await?;
        }
        Ok(stale.len())
    }

    /// Retract a file's chunks outright (file removed from the tree).
    pub async fn retract_file(&self, path: &str, chunk_ids: &[ChunkId]) -> Result<()> {
        self.acquire(path).await;
        let result = self.retract(chunk_ids).await;
        self.release(path).await;
        result
    }

    async fn retract(&self, chunk_ids: &[ChunkId]) -> Result<()> {
        retry_with_backoff(
            || {
                let ids = chunk_ids.to_vec();
                async move { self.vectors.delete_chunks(ids).await }
            },
            self.max_retries,
            self.retry_initial_delay,
        )
        .await?;
        self.keywords.delete_chunks(chunk_ids)?;
        self.state.remove_symbols(chunk_ids)?;
        Ok(())
    }

    /// Commit queued keyword writes and refresh the searcher.
    pub fn commit_keywords(&self) -> Result<()> {
        self.keywords.commit()
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Embedding>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.format_for_embedding()).collect();
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let batch_result = retry_with_backoff(
                || async { self.embedder.embed_batch(batch).await },
                self.max_retries,
                self.retry_initial_delay,
            )
            .await?;
            embeddings.extend(batch_result);
        }
        Ok(embeddings)
    }

    async fn acquire(&self, path: &str) {
        loop {
            {
                let mut in_flight = self.in_flight.lock().await;
                if in_flight.insert(path.to_string()) {
                    return;
                }
            }
            self.released.notified().await;
        }
    }

    async fn release(&self, path: &str) {
        self.in_flight.lock().await.remove(path);
        self.released.notify_waiters();
    }
}
