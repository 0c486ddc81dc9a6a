//! The `CodeIndex` facade.
//!
//! Owns every store handle and wires the pipeline together. Searches take
//! the inner lock in read mode; `clear` takes it in write mode, so a clear
//! never interleaves with an in-flight search or run and readers never see
//! a half-cleared index.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::info;

use crate::chunking::ChunkingEngine;
use crate::config::{IndexConfig, IndexOptions};
use crate::embeddings::{Embedder, HashEmbedder};
use crate::error::Result;
use crate::indexing::{CancelHandle, IndexingOrchestrator, WriteCoordinator};
use crate::keyword::KeywordStore;
use crate::language::LanguageRegistry;
use crate::search::{HybridRetriever, QueryResult, SearchFilters};
use crate::state::StateStore;
use crate::stats::{IndexStats, Progress};
use crate::vector_store::VectorStore;

struct Stores {
    state: StateStore,
    vectors: VectorStore,
    keywords: Arc<KeywordStore>,
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingEngine,
}

/// A local hybrid code index: tiered chunking, fingerprint-incremental
/// updates, and RRF-fused retrieval over embedded stores.
pub struct CodeIndex {
    config: IndexConfig,
    stores: RwLock<Stores>,
    cancel: CancelHandle,
    progress_tx: watch::Sender<Progress>,
}

impl CodeIndex {
    /// Open all stores with the default deterministic embedder.
    pub fn open(config: IndexConfig) -> Result<Self> {
        Self::open_with_embedder(config, Arc::new(HashEmbedder::default()))
    }

    /// Open all stores with a caller-provided embedding backend.
    pub fn open_with_embedder(config: IndexConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let state = StateStore::open(&config.state_path)?;
        let keywords = Arc::new(KeywordStore::open(&config.keyword_path)?);
        let vectors = VectorStore::open_embedded(&config.vector_path)?;
        let chunking = ChunkingEngine::new(
            Arc::new(LanguageRegistry::new()),
            config.window_lines,
            config.min_structural_bytes,
        );
        let (progress_tx, _) = watch::channel(Progress::idle());

        info!(
            state = %config.state_path.display(),
            keyword = %config.keyword_path.display(),
            vectors = %config.vector_path.display(),
            "index opened"
        );
        Ok(Self {
            config,
            stores: RwLock::new(Stores {
                state,
                vectors,
                keywords,
                embedder,
                chunking,
            }),
            cancel: CancelHandle::default(),
            progress_tx,
        })
    }

    /// Run one incremental indexing pass over `opts.root`.
    pub async fn index(&self, opts: &IndexOptions) -> Result<IndexStats> {
        let stores = self.stores.read().await;
        let coordinator = Arc::new(WriteCoordinator::new(
            stores.embedder.clone(),
            stores.vectors.clone(),
            stores.keywords.clone(),
            stores.state.clone(),
            self.config.embed_batch_size,
            self.config.max_retries,
            self.config.retry_initial_delay,
        ));
        let orchestrator = IndexingOrchestrator::new(
            stores.chunking.clone(),
            stores.state.clone(),
            coordinator,
            self.config.clone(),
            self.cancel.clone(),
            self.progress_tx.clone(),
        );
        orchestrator.run(opts).await
    }

    /// Hybrid search over the committed index.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<QueryResult>> {
        let stores = self.stores.read().await;
        self.retriever(&stores).search(query, limit, filters).await
    }

    /// Symbol lookup by name: exact matches first, then prefix matches.
    pub async fn lookup_symbol(
        &self,
        name: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<QueryResult>> {
        let stores = self.stores.read().await;
        self.retriever(&stores).lookup_symbol(name, limit, filters).await
    }

    /// Cumulative index totals from persisted state.
    pub async fn stats(&self) -> Result<IndexStats> {
        let stores = self.stores.read().await;
        let records = stores.state.all_records()?;

        let mut stats = IndexStats {
            files_seen: records.len(),
            files_indexed: records.len(),
            chunks_created: stores.state.counter("chunks_created")?,
            chunks_retracted: stores.state.counter("chunks_retracted")?,
            ..IndexStats::default()
        };
        let mut by_language: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_kind: BTreeMap<String, u64> = BTreeMap::new();
        for record in &records {
            *by_language.entry(record.language_tag.clone()).or_insert(0) += 1;
            for (kind, count) in &record.kind_counts {
                *by_kind.entry(kind.clone()).or_insert(0) += count;
            }
        }
        stats.files_by_language = by_language;
        stats.chunks_by_kind = by_kind;
        Ok(stats)
    }

    /// Drop everything: records, name index, and both stores. Atomic with
    /// respect to searches; concurrent queries see the index either fully
    /// populated or fully empty.
    pub async fn clear(&self) -> Result<()> {
        let stores = self.stores.write().await;
        stores.vectors.clear().await?;
        stores.keywords.clear()?;
        stores.state.clear()?;
        info!("index cleared");
        Ok(())
    }

    /// Handle for cancelling an in-flight indexing run.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Subscribe to run progress updates.
    pub fn subscribe_progress(&self) -> watch::Receiver<Progress> {
        self.progress_tx.subscribe()
    }

    fn retriever(&self, stores: &Stores) -> HybridRetriever {
        HybridRetriever::new(
            stores.embedder.clone(),
            stores.vectors.clone(),
            stores.keywords.clone(),
            stores.state.clone(),
            self.config.rrf_k,
        )
    }
}
