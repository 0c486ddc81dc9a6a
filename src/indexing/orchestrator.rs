//! The indexing run state machine.
//!
//! Drives one pass: discover files, compute the fingerprint delta, retract
//! removed files, then fan chunking out over a blocking worker pool and
//! funnel results through the write coordinator one file at a time.
//! Per-file failures are collected, never fatal; only a missing root or an
//! unopenable store aborts the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::chunk::Chunk;
use crate::chunking::ChunkingEngine;
use crate::config::{IndexConfig, IndexOptions};
use crate::discovery::discover_files;
use crate::error::{IndexError, Result};
use crate::state::{PendingFile, StateStore, fingerprint};
use crate::stats::{IndexStats, Phase, Progress};

use super::coordinator::WriteCoordinator;

/// Cooperative cancellation flag for indexing runs. Cloneable; cancelling
/// any clone stops the run at the next file boundary.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of chunking one file on the worker pool.
type ChunkedFile = std::result::Result<(PendingFile, Vec<Chunk>, Vec<String>), (String, String)>;

pub struct IndexingOrchestrator {
    engine: ChunkingEngine,
    state: StateStore,
    coordinator: Arc<WriteCoordinator>,
    config: IndexConfig,
    cancel: CancelHandle,
    progress: watch::Sender<Progress>,
}

impl IndexingOrchestrator {
    pub fn new(
        engine: ChunkingEngine,
        state: StateStore,
        coordinator: Arc<WriteCoordinator>,
        config: IndexConfig,
        cancel: CancelHandle,
        progress: watch::Sender<Progress>,
    ) -> Self {
        Self {
            engine,
            state,
            coordinator,
            config,
            cancel,
            progress,
        }
    }

    pub async fn run(&self, opts: &IndexOptions) -> Result<IndexStats> {
        self.cancel.reset();
        let result = self.run_inner(opts).await;
        match &result {
            Ok(_) if self.cancel.is_cancelled() => self.set_phase(Phase::Cancelled, 0, 0),
            Ok(_) => self.set_phase(Phase::Done, 0, 0),
            Err(_) => self.set_phase(Phase::Failed, 0, 0),
        }
        result
    }

    async fn run_inner(&self, opts: &IndexOptions) -> Result<IndexStats> {
        let mut stats = IndexStats::default();

        self.set_phase(Phase::Discovering, 0, 0);
        let root = opts.root.clone();
        let exclude = self.config.exclude_dirs.clone();
        let include = opts.include_languages.clone();
        let discovered = tokio::task::spawn_blocking(move || {
            discover_files(&root, &exclude, include.as_deref())
        })
        .await
        .map_err(join_error)??;

        stats.files_seen = discovered.len();
        for file in &discovered {
            *stats
                .files_by_language
                .entry(file.language_tag.to_string())
                .or_insert(0) += 1;
        }
        info!(files = discovered.len(), root = %opts.root.display(), "discovery complete");

        self.set_phase(Phase::ComputingDelta, 0, 0);
        let state = self.state.clone();
        let force_full = opts.force_full;
        let delta = tokio::task::spawn_blocking(move || {
            state.compute_delta(&discovered, force_full)
        })
        .await
        .map_err(join_error)??;

        stats.files_unchanged = delta.unchanged.len();
        for (path, reason) in delta.unreadable {
            stats.record_failure(path, reason);
        }
        info!(
            added = delta.added.len(),
            modified = delta.modified.len(),
            removed = delta.removed.len(),
            unchanged = stats.files_unchanged,
            "delta computed"
        );

        for path in &delta.removed {
            // A record can drop out of discovery because a language filter
            // excluded it this run; only files gone from the tree get removed.
            if opts.include_languages.is_some() && opts.root.join(path).exists() {
                continue;
            }
            if let Some(record) = self.state.record(path)? {
                self.coordinator.retract_file(path, &record.chunk_ids).await?;
                self.state.bump_counter("chunks_retracted", record.chunk_ids.len() as u64)?;
                stats.chunks_retracted += record.chunk_ids.len() as u64;
            }
            self.state.commit_removal(path)?;
            stats.files_removed += 1;
        }

        let to_process: Vec<PendingFile> = delta
            .added
            .into_iter()
            .chain(delta.modified)
            .collect();
        let total = to_process.len();
        self.set_phase(Phase::ProcessingFiles, 0, total);

        let batch_size = opts.batch_size.unwrap_or(self.config.keyword_batch_files).max(1);
        let mut since_commit = 0usize;
        let mut processed = 0usize;

        let mut chunked = futures::stream::iter(to_process.into_iter().map(|pending| {
            let engine = self.engine.clone();
            async move {
                tokio::task::spawn_blocking(move || chunk_one(&engine, pending))
                    .await
                    .map_err(join_error)
            }
        }))
        .buffered(self.config.worker_count.max(1));

        while let Some(result) = chunked.next().await {
            if self.cancel.is_cancelled() {
                warn!("indexing cancelled, remaining files stay queued for the next run");
                break;
            }
            match result? {
                Ok((pending, chunks, warnings)) => {
                    stats.warnings.extend(warnings);
                    self.commit_file(&pending, &chunks, &mut stats).await?;
                }
                Err((path, reason)) => {
                    warn!(path, %reason, "file failed");
                    stats.record_failure(path, reason);
                }
            }
            processed += 1;
            since_commit += 1;
            if since_commit >= batch_size {
                self.coordinator.commit_keywords()?;
                since_commit = 0;
            }
            self.set_phase(Phase::ProcessingFiles, processed, total);
        }

        self.set_phase(Phase::Committing, processed, total);
        self.coordinator.commit_keywords()?;
        self.state.flush()?;

        info!(
            indexed = stats.files_indexed,
            unchanged = stats.files_unchanged,
            removed = stats.files_removed,
            failed = stats.files_failed,
            chunks = stats.chunks_created,
            "indexing run finished"
        );
        Ok(stats)
    }

    /// Apply one file's chunks through the coordinator and persist its
    /// record. The record write comes last; a crash before it leaves the
    /// in-flight marker to force re-indexing.
    async fn commit_file(
        &self,
        pending: &PendingFile,
        chunks: &[Chunk],
        stats: &mut IndexStats,
    ) -> Result<()> {
        let path = pending.file.rel_path.display().to_string();
        let old_ids = self
            .state
            .record(&path)?
            .map(|r| r.chunk_ids)
            .unwrap_or_default();

        self.state.begin_update(&path)?;
        match self.coordinator.apply(&path, chunks, &old_ids).await {
            Ok(retracted) => {
                self.state.commit_update(pending, chunks)?;
                self.state.bump_counter("chunks_created", chunks.len() as u64)?;
                self.state.bump_counter("chunks_retracted", retracted as u64)?;
                stats.files_indexed += 1;
                stats.chunks_created += chunks.len() as u64;
                stats.chunks_retracted += retracted as u64;
                for chunk in chunks {
                    *stats
                        .chunks_by_kind
                        .entry(chunk.kind.as_str().to_string())
                        .or_insert(0) += 1;
                }
            }
            Err(e) => {
                // Marker stays; next run treats the file as modified.
                stats.record_failure(path, e.to_string());
            }
        }
        Ok(())
    }

    fn set_phase(&self, phase: Phase, files_processed: usize, files_total: usize) {
        let _ = self.progress.send(Progress {
            phase,
            files_processed,
            files_total,
        });
    }
}

/// Read and chunk one file on the blocking pool. The content is hashed at
/// read time so the stored fingerprint always matches what was indexed,
/// even if the file changed after delta computation.
fn chunk_one(engine: &ChunkingEngine, mut pending: PendingFile) -> ChunkedFile {
    let rel = pending.file.rel_path.display().to_string();
    let bytes = std::fs::read(&pending.file.abs_path).map_err(|e| (rel.clone(), e.to_string()))?;
    let content = String::from_utf8(bytes).map_err(|_| (rel.clone(), "not valid UTF-8".to_string()))?;
    pending.fingerprint = fingerprint(&content);

    let outcome = engine.chunk(&content, pending.file.language_tag, &pending.file.rel_path);
    Ok((pending, outcome.chunks, outcome.warnings))
}

fn join_error(e: tokio::task::JoinError) -> IndexError {
    IndexError::State(format!("worker task failed: {e}"))
}
