//! Run statistics and progress reporting.

use std::collections::BTreeMap;

use serde::Serialize;

/// Phases of an indexing run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Discovering,
    ComputingDelta,
    ProcessingFiles,
    Committing,
    Done,
    Failed,
    Cancelled,
}

/// Progress snapshot published on the watch channel during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    pub files_processed: usize,
    pub files_total: usize,
}

impl Progress {
    pub fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            files_processed: 0,
            files_total: 0,
        }
    }
}

/// One per-file failure, reported but never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Outcome of one indexing run, or cumulative index totals from `stats()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IndexStats {
    /// Files discovered under the root.
    pub files_seen: usize,
    /// Files whose chunks were (re)written this run.
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_removed: usize,
    pub files_failed: usize,
    pub chunks_created: u64,
    pub chunks_retracted: u64,
    pub files_by_language: BTreeMap<String, usize>,
    pub chunks_by_kind: BTreeMap<String, u64>,
    pub failures: Vec<FileFailure>,
    /// Tier fallthrough notes from the chunking engine.
    pub warnings: Vec<String>,
}

impl IndexStats {
    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.files_failed += 1;
        self.failures.push(FileFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}
