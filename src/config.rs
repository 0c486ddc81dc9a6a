//! Index configuration.
//!
//! All tunables live here so callers construct indexes explicitly instead of
//! reading ambient globals. `IndexConfig::at` derives the store layout from a
//! single data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default exclusion list for discovery, by directory name.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "build",
    "out",
    "dist",
    "__pycache__",
    "venv",
    "env",
    "third_party",
    ".idea",
    ".vscode",
];

/// Configuration for a [`crate::CodeIndex`].
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Sled database holding file records, the name index, and counters.
    pub state_path: PathBuf,
    /// Tantivy index directory.
    pub keyword_path: PathBuf,
    /// Embedded vector store directory.
    pub vector_path: PathBuf,
    /// Fallback window size in lines.
    pub window_lines: usize,
    /// Structural chunks smaller than this many bytes are dropped
    /// (the fallback tiers still cover every line of the file).
    pub min_structural_bytes: usize,
    /// Texts per embedding batch.
    pub embed_batch_size: usize,
    /// Files between keyword store commits.
    pub keyword_batch_files: usize,
    /// Chunking worker pool size.
    pub worker_count: usize,
    /// Per-file store write retries.
    pub max_retries: u32,
    /// Initial backoff delay; doubles per attempt.
    pub retry_initial_delay: Duration,
    /// Rank fusion constant.
    pub rrf_k: f64,
    /// Directory names skipped during discovery.
    pub exclude_dirs: Vec<String>,
}

impl IndexConfig {
    /// Build a config with all stores under `data_dir`.
    pub fn at(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            state_path: data_dir.join("state"),
            keyword_path: data_dir.join("keyword"),
            vector_path: data_dir.join("vectors"),
            window_lines: 120,
            min_structural_bytes: 10,
            embed_batch_size: 32,
            keyword_batch_files: 16,
            worker_count: num_cpus::get(),
            max_retries: 3,
            retry_initial_delay: Duration::from_millis(100),
            rrf_k: 60.0,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Candidate pool depth fetched from each store before fusion.
pub fn candidate_pool(limit: usize) -> usize {
    (limit * 4).max(50)
}

/// Options for a single indexing run.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Repository root to walk.
    pub root: PathBuf,
    /// Restrict the run to these language tags; `None` indexes everything.
    pub include_languages: Option<Vec<String>>,
    /// Override for `keyword_batch_files`.
    pub batch_size: Option<usize>,
    /// Treat every discovered file as modified, ignoring fingerprints.
    pub force_full: bool,
}

impl IndexOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include_languages: None,
            batch_size: None,
            force_full: false,
        }
    }

    pub fn with_languages(mut self, tags: Vec<String>) -> Self {
        self.include_languages = Some(tags);
        self
    }

    pub fn force_full(mut self) -> Self {
        self.force_full = true;
        self
    }
}
