//! code-index: local hybrid retrieval over source repositories.
//!
//! Three subsystems behind one facade:
//! - a tiered chunking pipeline (syntax-aware, section-aware, then line
//!   windows) that never fails and never leaves a file unrepresented,
//! - a fingerprint-based incremental state store that re-indexes only what
//!   changed,
//! - hybrid retrieval fusing vector and keyword rankings with Reciprocal
//!   Rank Fusion.
//!
//! The embedding model and nearest-neighbor engine are capabilities behind
//! traits; deterministic embedded defaults ship in-crate so the whole
//! pipeline runs offline.

pub mod chunk;
pub mod chunking;
pub mod config;
pub mod discovery;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod indexing;
pub mod keyword;
pub mod language;
pub mod search;
pub mod state;
pub mod stats;
pub mod vector_store;

pub use chunk::{Chunk, ChunkId, ChunkKind};
pub use config::{IndexConfig, IndexOptions};
pub use engine::CodeIndex;
pub use error::{IndexError, Result};
pub use indexing::CancelHandle;
pub use search::{QueryResult, SearchFilters, Signal};
pub use stats::{IndexStats, Phase, Progress};
