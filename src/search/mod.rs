//! Hybrid retrieval: keyword (BM25) and vector rankings fused with
//! Reciprocal Rank Fusion.
//!
//! Fusion works on ranks, not raw scores, so the two engines' incomparable
//! score scales never need calibrating: `score(c) = sum over engines of
//! 1 / (k + rank(c))`, with an absent chunk contributing nothing.

use std::collections::HashMap;

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::chunk::{Chunk, ChunkId, ChunkKind};
use crate::config::candidate_pool;
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::keyword::KeywordStore;
use crate::state::StateStore;
use crate::vector_store::VectorStore;

/// Which engines ranked a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Vector,
    Keyword,
    Both,
}

/// One retrieval hit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub chunk_id: ChunkId,
    /// Fused RRF score; comparable only within one response.
    pub score: f64,
    pub signal: Signal,
    pub chunk: Chunk,
}

/// Optional result filters, applied before truncation so a filtered search
/// still fills `limit` from deeper candidates.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub language: Option<String>,
    pub kind: Option<ChunkKind>,
}

impl SearchFilters {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(language) = &self.language {
            if chunk.language_tag != *language {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if chunk.kind != kind {
                return false;
            }
        }
        true
    }
}

/// Fuse two ranked candidate lists. Either list may be empty, in which case
/// the result degrades to the other engine's ranking order.
pub fn reciprocal_rank_fusion(
    vector_ranked: Vec<(ChunkId, Chunk)>,
    keyword_ranked: Vec<(ChunkId, Chunk)>,
    k: f64,
) -> Vec<QueryResult> {
    struct Fused {
        score: f64,
        in_vector: bool,
        in_keyword: bool,
        chunk: Chunk,
    }

    let mut fused: HashMap<ChunkId, Fused> = HashMap::new();

    for (rank, (chunk_id, chunk)) in vector_ranked.into_iter().enumerate() {
        let contribution = 1.0 / (k + (rank + 1) as f64);
        fused
            .entry(chunk_id)
            .and_modify(|f| {
                f.score += contribution;
                f.in_vector = true;
            })
            .or_insert(Fused {
                score: contribution,
                in_vector: true,
                in_keyword: false,
                chunk,
            });
    }
    for (rank, (chunk_id, chunk)) in keyword_ranked.into_iter().enumerate() {
        let contribution = 1.0 / (k + (rank + 1) as f64);
        fused
            .entry(chunk_id)
            .and_modify(|f| {
                f.score += contribution;
                f.in_keyword = true;
            })
            .or_insert(Fused {
                score: contribution,
                in_vector: false,
                in_keyword: true,
                chunk,
            });
    }

    let mut results: Vec<QueryResult> = fused
        .into_iter()
        .map(|(chunk_id, f)| QueryResult {
            chunk_id,
            score: f.score,
            signal: match (f.in_vector, f.in_keyword) {
                (true, true) => Signal::Both,
                (true, false) => Signal::Vector,
                (false, true) => Signal::Keyword,
                (false, false) => unreachable!("fused entry with no signal"),
            },
            chunk: f.chunk,
        })
        .collect();

    // Total order: score desc, then chunk id asc for deterministic ties.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    results
}

/// Query-side engine: owns handles to both stores and the embedder.
pub struct HybridRetriever {
    embedder: Arc<dyn Embedder>,
    vectors: VectorStore,
    keywords: Arc<KeywordStore>,
    state: StateStore,
    rrf_k: f64,
}

impl HybridRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        vectors: VectorStore,
        keywords: Arc<KeywordStore>,
        state: StateStore,
        rrf_k: f64,
    ) -> Self {
        Self {
            embedder,
            vectors,
            keywords,
            state,
            rrf_k,
        }
    }

    /// Hybrid search. Empty index or `limit == 0` returns `Ok(empty)`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<QueryResult>> {
        if limit == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let pool = candidate_pool(limit);

        let query_vector = self.embedder.embed(query).await?;
        let vector_ranked: Vec<(ChunkId, Chunk)> = self
            .vectors
            .search(query_vector, pool)
            .await?
            .into_iter()
            .map(|hit| (hit.chunk_id, hit.chunk))
            .collect();

        let keyword_ranked: Vec<(ChunkId, Chunk)> = self
            .keywords
            .search(query, pool)?
            .into_iter()
            .map(|(chunk_id, _, chunk)| (chunk_id, chunk))
            .collect();

        debug!(
            vector = vector_ranked.len(),
            keyword = keyword_ranked.len(),
            pool,
            "fusing candidate lists"
        );

        let mut results = reciprocal_rank_fusion(vector_ranked, keyword_ranked, self.rrf_k);
        results.retain(|r| filters.matches(&r.chunk));
        results.truncate(limit);
        Ok(results)
    }

    /// Exact-name lookup with prefix fallback, via the name index. Exact
    /// matches come first, then prefix matches, each ordered by chunk id.
    pub async fn lookup_symbol(
        &self,
        name: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<QueryResult>> {
        if limit == 0 || name.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for (entry, exact) in self.state.lookup_symbols(name)? {
            if let Some(kind) = filters.kind {
                if entry.kind != kind {
                    continue;
                }
            }
            if let Some(language) = &filters.language {
                if entry.language_tag != *language {
                    continue;
                }
            }
            // The chunk body lives in the keyword store; an entry whose
            // document has not been committed yet is skipped.
            let Some(chunk) = self.keywords.get_chunk(entry.chunk_id)? else {
                continue;
            };
            results.push(QueryResult {
                chunk_id: entry.chunk_id,
                score: if exact { 1.0 } else { 0.5 },
                signal: Signal::Keyword,
                chunk,
            });
            if results.len() == limit {
                break;
            }
        }
        Ok(results)
    }
}
