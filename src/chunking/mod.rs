//! Tiered chunking engine.
//!
//! Three tiers, tried in order of how much structure they recover:
//! structural (grammar-backed definitions), sectioned (boundary scanning
//! for prose/config/sql), and line windows. Each tier falls through on
//! zero output, and the window tier always produces at least one chunk,
//! so `chunk` is total: it never fails and never returns an empty vec.

mod sectioned;
mod structural;
mod windows;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::chunk::Chunk;
use crate::language::{LanguageRegistry, Structure};

/// Byte spans of each line, terminator included. The spans partition the
/// text exactly, which is what lets every tier slice whole lines.
pub(crate) fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, b) in text.bytes().enumerate() {
        if b == b'\n' {
            spans.push((start, idx + 1));
            start = idx + 1;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

/// Result of chunking one file. Warnings record tier fallthroughs worth
/// surfacing in run stats; they are never errors.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub chunks: Vec<Chunk>,
    pub warnings: Vec<String>,
}

/// The tier ladder. Cheap to clone and share across workers.
#[derive(Clone)]
pub struct ChunkingEngine {
    registry: Arc<LanguageRegistry>,
    window_lines: usize,
    min_structural_bytes: usize,
}

impl ChunkingEngine {
    pub fn new(
        registry: Arc<LanguageRegistry>,
        window_lines: usize,
        min_structural_bytes: usize,
    ) -> Self {
        Self {
            registry,
            window_lines,
            min_structural_bytes,
        }
    }

    /// Chunk one file. Infallible; the returned vec is never empty.
    pub fn chunk(&self, text: &str, tag: &str, rel_path: &Path) -> ChunkOutcome {
        let mut warnings = Vec::new();

        match self.registry.structure(tag) {
            Structure::Structured(grammar) => {
                match structural::chunk_structural(
                    text,
                    tag,
                    rel_path,
                    grammar,
                    self.min_structural_bytes,
                ) {
                    Some(chunks) if !chunks.is_empty() => {
                        return ChunkOutcome { chunks, warnings };
                    }
                    Some(_) => {
                        debug!(path = %rel_path.display(), tag, "no structural matches, using windows");
                    }
                    None => {
                        warnings.push(format!(
                            "{}: {} parse failed, fell back to windows",
                            rel_path.display(),
                            tag
                        ));
                    }
                }
            }
            Structure::Sectioned(style) => {
                let chunks = sectioned::chunk_sections(text, tag, rel_path, style);
                if !chunks.is_empty() {
                    return ChunkOutcome { chunks, warnings };
                }
                debug!(path = %rel_path.display(), tag, "no section boundaries, using windows");
            }
            Structure::Plain => {}
        }

        let chunks = windows::chunk_windows(text, tag, rel_path, self.window_lines);
        ChunkOutcome { chunks, warnings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkKind;
    use std::path::Path;

    fn engine() -> ChunkingEngine {
        ChunkingEngine::new(Arc::new(LanguageRegistry::new()), 120, 10)
    }

    #[test]
    fn line_spans_partition_the_text() {
        assert_eq!(line_spans(""), vec![]);
        assert_eq!(line_spans("a\nb\n"), vec![(0, 2), (2, 4)]);
        assert_eq!(line_spans("a\nb"), vec![(0, 2), (2, 3)]);
    }

    #[test]
    fn rust_source_uses_the_structural_tier() {
        let outcome = engine().chunk(
            "fn compute_total(x: u32) -> u32 {\n    x * 2\n}\n",
            "rust",
            Path::new("src/math.rs"),
        );
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].kind, ChunkKind::Function);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn markdown_uses_the_sectioned_tier() {
        let outcome = engine().chunk(
            "# Title\nbody\n## Sub\nmore\n",
            "markdown",
            Path::new("README.md"),
        );
        assert_eq!(outcome.chunks.len(), 2);
        assert!(outcome.chunks.iter().all(|c| c.kind == ChunkKind::Block));
    }

    #[test]
    fn structured_tag_with_no_matches_falls_to_windows() {
        // Valid Rust, but only statements the walker ignores.
        let outcome = engine().chunk("use std::fmt;\n", "rust", Path::new("src/uses.rs"));
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].kind, ChunkKind::TextWindow);
    }

    #[test]
    fn plain_text_goes_straight_to_windows() {
        let outcome = engine().chunk("some notes\n", "text", Path::new("notes.txt"));
        assert_eq!(outcome.chunks.len(), 1);
        assert_eq!(outcome.chunks[0].kind, ChunkKind::TextWindow);
    }

    #[test]
    fn chunking_never_returns_empty() {
        let engine = engine();
        for (text, tag) in [
            ("", "rust"),
            ("", "text"),
            ("x", "markdown"),
            ("#!/bin/sh\nls\n", "shell"),
        ] {
            let outcome = engine.chunk(text, tag, Path::new("f"));
            assert!(!outcome.chunks.is_empty(), "{tag:?} produced no chunks");
        }
    }
}
