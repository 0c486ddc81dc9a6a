//! Window fallback tier.
//!
//! Partitions a file into fixed-size, line-aligned windows with no overlap
//! and no gaps. This tier cannot fail and cannot produce zero chunks, so it
//! terminates the tier ladder for every input.

use std::path::Path;

use crate::chunk::{Chunk, ChunkId, ChunkKind};

use super::line_spans;

/// Split `text` into `window_lines`-sized windows. An empty file yields one
/// synthetic zero-length chunk so downstream stores always see the file.
pub(crate) fn chunk_windows(
    text: &str,
    tag: &str,
    rel_path: &Path,
    window_lines: usize,
) -> Vec<Chunk> {
    if text.is_empty() {
        return vec![Chunk {
            id: ChunkId::derive(rel_path, ChunkKind::TextWindow, "", 1),
            kind: ChunkKind::TextWindow,
            name: String::new(),
            content: String::new(),
            file_path: rel_path.to_path_buf(),
            language_tag: tag.to_string(),
            line_start: 1,
            line_end: 1,
            signature: None,
            namespace_path: Vec::new(),
            parent_kind: None,
            parent_name: None,
            synthetic: true,
        }];
    }

    let spans = line_spans(text);
    let window_lines = window_lines.max(1);
    let mut chunks = Vec::with_capacity(spans.len().div_ceil(window_lines));

    for (window_idx, window) in spans.chunks(window_lines).enumerate() {
        let first_line = window_idx * window_lines + 1;
        let last_line = first_line + window.len() - 1;
        let start_byte = window[0].0;
        let end_byte = window[window.len() - 1].1;
        chunks.push(Chunk {
            id: ChunkId::derive(rel_path, ChunkKind::TextWindow, "", first_line as u32),
            kind: ChunkKind::TextWindow,
            name: String::new(),
            content: text[start_byte..end_byte].to_string(),
            file_path: rel_path.to_path_buf(),
            language_tag: tag.to_string(),
            line_start: first_line as u32,
            line_end: last_line as u32,
            signature: None,
            namespace_path: Vec::new(),
            parent_kind: None,
            parent_name: None,
            synthetic: false,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn windows(text: &str, size: usize) -> Vec<Chunk> {
        chunk_windows(text, "text", Path::new("notes.txt"), size)
    }

    #[test]
    fn empty_file_gets_one_synthetic_chunk() {
        let chunks = windows("", 120);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].synthetic);
        assert_eq!(chunks[0].content, "");
        assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 1));
    }

    #[test]
    fn windows_partition_exactly() {
        let text = (1..=10)
            .map(|i| format!("line {i}\n"))
            .collect::<String>();
        let chunks = windows(&text, 3);
        assert_eq!(chunks.len(), 4);

        // No gaps, no overlap: concatenating contents rebuilds the file.
        let rebuilt: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(rebuilt, text);

        let mut next_line = 1;
        for chunk in &chunks {
            assert_eq!(chunk.line_start, next_line);
            next_line = chunk.line_end + 1;
        }
        assert_eq!(chunks.last().unwrap().line_end, 10);
    }

    #[test]
    fn file_without_trailing_newline_is_covered() {
        let text = "a\nb\nc";
        let chunks = windows(text, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "a\nb\n");
        assert_eq!(chunks[1].content, "c");
        assert_eq!((chunks[1].line_start, chunks[1].line_end), (3, 3));
    }

    #[test]
    fn window_ids_are_distinct_and_stable() {
        let text = "x\n".repeat(250);
        let first = windows(&text, 120);
        let second = windows(&text, 120);
        assert_eq!(first.len(), 3);
        let ids: Vec<_> = first.iter().map(|c| c.id).collect();
        assert_eq!(ids, second.iter().map(|c| c.id).collect::<Vec<_>>());
        assert_ne!(ids[0], ids[1]);
    }
}
