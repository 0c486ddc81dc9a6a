//! Sectioned tier for semi-structured text formats.
//!
//! No grammar, just recognizable boundaries: heading lines in prose,
//! `[section]` headers and top-level keys in config files, terminated
//! statements in SQL. Every section becomes a `Block` chunk. A file where
//! no boundary matches produces nothing and falls through to the window
//! tier.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::chunk::{Chunk, ChunkId, ChunkKind};
use crate::language::SectionStyle;

use super::line_spans;

// Markdown ATX headings; org-mode stars stay separate so that `* item`
// bullet lists in prose do not open sections.
static ATX_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,6}\s+(\S.*)$").unwrap());
static ORG_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\*{1,6}\s+(\S.*)$").unwrap());

// `[section]` / `[[array.of.tables]]` headers, or an unindented `key:` line.
static CONFIG_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\[+([^\]]+)\]+\s*|([A-Za-z0-9_.$-]+):.*)$").unwrap());

pub(crate) fn chunk_sections(
    text: &str,
    tag: &str,
    rel_path: &Path,
    style: SectionStyle,
) -> Vec<Chunk> {
    match style {
        SectionStyle::Heading => by_boundaries(text, tag, rel_path, |line| heading_name(line, tag)),
        SectionStyle::ConfigSection => by_boundaries(text, tag, rel_path, config_section_name),
        SectionStyle::Statement => by_statements(text, tag, rel_path),
    }
}

fn heading_name(line: &str, tag: &str) -> Option<String> {
    let pattern = if tag == "org" { &ORG_HEADING } else { &ATX_HEADING };
    pattern.captures(line).map(|c| c[1].trim_end().to_string())
}

fn config_section_name(line: &str) -> Option<String> {
    CONFIG_SECTION.captures(line).map(|c| {
        c.get(1)
            .or_else(|| c.get(2))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default()
    })
}

/// Split on boundary lines. The region before the first boundary becomes an
/// unnamed preamble block; each boundary opens a section that runs to the
/// line before the next one.
fn by_boundaries(
    text: &str,
    tag: &str,
    rel_path: &Path,
    boundary: impl Fn(&str) -> Option<String>,
) -> Vec<Chunk> {
    let spans = line_spans(text);
    // (start line index, name) per section
    let mut starts: Vec<(usize, String)> = Vec::new();
    for (idx, &(lo, hi)) in spans.iter().enumerate() {
        let line = text[lo..hi].trim_end_matches(['\n', '\r']);
        if let Some(name) = boundary(line) {
            starts.push((idx, name));
        }
    }
    if starts.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::with_capacity(starts.len() + 1);
    if starts[0].0 > 0 {
        let preamble = &text[spans[0].0..spans[starts[0].0 - 1].1];
        if !preamble.trim().is_empty() {
            chunks.push(block(text, &spans, 0, starts[0].0 - 1, String::new(), tag, rel_path));
        }
    }
    for (i, (start_idx, name)) in starts.iter().enumerate() {
        let end_idx = starts
            .get(i + 1)
            .map(|(next, _)| next - 1)
            .unwrap_or(spans.len() - 1);
        chunks.push(block(text, &spans, *start_idx, end_idx, name.clone(), tag, rel_path));
    }
    chunks
}

/// Split on statement terminators. Trailing text after the last `;` still
/// becomes a block, so a boundary-free file yields one whole-file block.
fn by_statements(text: &str, tag: &str, rel_path: &Path) -> Vec<Chunk> {
    let spans = line_spans(text);
    if spans.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut stmt_start: Option<usize> = None;
    for (idx, &(lo, hi)) in spans.iter().enumerate() {
        let line = &text[lo..hi];
        if stmt_start.is_none() && !line.trim().is_empty() {
            stmt_start = Some(idx);
        }
        if line.trim_end().ends_with(';') {
            if let Some(start_idx) = stmt_start.take() {
                let name = statement_name(text, &spans, start_idx);
                chunks.push(block(text, &spans, start_idx, idx, name, tag, rel_path));
            }
        }
    }
    if let Some(start_idx) = stmt_start {
        let name = statement_name(text, &spans, start_idx);
        chunks.push(block(text, &spans, start_idx, spans.len() - 1, name, tag, rel_path));
    }
    chunks
}

fn statement_name(text: &str, spans: &[(usize, usize)], start_idx: usize) -> String {
    let (lo, hi) = spans[start_idx];
    text[lo..hi]
        .split_whitespace()
        .next()
        .map(|w| w.to_ascii_lowercase())
        .unwrap_or_default()
}

fn block(
    text: &str,
    spans: &[(usize, usize)],
    start_idx: usize,
    end_idx: usize,
    name: String,
    tag: &str,
    rel_path: &Path,
) -> Chunk {
    let line_start = (start_idx + 1) as u32;
    Chunk {
        id: ChunkId::derive(rel_path, ChunkKind::Block, &name, line_start),
        kind: ChunkKind::Block,
        name,
        content: text[spans[start_idx].0..spans[end_idx].1].to_string(),
        file_path: rel_path.to_path_buf(),
        language_tag: tag.to_string(),
        line_start,
        line_end: (end_idx + 1) as u32,
        signature: None,
        namespace_path: Vec::new(),
        parent_kind: None,
        parent_name: None,
        synthetic: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn markdown_headings_open_sections() {
        let text = "intro text\n\n# Install\nrun make\n\n## Deps\nnone\n";
        let chunks = chunk_sections(text, "markdown", Path::new("README.md"), SectionStyle::Heading);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].name, "");
        assert_eq!(chunks[1].name, "Install");
        assert_eq!(chunks[2].name, "Deps");
        assert_eq!((chunks[1].line_start, chunks[1].line_end), (3, 5));
        assert!(chunks[2].content.starts_with("## Deps\n"));
        assert!(chunks.iter().all(|c| c.kind == ChunkKind::Block));
    }

    #[test]
    fn markdown_bullets_do_not_open_sections() {
        let text = "# Tasks\n* first item\n* second item\n";
        let chunks = chunk_sections(text, "markdown", Path::new("TODO.md"), SectionStyle::Heading);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].name, "Tasks");
        assert!(chunks[0].content.contains("* second item"));
    }

    #[test]
    fn org_stars_open_sections() {
        let text = "* Top\nbody\n** Nested\nmore\n";
        let chunks = chunk_sections(text, "org", Path::new("notes.org"), SectionStyle::Heading);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name, "Top");
        assert_eq!(chunks[1].name, "Nested");
    }

    #[test]
    fn prose_without_headings_falls_through() {
        let text = "just a paragraph\nwith two lines\n";
        let chunks = chunk_sections(text, "markdown", Path::new("notes.md"), SectionStyle::Heading);
        assert!(chunks.is_empty());
    }

    #[test]
    fn toml_tables_and_yaml_keys_are_sections() {
        let toml = "[package]\nname = \"x\"\n\n[dependencies]\nserde = \"1\"\n";
        let chunks =
            chunk_sections(toml, "toml", Path::new("Cargo.toml"), SectionStyle::ConfigSection);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name, "package");
        assert_eq!(chunks[1].name, "dependencies");

        let yaml = "services:\n  web:\n    image: nginx\nvolumes:\n  data: {}\n";
        let chunks =
            chunk_sections(yaml, "yaml", Path::new("compose.yaml"), SectionStyle::ConfigSection);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name, "services");
        assert_eq!(chunks[1].name, "volumes");
        // Indented keys do not open sections.
        assert!(chunks[0].content.contains("image: nginx"));
    }

    #[test]
    fn sql_splits_on_statement_terminators() {
        let sql = "CREATE TABLE users (\n  id INT\n);\n\nSELECT *\nFROM users;\n";
        let chunks = chunk_sections(sql, "sql", Path::new("schema.sql"), SectionStyle::Statement);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name, "create");
        assert_eq!(chunks[1].name, "select");
        assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 3));
        assert_eq!((chunks[1].line_start, chunks[1].line_end), (5, 6));
    }

    #[test]
    fn unterminated_sql_tail_is_still_a_block() {
        let sql = "SELECT 1;\nSELECT 2\n";
        let chunks = chunk_sections(sql, "sql", Path::new("q.sql"), SectionStyle::Statement);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].content, "SELECT 2\n");
    }
}
