//! Chunk model shared by the chunking pipeline and both retrieval stores.
//!
//! A chunk is the unit of indexing and retrieval: a contiguous line range of
//! a file plus enough context (name, kind, enclosing scope) to rank and
//! display it on its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The kind of unit a chunk represents.
///
/// Structural tiers produce the code kinds; sectioned chunking produces
/// `Block`; the window fallback produces `TextWindow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Module,
    Class,
    Function,
    Method,
    Interface,
    Struct,
    Block,
    TextWindow,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Module => "module",
            ChunkKind::Class => "class",
            ChunkKind::Function => "function",
            ChunkKind::Method => "method",
            ChunkKind::Interface => "interface",
            ChunkKind::Struct => "struct",
            ChunkKind::Block => "block",
            ChunkKind::TextWindow => "text_window",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "module" => Some(ChunkKind::Module),
            "class" => Some(ChunkKind::Class),
            "function" => Some(ChunkKind::Function),
            "method" => Some(ChunkKind::Method),
            "interface" => Some(ChunkKind::Interface),
            "struct" => Some(ChunkKind::Struct),
            "block" => Some(ChunkKind::Block),
            "text_window" => Some(ChunkKind::TextWindow),
            _ => None,
        }
    }

    /// Kinds that carry a call signature worth surfacing.
    pub fn is_callable(&self) -> bool {
        matches!(self, ChunkKind::Function | ChunkKind::Method)
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable chunk identifier.
///
/// Derived (UUID v5) from the identity tuple `(file_path, kind, name,
/// line_start)`, so re-chunking an unchanged file regenerates identical ids
/// and re-indexing is naturally idempotent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    pub fn derive(file_path: &Path, kind: ChunkKind, name: &str, line_start: u32) -> Self {
        // Unit separator keeps the tuple fields unambiguous.
        let key = format!(
            "{}\x1f{}\x1f{}\x1f{}",
            file_path.display(),
            kind.as_str(),
            name,
            line_start
        );
        ChunkId(Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()))
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(ChunkId)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        ChunkId(Uuid::from_bytes(bytes))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A retrievable unit of a file.
///
/// Invariants: `line_end >= line_start` (1-indexed, inclusive) and `content`
/// is the byte-exact slice of those lines, except when `synthetic` is true
/// (the empty-file placeholder, whose content is empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub kind: ChunkKind,
    /// Symbol or section name; empty for anonymous windows.
    pub name: String,
    pub content: String,
    pub file_path: PathBuf,
    pub language_tag: String,
    pub line_start: u32,
    pub line_end: u32,
    /// First line of a callable's declaration, trimmed.
    pub signature: Option<String>,
    /// Enclosing named scopes, outermost first.
    pub namespace_path: Vec<String>,
    pub parent_kind: Option<ChunkKind>,
    pub parent_name: Option<String>,
    /// True only for the zero-length chunk emitted for an empty file.
    pub synthetic: bool,
}

impl Chunk {
    pub fn line_count(&self) -> u32 {
        self.line_end - self.line_start + 1
    }

    /// Format the chunk for embedding with a context header so the vector
    /// captures where the code lives, not just what it says.
    pub fn format_for_embedding(&self) -> String {
        let mut header = format!("File: {}", self.file_path.display());
        if !self.namespace_path.is_empty() {
            header.push_str(&format!("\nScope: {}", self.namespace_path.join("::")));
        }
        if !self.name.is_empty() {
            header.push_str(&format!("\n{}: {}", self.kind, self.name));
        }
        if let Some(sig) = &self.signature {
            header.push_str(&format!("\nSignature: {sig}"));
        }
        format!("{header}\n\n{}", self.content)
    }
}
