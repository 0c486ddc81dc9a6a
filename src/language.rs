//! Language detection and the registry mapping tags to chunking structure.
//!
//! A language tag (`"rust"`, `"markdown"`, ...) is derived from the file
//! extension. The registry classifies each tag once, at construction:
//! grammar-backed languages get structural chunking, text formats with
//! recognizable section boundaries get sectioned chunking, and everything
//! else falls straight through to the window tier.

use std::collections::HashMap;
use std::path::Path;

/// Grammars available to the structural tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
}

impl Grammar {
    pub fn language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
        }
    }
}

/// How the sectioned tier finds boundaries in a tag without a grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionStyle {
    /// Markdown/org style heading lines.
    Heading,
    /// `[section]` headers or top-level `key:` lines (yaml, toml, ini).
    ConfigSection,
    /// Semicolon-terminated statements (sql).
    Statement,
}

/// Chunking structure class for a language tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Structure {
    Structured(Grammar),
    Sectioned(SectionStyle),
    Plain,
}

/// Extension and tag tables, resolved once at index construction.
pub struct LanguageRegistry {
    structures: HashMap<&'static str, Structure>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        let mut structures: HashMap<&'static str, Structure> = HashMap::new();
        structures.insert("rust", Structure::Structured(Grammar::Rust));
        structures.insert("python", Structure::Structured(Grammar::Python));
        structures.insert("javascript", Structure::Structured(Grammar::JavaScript));
        structures.insert("typescript", Structure::Structured(Grammar::TypeScript));
        structures.insert("tsx", Structure::Structured(Grammar::Tsx));
        structures.insert("go", Structure::Structured(Grammar::Go));

        structures.insert("markdown", Structure::Sectioned(SectionStyle::Heading));
        structures.insert("rst", Structure::Sectioned(SectionStyle::Heading));
        structures.insert("org", Structure::Sectioned(SectionStyle::Heading));
        structures.insert("yaml", Structure::Sectioned(SectionStyle::ConfigSection));
        structures.insert("toml", Structure::Sectioned(SectionStyle::ConfigSection));
        structures.insert("ini", Structure::Sectioned(SectionStyle::ConfigSection));
        structures.insert("sql", Structure::Sectioned(SectionStyle::Statement));

        Self { structures }
    }

    /// Language tag for a file path, from its extension. Unknown extensions
    /// map to `"text"` so every discovered file gets a tag.
    pub fn detect(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("rs") => "rust",
            Some("py" | "pyi") => "python",
            Some("js" | "mjs" | "cjs" | "jsx") => "javascript",
            Some("ts" | "mts" | "cts") => "typescript",
            Some("tsx") => "tsx",
            Some("go") => "go",
            Some("md" | "markdown") => "markdown",
            Some("rst") => "rst",
            Some("org") => "org",
            Some("yaml" | "yml") => "yaml",
            Some("toml") => "toml",
            Some("ini" | "cfg") => "ini",
            Some("sql") => "sql",
            Some("json") => "json",
            Some("sh" | "bash") => "shell",
            Some("c" | "h") => "c",
            Some("cc" | "cpp" | "cxx" | "hpp") => "cpp",
            Some("java") => "java",
            Some("rb") => "ruby",
            _ => "text",
        }
    }

    /// Structure class for a tag. Tags without an entry (c, java, plain
    /// text, ...) chunk as `Plain`.
    pub fn structure(&self, tag: &str) -> Structure {
        self.structures.get(tag).copied().unwrap_or(Structure::Plain)
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn detects_tags_from_extensions() {
        assert_eq!(LanguageRegistry::detect(Path::new("src/lib.rs")), "rust");
        assert_eq!(LanguageRegistry::detect(Path::new("a/b.py")), "python");
        assert_eq!(LanguageRegistry::detect(Path::new("app.tsx")), "tsx");
        assert_eq!(LanguageRegistry::detect(Path::new("README.md")), "markdown");
        assert_eq!(LanguageRegistry::detect(Path::new("Cargo.toml")), "toml");
        assert_eq!(LanguageRegistry::detect(Path::new("q.SQL")), "sql");
    }

    #[test]
    fn unknown_extensions_fall_back_to_text() {
        assert_eq!(LanguageRegistry::detect(Path::new("notes.xyz")), "text");
        assert_eq!(LanguageRegistry::detect(Path::new("LICENSE")), "text");
    }

    #[test]
    fn registry_classifies_structure() {
        let registry = LanguageRegistry::new();
        assert!(matches!(
            registry.structure("rust"),
            Structure::Structured(Grammar::Rust)
        ));
        assert!(matches!(
            registry.structure("markdown"),
            Structure::Sectioned(SectionStyle::Heading)
        ));
        assert!(matches!(
            registry.structure("sql"),
            Structure::Sectioned(SectionStyle::Statement)
        ));
        // Known tag without grammar or section style still chunks.
        assert!(matches!(registry.structure("java"), Structure::Plain));
        assert!(matches!(registry.structure("text"), Structure::Plain));
    }
}
