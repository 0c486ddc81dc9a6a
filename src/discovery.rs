//! File discovery: walking the repository root.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{IndexError, Result};
use crate::language::LanguageRegistry;

/// A file selected for indexing.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    pub abs_path: PathBuf,
    /// Path relative to the walk root; the identity used in records and ids.
    pub rel_path: PathBuf,
    pub language_tag: &'static str,
}

/// Walk `root`, skipping excluded directory names, and tag every regular
/// file with its language. A missing or non-directory root is fatal.
pub fn discover_files(
    root: &Path,
    exclude_dirs: &[String],
    include_languages: Option<&[String]>,
) -> Result<Vec<DiscoveredFile>> {
    if !root.is_dir() {
        return Err(IndexError::Config(format!(
            "index root is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            let name = entry.file_name().to_string_lossy();
            !exclude_dirs.iter().any(|d| d == name.as_ref())
        } else {
            true
        }
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let abs_path = entry.into_path();
        let tag = LanguageRegistry::detect(&abs_path);
        if let Some(included) = include_languages {
            if !included.iter().any(|t| t == tag) {
                continue;
            }
        }
        let rel_path = abs_path
            .strip_prefix(root)
            .unwrap_or(&abs_path)
            .to_path_buf();
        files.push(DiscoveredFile {
            abs_path,
            rel_path,
            language_tag: tag,
        });
    }

    // Stable order keeps runs reproducible.
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_EXCLUDE_DIRS;
    use tempfile::TempDir;

    fn excludes() -> Vec<String> {
        DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect()
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "content\n").unwrap();
    }

    #[test]
    fn walks_and_tags_files() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.rs");
        touch(dir.path(), "docs/guide.md");
        touch(dir.path(), "LICENSE");

        let files = discover_files(dir.path(), &excludes(), None).unwrap();
        assert_eq!(files.len(), 3);
        let tags: Vec<_> = files
            .iter()
            .map(|f| (f.rel_path.to_str().unwrap(), f.language_tag))
            .collect();
        assert!(tags.contains(&("src/main.rs", "rust")));
        assert!(tags.contains(&("docs/guide.md", "markdown")));
        assert!(tags.contains(&("LICENSE", "text")));
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/lib.rs");
        touch(dir.path(), "node_modules/pkg/index.js");
        touch(dir.path(), "target/debug/out.rs");

        let files = discover_files(dir.path(), &excludes(), None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].rel_path.to_str().unwrap(), "src/lib.rs");
    }

    #[test]
    fn language_filter_applies() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.rs");
        touch(dir.path(), "b.py");

        let files =
            discover_files(dir.path(), &excludes(), Some(&["python".to_string()])).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].language_tag, "python");
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let err = discover_files(Path::new("/does/not/exist"), &excludes(), None).unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
    }
}
