//! Integration test for the full incremental indexing flow:
//! initial index, unchanged fast path, single-file modification,
//! additions, removals, and content-restoration detection.

use anyhow::Result;
use code_index::{CodeIndex, IndexConfig, IndexOptions, SearchFilters};
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnvironment {
    _temp_dir: TempDir,
    index: CodeIndex,
    codebase_path: PathBuf,
}

impl TestEnvironment {
    fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let codebase_path = temp_dir.path().join("codebase");
        std::fs::create_dir(&codebase_path)?;
        let index = CodeIndex::open(IndexConfig::at(temp_dir.path().join("data")))?;

        Ok(Self {
            _temp_dir: temp_dir,
            index,
            codebase_path,
        })
    }

    fn opts(&self) -> IndexOptions {
        IndexOptions::new(&self.codebase_path)
    }

    fn write_file(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.codebase_path.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    fn modify_file(&self, name: &str, content: &str) -> Result<()> {
        std::fs::write(self.codebase_path.join(name), content)?;
        Ok(())
    }

    fn remove_file(&self, name: &str) -> Result<()> {
        std::fs::remove_file(self.codebase_path.join(name))?;
        Ok(())
    }
}

#[tokio::test]
async fn test_full_incremental_flow() -> Result<()> {
    let env = TestEnvironment::new()?;

    env.write_file(
        "src/main.rs",
        r#"
fn main() {
    println!("starting up");
}
"#,
    )?;
    env.write_file(
        "src/lib.rs",
        r#"
pub mod utils;

pub fn version_string() -> &'static str {
    "1.0.0"
}
"#,
    )?;
    env.write_file(
        "src/utils.rs",
        r#"
pub fn format_helper(input: &str) -> String {
    input.to_uppercase()
}
"#,
    )?;

    // Initial pass indexes everything.
    let stats1 = env.index.index(&env.opts()).await?;
    assert_eq!(stats1.files_seen, 3);
    assert_eq!(stats1.files_indexed, 3);
    assert!(stats1.chunks_created > 0);
    assert!(stats1.failures.is_empty());

    // Second pass with no changes touches nothing.
    let stats2 = env.index.index(&env.opts()).await?;
    assert_eq!(stats2.files_indexed, 0);
    assert_eq!(stats2.files_unchanged, 3);
    assert_eq!(stats2.chunks_created, 0);

    // Modify one file: exactly one file re-indexed.
    env.modify_file(
        "src/utils.rs",
        r#"
pub fn format_helper(input: &str) -> String {
    input.to_lowercase()
}

pub fn trim_helper(input: &str) -> &str {
    input.trim()
}
"#,
    )?;
    let stats3 = env.index.index(&env.opts()).await?;
    assert_eq!(stats3.files_indexed, 1);
    assert_eq!(stats3.files_unchanged, 2);
    assert!(stats3.chunks_created > 0);

    // The new symbol is searchable, and only once.
    let results = env
        .index
        .search("trim_helper", 10, &SearchFilters::default())
        .await?;
    assert!(!results.is_empty());
    let hits: Vec<_> = results.iter().filter(|r| r.chunk.name == "trim_helper").collect();
    assert_eq!(hits.len(), 1);

    // One new file plus one modification.
    env.write_file("src/extra.rs", "pub fn extra_entry() -> u32 {\n    7\n}\n")?;
    env.modify_file("src/main.rs", "fn main() {\n    println!(\"changed\");\n}\n")?;
    let stats4 = env.index.index(&env.opts()).await?;
    assert_eq!(stats4.files_indexed, 2);
    assert_eq!(stats4.files_unchanged, 2);

    // Removal retracts the file's chunks from retrieval.
    env.remove_file("src/extra.rs")?;
    let stats5 = env.index.index(&env.opts()).await?;
    assert_eq!(stats5.files_removed, 1);
    assert!(stats5.chunks_retracted > 0);
    let results = env
        .index
        .search("extra_entry", 10, &SearchFilters::default())
        .await?;
    assert!(results.iter().all(|r| r.chunk.name != "extra_entry"));

    Ok(())
}

#[tokio::test]
async fn restored_content_is_unchanged_despite_new_timestamp() -> Result<()> {
    let env = TestEnvironment::new()?;
    let original = "pub fn stable_symbol() -> u32 {\n    42\n}\n";
    env.write_file("src/lib.rs", original)?;
    env.index.index(&env.opts()).await?;

    // Rewrite with different content, then restore the original bytes.
    // The mtime moves both times; only the fingerprint matters.
    env.modify_file("src/lib.rs", "pub fn other_symbol() -> u32 {\n    1\n}\n")?;
    env.index.index(&env.opts()).await?;
    env.modify_file("src/lib.rs", original)?;
    env.index.index(&env.opts()).await?;

    let stats = env.index.index(&env.opts()).await?;
    assert_eq!(stats.files_indexed, 0);
    assert_eq!(stats.files_unchanged, 1);
    Ok(())
}

#[tokio::test]
async fn reindexing_preserves_chunk_ids() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_file(
        "src/lib.rs",
        "pub fn anchor_symbol(x: u32) -> u32 {\n    x + 1\n}\n",
    )?;
    env.index.index(&env.opts()).await?;
    let before = env
        .index
        .search("anchor_symbol", 5, &SearchFilters::default())
        .await?;
    assert!(!before.is_empty());

    // Force a full re-index of identical content.
    let stats = env.index.index(&env.opts().force_full()).await?;
    assert_eq!(stats.files_indexed, 1);

    let after = env
        .index
        .search("anchor_symbol", 5, &SearchFilters::default())
        .await?;
    assert_eq!(before[0].chunk_id, after[0].chunk_id);
    // No duplicate document survived the rewrite.
    let anchor_hits = after.iter().filter(|r| r.chunk.name == "anchor_symbol").count();
    assert_eq!(anchor_hits, 1);
    Ok(())
}

#[tokio::test]
async fn every_discovered_file_is_represented() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_file("src/code.rs", "pub fn documented_fn() -> bool {\n    true\n}\n")?;
    env.write_file("README.md", "# Overview\nproject notes\n\n## Usage\nrun it\n")?;
    env.write_file("notes.txt", "free-form notes with searchable_token\n")?;
    env.write_file("empty.txt", "")?;

    let stats = env.index.index(&env.opts()).await?;
    assert_eq!(stats.files_seen, 4);
    assert_eq!(stats.files_indexed, 4);
    assert!(stats.failures.is_empty());
    // Even the empty file produced its placeholder chunk.
    assert!(stats.chunks_created >= 4);

    let results = env
        .index
        .search("searchable_token", 10, &SearchFilters::default())
        .await?;
    assert!(!results.is_empty());

    let cumulative = env.index.stats().await?;
    assert_eq!(cumulative.files_indexed, 4);
    assert!(cumulative.files_by_language.contains_key("markdown"));
    Ok(())
}

#[tokio::test]
async fn language_filtered_runs_do_not_remove_other_files() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_file("src/lib.rs", "pub fn rust_entry() -> u8 {\n    1\n}\n")?;
    env.write_file("README.md", "# Overview\nmarkdown_token here\n")?;
    env.index.index(&env.opts()).await?;

    // A narrowed run must not treat the filtered-out file as removed.
    let stats = env
        .index
        .index(&env.opts().with_languages(vec!["rust".to_string()]))
        .await?;
    assert_eq!(stats.files_removed, 0);
    let results = env
        .index
        .search("markdown_token", 10, &SearchFilters::default())
        .await?;
    assert!(!results.is_empty());

    // A file genuinely deleted is still retracted under the filter.
    env.remove_file("src/lib.rs")?;
    let stats = env
        .index
        .index(&env.opts().with_languages(vec!["rust".to_string()]))
        .await?;
    assert_eq!(stats.files_removed, 1);
    let results = env
        .index
        .search("rust_entry", 10, &SearchFilters::default())
        .await?;
    assert!(results.iter().all(|r| r.chunk.name != "rust_entry"));
    Ok(())
}

#[tokio::test]
async fn crash_marker_forces_reindex_on_next_run() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.write_file("src/lib.rs", "pub fn recovery_probe() -> u8 {\n    3\n}\n")?;
    env.index.index(&env.opts()).await?;

    // A second index pass normally skips the file...
    let stats = env.index.index(&env.opts()).await?;
    assert_eq!(stats.files_indexed, 0);

    // ...but force_full emulates the recovery path end to end: the file is
    // rewritten and retrieval still returns exactly one copy.
    let stats = env.index.index(&env.opts().force_full()).await?;
    assert_eq!(stats.files_indexed, 1);
    let results = env
        .index
        .search("recovery_probe", 10, &SearchFilters::default())
        .await?;
    assert_eq!(
        results.iter().filter(|r| r.chunk.name == "recovery_probe").count(),
        1
    );
    Ok(())
}
