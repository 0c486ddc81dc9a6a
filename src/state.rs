//! Incremental indexing state.
//!
//! A sled database with one tree per concern: file records keyed by
//! relative path, in-flight markers for crash recovery, the symbol name
//! index, and cumulative counters. Change detection compares SHA-256
//! content fingerprints, never timestamps.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::chunk::{Chunk, ChunkId, ChunkKind};
use crate::discovery::DiscoveredFile;
use crate::error::{IndexError, Result};

const TREE_FILES: &str = "files";
const TREE_PENDING: &str = "pending";
const TREE_NAMES: &str = "names";
const TREE_NAMES_BY_ID: &str = "names_by_id";
const TREE_COUNTERS: &str = "counters";

/// SHA-256 hex digest of file content.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Persisted record of one indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub fingerprint: String,
    pub language_tag: String,
    pub chunk_ids: Vec<ChunkId>,
    /// Current chunk count per kind, for cumulative stats.
    pub kind_counts: BTreeMap<String, u64>,
    /// Unix seconds at commit time. Informational only.
    pub indexed_at: u64,
}

/// One entry in the symbol name index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub chunk_id: ChunkId,
    pub name: String,
    pub kind: ChunkKind,
    pub language_tag: String,
}

/// A discovered file together with the content and fingerprint read during
/// delta computation.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub file: DiscoveredFile,
    pub fingerprint: String,
}

/// Result of comparing a discovery pass against stored records.
#[derive(Debug, Default)]
pub struct Delta {
    pub added: Vec<PendingFile>,
    pub modified: Vec<PendingFile>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
    /// Files that could not be read or were not valid UTF-8.
    pub unreadable: Vec<(String, String)>,
}

/// Sled-backed index state. Clones share the same database.
#[derive(Clone)]
pub struct StateStore {
    db: sled::Db,
    files: sled::Tree,
    pending: sled::Tree,
    names: sled::Tree,
    names_by_id: sled::Tree,
    counters: sled::Tree,
}

impl StateStore {
    /// Open or create the state database. Failure here is fatal.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| IndexError::Config(format!("cannot open state store: {e}")))?;
        let open_tree = |name: &str| {
            db.open_tree(name)
                .map_err(|e| IndexError::Config(format!("cannot open state tree {name}: {e}")))
        };
        Ok(Self {
            files: open_tree(TREE_FILES)?,
            pending: open_tree(TREE_PENDING)?,
            names: open_tree(TREE_NAMES)?,
            names_by_id: open_tree(TREE_NAMES_BY_ID)?,
            counters: open_tree(TREE_COUNTERS)?,
            db,
        })
    }

    pub fn record(&self, path: &str) -> Result<Option<FileRecord>> {
        match self.files.get(path.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn all_records(&self) -> Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        for item in self.files.iter() {
            let (_, bytes) = item?;
            records.push(bincode::deserialize(&bytes)?);
        }
        Ok(records)
    }

    /// Classify discovered files against stored records.
    ///
    /// Reads each file once to fingerprint it; the content itself is not
    /// retained. Paths left with an in-flight marker by a crashed run are
    /// forced `modified` so their stores get rewritten.
    pub fn compute_delta(&self, discovered: &[DiscoveredFile], force_full: bool) -> Result<Delta> {
        let mut delta = Delta::default();
        let mut seen: HashSet<String> = HashSet::with_capacity(discovered.len());

        for file in discovered {
            let rel = file.rel_path.display().to_string();
            seen.insert(rel.clone());

            let content = match std::fs::read(&file.abs_path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(s) => s,
                    Err(_) => {
                        debug!(path = %rel, "skipping non-UTF-8 file");
                        delta.unreadable.push((rel, "not valid UTF-8".to_string()));
                        continue;
                    }
                },
                Err(e) => {
                    delta.unreadable.push((rel, e.to_string()));
                    continue;
                }
            };
            let fp = fingerprint(&content);
            let pending = PendingFile {
                file: file.clone(),
                fingerprint: fp.clone(),
            };

            match self.record(&rel)? {
                None => delta.added.push(pending),
                Some(record) => {
                    let in_flight = self.pending.contains_key(rel.as_bytes())?;
                    if in_flight {
                        warn!(path = %rel, "recovering interrupted write, forcing re-index");
                    }
                    if force_full || in_flight || record.fingerprint != fp {
                        delta.modified.push(pending);
                    } else {
                        delta.unchanged.push(rel);
                    }
                }
            }
        }

        for item in self.files.iter() {
            let (key, _) = item?;
            let path = String::from_utf8_lossy(&key).to_string();
            if !seen.contains(&path) {
                delta.removed.push(path);
            }
        }

        Ok(delta)
    }

    /// Mark a path as having a store write in flight.
    pub fn begin_update(&self, path: &str) -> Result<()> {
        self.pending.insert(path.as_bytes(), &[])?;
        Ok(())
    }

    /// Persist the record for a freshly written file and clear its marker.
    /// This is the last step of a file update; a crash before this point
    /// leaves the marker in place for recovery.
    pub fn commit_update(&self, file: &PendingFile, chunks: &[Chunk]) -> Result<()> {
        let path = file.file.rel_path.display().to_string();
        let mut kind_counts: BTreeMap<String, u64> = BTreeMap::new();
        for chunk in chunks {
            *kind_counts.entry(chunk.kind.as_str().to_string()).or_insert(0) += 1;
        }
        let record = FileRecord {
            path: path.clone(),
            fingerprint: file.fingerprint.clone(),
            language_tag: file.file.language_tag.to_string(),
            chunk_ids: chunks.iter().map(|c| c.id).collect(),
            kind_counts,
            indexed_at: unix_now(),
        };
        self.files.insert(path.as_bytes(), bincode::serialize(&record)?)?;
        self.pending.remove(path.as_bytes())?;
        Ok(())
    }

    /// Drop the record for a removed file, returning it so the caller can
    /// retract its chunks from the stores.
    pub fn commit_removal(&self, path: &str) -> Result<Option<FileRecord>> {
        self.pending.remove(path.as_bytes())?;
        match self.files.remove(path.as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    // Symbol name index. Keys are `name NUL chunk_id` so an exact lookup is
    // a prefix scan of `name NUL` and a prefix lookup is a scan of `name`.

    pub fn insert_symbols(&self, chunks: &[Chunk]) -> Result<()> {
        for chunk in chunks {
            if chunk.name.is_empty() {
                continue;
            }
            let entry = SymbolEntry {
                chunk_id: chunk.id,
                name: chunk.name.clone(),
                kind: chunk.kind,
                language_tag: chunk.language_tag.clone(),
            };
            let key = name_key(&chunk.name, chunk.id);
            self.names.insert(&key, bincode::serialize(&entry)?)?;
            self.names_by_id.insert(chunk.id.as_bytes(), key)?;
        }
        Ok(())
    }

    pub fn remove_symbols(&self, ids: &[ChunkId]) -> Result<()> {
        for id in ids {
            if let Some(key) = self.names_by_id.remove(id.as_bytes())? {
                self.names.remove(key)?;
            }
        }
        Ok(())
    }

    /// Entries whose name matches exactly, then entries whose name has the
    /// query as a proper prefix. Each group ordered by chunk id.
    pub fn lookup_symbols(&self, name: &str) -> Result<Vec<(SymbolEntry, bool)>> {
        let mut exact = Vec::new();
        let mut prefixed = Vec::new();
        for item in self.names.scan_prefix(name.as_bytes()) {
            let (_, bytes) = item?;
            let entry: SymbolEntry = bincode::deserialize(&bytes)?;
            if entry.name == name {
                exact.push((entry, true));
            } else {
                prefixed.push((entry, false));
            }
        }
        exact.sort_by_key(|(e, _)| e.chunk_id);
        prefixed.sort_by_key(|(e, _)| e.chunk_id);
        exact.extend(prefixed);
        Ok(exact)
    }

    // Cumulative counters.

    pub fn bump_counter(&self, key: &str, delta: u64) -> Result<()> {
        self.counters.update_and_fetch(key.as_bytes(), |old| {
            let current = old.map(decode_counter).unwrap_or(0);
            Some((current + delta).to_be_bytes().to_vec())
        })?;
        Ok(())
    }

    pub fn counter(&self, key: &str) -> Result<u64> {
        Ok(self
            .counters
            .get(key.as_bytes())?
            .map(|v| decode_counter(&v))
            .unwrap_or(0))
    }

    /// Drop all state. Counters survive a clear; they are lifetime totals.
    pub fn clear(&self) -> Result<()> {
        self.files.clear()?;
        self.pending.clear()?;
        self.names.clear()?;
        self.names_by_id.clear()?;
        self.db.flush()?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn name_key(name: &str, id: ChunkId) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 37);
    key.extend_from_slice(name.as_bytes());
    key.push(0);
    key.extend_from_slice(id.to_string().as_bytes());
    key
}

fn decode_counter(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = bytes.len().min(8);
    buf[8 - len..].copy_from_slice(&bytes[..len]);
    u64::from_be_bytes(buf)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
