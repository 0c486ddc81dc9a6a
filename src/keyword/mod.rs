//! Keyword (lexical) store for chunks, backed by Tantivy.
//!
//! One document per chunk. Content and name are tokenized for BM25
//! scoring; kind, language, and path are raw fields for exact filtering;
//! the full chunk travels in a stored-only JSON field so hits come back
//! whole without touching the original file.

use std::path::Path;
use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{QueryParser, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, Schema, SchemaBuilder, TextFieldIndexing, TextOptions, Value,
    STORED, STRING,
};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use tracing::debug;

use crate::chunk::{Chunk, ChunkId};
use crate::error::{IndexError, Result};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Tantivy schema for chunk documents.
#[derive(Clone)]
pub struct ChunkSchema {
    pub schema: Schema,

    /// Chunk ID (UUID string) for exact deletion and RRF deduplication
    pub chunk_id: Field,

    /// Chunk content (indexed)
    pub content: Field,

    /// Symbol or section name (indexed)
    pub name: Field,

    /// Chunk kind tag (raw, for filtering)
    pub kind: Field,

    /// Language tag (raw, for filtering)
    pub language: Field,

    /// File path (raw)
    pub file_path: Field,

    /// Full Chunk as JSON (stored only, for retrieval)
    pub chunk_json: Field,
}

impl ChunkSchema {
    pub fn new() -> Self {
        let mut builder = SchemaBuilder::new();

        let text_options = TextOptions::default().set_stored().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        );

        let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
        let content = builder.add_text_field("content", text_options.clone());
        let name = builder.add_text_field("name", text_options);
        let kind = builder.add_text_field("kind", STRING | STORED);
        let language = builder.add_text_field("language", STRING | STORED);
        let file_path = builder.add_text_field("file_path", STRING | STORED);
        let chunk_json = builder.add_text_field("chunk_json", STORED);

        Self {
            schema: builder.build(),
            chunk_id,
            content,
            name,
            kind,
            language,
            file_path,
            chunk_json,
        }
    }
}

impl Default for ChunkSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword store over a Tantivy index directory.
///
/// The writer sits behind a mutex; writes are serialized by the coordinator
/// anyway, and searches only touch the reader.
pub struct KeywordStore {
    index: Index,
    schema: ChunkSchema,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
}

impl KeywordStore {
    /// Open an existing index at `path` or create one.
    pub fn open(path: &Path) -> Result<Self> {
        let schema = ChunkSchema::new();
        let index = if path.join("meta.json").exists() {
            Index::open_in_dir(path)?
        } else {
            std::fs::create_dir_all(path)?;
            Index::create_in_dir(path, schema.schema.clone())?
        };

        let writer = index.writer(WRITER_HEAP_BYTES)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            schema,
            writer: Mutex::new(writer),
            reader,
        })
    }

    /// Queue chunk documents. Visible to searches only after [`commit`].
    ///
    /// [`commit`]: KeywordStore::commit
    pub fn add_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let writer = self.lock_writer()?;
        for chunk in chunks {
            let chunk_json = serde_json::to_string(chunk)
                .map_err(|e| IndexError::Keyword(format!("chunk serialization: {e}")))?;
            writer.add_document(doc!(
                self.schema.chunk_id => chunk.id.to_string(),
                self.schema.content => chunk.content.clone(),
                self.schema.name => chunk.name.clone(),
                self.schema.kind => chunk.kind.as_str(),
                self.schema.language => chunk.language_tag.clone(),
                self.schema.file_path => chunk.file_path.display().to_string(),
                self.schema.chunk_json => chunk_json,
            ))?;
        }
        Ok(())
    }

    /// Queue deletions by chunk id.
    pub fn delete_chunks(&self, chunk_ids: &[ChunkId]) -> Result<()> {
        let writer = self.lock_writer()?;
        for chunk_id in chunk_ids {
            let term = Term::from_field_text(self.schema.chunk_id, &chunk_id.to_string());
            writer.delete_term(term);
        }
        Ok(())
    }

    /// Commit queued writes and refresh the reader.
    pub fn commit(&self) -> Result<()> {
        {
            let mut writer = self.lock_writer()?;
            writer.commit()?;
        }
        self.reader.reload()?;
        Ok(())
    }

    /// BM25 search over content and name, best first.
    ///
    /// The query is parsed leniently: a syntactically broken user query
    /// degrades to whatever sub-queries survive instead of erroring.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<(ChunkId, f32, Chunk)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();
        let parser =
            QueryParser::for_index(&self.index, vec![self.schema.content, self.schema.name]);
        let (parsed, parse_errors) = parser.parse_query_lenient(query);
        if !parse_errors.is_empty() {
            debug!(?parse_errors, "lenient query parse dropped sub-queries");
        }

        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;
        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let document: TantivyDocument = searcher.doc(doc_address)?;
            if let Some((chunk_id, chunk)) = self.decode(&document)? {
                results.push((chunk_id, score, chunk));
            }
        }
        Ok(results)
    }

    /// Fetch one chunk by id, if committed.
    pub fn get_chunk(&self, chunk_id: ChunkId) -> Result<Option<Chunk>> {
        let searcher = self.reader.searcher();
        let term = Term::from_field_text(self.schema.chunk_id, &chunk_id.to_string());
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        match top_docs.first() {
            Some((_, doc_address)) => {
                let document: TantivyDocument = searcher.doc(*doc_address)?;
                Ok(self.decode(&document)?.map(|(_, chunk)| chunk))
            }
            None => Ok(None),
        }
    }

    /// Number of committed documents.
    pub fn count(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    /// Delete everything and commit.
    pub fn clear(&self) -> Result<()> {
        {
            let mut writer = self.lock_writer()?;
            writer.delete_all_documents()?;
            writer.commit()?;
        }
        self.reader.reload()?;
        Ok(())
    }

    fn decode(&self, document: &TantivyDocument) -> Result<Option<(ChunkId, Chunk)>> {
        let chunk_id = document
            .get_first(self.schema.chunk_id)
            .and_then(|v| v.as_str())
            .and_then(|s| ChunkId::parse(s).ok());
        let chunk = document
            .get_first(self.schema.chunk_json)
            .and_then(|v| v.as_str())
            .and_then(|json| serde_json::from_str::<Chunk>(json).ok());
        Ok(chunk_id.zip(chunk))
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, IndexWriter>> {
        self.writer
            .lock()
            .map_err(|_| IndexError::Keyword("writer lock poisoned".to_string()))
    }
}
