/// Tantivy keyword index for full-text search
use std::path::{Path, PathBuf};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyError};
use thiserror::Error;

const WRITER_HEAP_BYTES: usize = 50_000_000;

#[derive(Error, Debug)]
pub enum KeywordIndexError {
    #[error("Index initialization failed: {0}")]
    InitializationError(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Insert failed: {0}")]
    InsertError(String),

    #[error("Search failed: {0}")]
    SearchError(String),

    #[error("Index opened read-only")]
    ReadOnly,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    TantivyError(#[from] TantivyError),

    #[error("Query parsing error: {0}")]
    QueryParseError(String),
}

/// Search result with ID and relevance score
#[derive(Debug, Clone)]
pub struct KeywordSearchResult {
    /// Passage id in the store
    pub id: u64,
    /// BM25 relevance score
    pub score: f32,
}

/// Tantivy keyword index wrapper
///
/// Provides full-text search with BM25 ranking. Opened read-only for
/// retrieval and writable for ingestion.
pub struct KeywordIndex {
    index: Index,
    reader: IndexReader,
    writer: Option<IndexWriter>,
    id_field: Field,
    text_field: Field,
    index_path: PathBuf,
}

impl KeywordIndex {
    /// Open or create a writable index
    pub fn open_writable(index_path: &Path) -> Result<Self, KeywordIndexError> {
        let index = if index_path.join("meta.json").exists() {
            Index::open_in_dir(index_path)
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?
        } else {
            std::fs::create_dir_all(index_path)?;
            Index::create_in_dir(index_path, Self::schema())
                .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?
        };

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::from_index(index, Some(writer), index_path)
    }

    /// Open an existing index for searching only
    pub fn open_reader(index_path: &Path) -> Result<Self, KeywordIndexError> {
        if !index_path.join("meta.json").exists() {
            return Err(KeywordIndexError::IndexNotFound(
                index_path.display().to_string(),
            ));
        }

        let index = Index::open_in_dir(index_path)
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Self::from_index(index, None, index_path)
    }

    fn schema() -> Schema {
        let mut schema_builder = Schema::builder();
        schema_builder.add_u64_field("id", INDEXED | STORED);
        schema_builder.add_text_field("text", TEXT);
        schema_builder.build()
    }

    fn from_index(
        index: Index,
        writer: Option<IndexWriter>,
        index_path: &Path,
    ) -> Result<Self, KeywordIndexError> {
        let schema = index.schema();

        let id_field = schema.get_field("id").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'id' field in schema".to_string())
        })?;

        let text_field = schema.get_field("text").map_err(|_| {
            KeywordIndexError::InitializationError("Missing 'text' field in schema".to_string())
        })?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| KeywordIndexError::InitializationError(e.to_string()))?;

        Ok(Self {
            index,
            reader,
            writer,
            id_field,
            text_field,
            index_path: index_path.to_path_buf(),
        })
    }

    fn writer(&mut self) -> Result<&mut IndexWriter, KeywordIndexError> {
        self.writer.as_mut().ok_or(KeywordIndexError::ReadOnly)
    }

    /// Insert a passage into the index
    pub fn insert(&mut self, id: u64, text: &str) -> Result<(), KeywordIndexError> {
        let doc = doc!(
            self.id_field => id,
            self.text_field => text,
        );

        self.writer()?
            .add_document(doc)
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        Ok(())
    }

    /// Delete a passage by ID
    pub fn delete(&mut self, id: u64) -> Result<(), KeywordIndexError> {
        let term = Term::from_field_u64(self.id_field, id);
        self.writer()?.delete_term(term);
        Ok(())
    }

    /// Commit all pending changes
    pub fn commit(&mut self) -> Result<(), KeywordIndexError> {
        self.writer()?
            .commit()
            .map_err(|e| KeywordIndexError::InsertError(e.to_string()))?;

        self.reader
            .reload()
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        Ok(())
    }

    /// Search the index with free text
    ///
    /// The query is reduced to lowercase alphanumeric terms, so user input
    /// never reaches the tantivy query grammar. Returns results sorted by
    /// BM25 score.
    pub fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KeywordSearchResult>, KeywordIndexError> {
        let sanitized = sanitize_query(query);
        if sanitized.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.text_field]);
        let query = query_parser
            .parse_query(&sanitized)
            .map_err(|e| KeywordIndexError::QueryParseError(e.to_string()))?;

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: tantivy::TantivyDocument = searcher
                .doc(doc_address)
                .map_err(|e| KeywordIndexError::SearchError(e.to_string()))?;

            let id = retrieved_doc
                .get_first(self.id_field)
                .and_then(|v| v.as_u64())
                .ok_or_else(|| {
                    KeywordIndexError::SearchError("Missing or invalid ID field".to_string())
                })?;

            results.push(KeywordSearchResult { id, score });
        }

        Ok(results)
    }

    /// Get the number of passages in the index
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.index_path
    }
}

/// Reduce free text to space separated lowercase alphanumeric terms
pub fn sanitize_query(query: &str) -> String {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}
