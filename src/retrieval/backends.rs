//! Keyword and vector retrievers over the passage store

use crate::embedding::{EmbeddingProvider, KeywordIndex, VectorIndex};
use crate::retrieval::{RetrievedNode, Retriever, SearchError, FILE_NAME_KEY};
use crate::storage::Database;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolve scored passage ids against the store, preserving rank order
fn hydrate(store: &Database, scored: &[(i64, f32)]) -> Result<Vec<RetrievedNode>, SearchError> {
    let ids: Vec<i64> = scored.iter().map(|(id, _)| *id).collect();
    let scores: HashMap<i64, f32> = scored.iter().copied().collect();

    let records = store
        .get_passages(&ids)
        .map_err(|e| SearchError::DatabaseError(e.to_string()))?;

    if records.len() < ids.len() {
        tracing::warn!(
            "{} indexed passages missing from store",
            ids.len() - records.len()
        );
    }

    Ok(records
        .into_iter()
        .map(|record| {
            let score = scores.get(&record.id).copied().unwrap_or(0.0);
            RetrievedNode::new(record.id.to_string(), score, record.text)
                .with_metadata(FILE_NAME_KEY, record.file_name)
                .with_metadata("path", record.path)
                .with_metadata("position", record.position.to_string())
        })
        .collect())
}

/// BM25 retriever backed by the tantivy index
pub struct KeywordRetriever {
    index: KeywordIndex,
    store: Arc<Database>,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new(index: KeywordIndex, store: Arc<Database>, top_k: usize) -> Self {
        Self {
            index,
            store,
            top_k,
        }
    }
}

impl Retriever for KeywordRetriever {
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedNode>, SearchError> {
        let hits = self
            .index
            .search(query, self.top_k)
            .map_err(|e| SearchError::KeywordSearchError(e.to_string()))?;

        let scored: Vec<(i64, f32)> = hits.iter().map(|h| (h.id as i64, h.score)).collect();
        hydrate(&self.store, &scored)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Embedding similarity retriever backed by the HNSW index
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    store: Arc<Database>,
    top_k: usize,
    ef_search: usize,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        store: Arc<Database>,
        top_k: usize,
        ef_search: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            top_k,
            ef_search,
        }
    }
}

impl Retriever for VectorRetriever {
    fn retrieve(&self, query: &str) -> Result<Vec<RetrievedNode>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let embedding = self
            .embedder
            .embed(query)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        let hits = self
            .index
            .search(&embedding, self.top_k, self.ef_search)
            .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;

        let scored: Vec<(i64, f32)> = hits.iter().map(|h| (h.id as i64, h.score)).collect();
        hydrate(&self.store, &scored)
    }

    fn name(&self) -> &str {
        "vector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::storage::DocumentUpsert;
    use tempfile::TempDir;

    /// Embeds by counting a fixed vocabulary
    struct CountingEmbedder;

    const VOCAB: [&str; 4] = ["rust", "python", "memory", "garbage"];

    impl EmbeddingProvider for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let lower = text.to_lowercase();
            Ok(VOCAB
                .iter()
                .map(|w| lower.matches(w).count() as f32 + 0.01)
                .collect())
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            VOCAB.len()
        }

        fn model_name(&self) -> &str {
            "counting"
        }
    }

    fn seeded() -> (TempDir, Arc<Database>, Vec<i64>) {
        let temp = TempDir::new().unwrap();
        let db = Database::new(&temp.path().join("corpus.sqlite")).unwrap();
        let DocumentUpsert::Created(doc) = db.upsert_document("/d/lang.md", "lang.md", "h").unwrap()
        else {
            panic!("expected new document");
        };
        let ids = vec![
            db.insert_passage(doc, 0, "Rust manages memory with ownership")
                .unwrap()
                .unwrap(),
            db.insert_passage(doc, 1, "Python relies on garbage collection")
                .unwrap()
                .unwrap(),
        ];
        (temp, Arc::new(db), ids)
    }

    #[test]
    fn test_keyword_retriever_hydrates_metadata() {
        let (temp, db, ids) = seeded();
        let path = temp.path().join("kw");
        {
            let mut index = KeywordIndex::open_writable(&path).unwrap();
            index.insert(ids[0] as u64, "Rust manages memory with ownership").unwrap();
            index.insert(ids[1] as u64, "Python relies on garbage collection").unwrap();
            index.commit().unwrap();
        }

        let retriever = KeywordRetriever::new(KeywordIndex::open_reader(&path).unwrap(), db, 5);
        let nodes = retriever.retrieve("ownership?").unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].id, ids[0].to_string());
        assert_eq!(nodes[0].file_name(), Some("lang.md"));
        assert_eq!(nodes[0].metadata.get("position").map(String::as_str), Some("0"));
    }

    #[test]
    fn test_vector_retriever_ranks_by_similarity() {
        let (_temp, db, ids) = seeded();
        let embedder = CountingEmbedder;
        let items: Vec<(i64, Vec<f32>)> = db
            .get_passages(&ids)
            .unwrap()
            .into_iter()
            .map(|p| (p.id, embedder.embed(&p.text).unwrap()))
            .collect();
        let index = VectorIndex::build(VOCAB.len(), 100, 8, &items).unwrap();

        let retriever =
            VectorRetriever::new(Arc::new(CountingEmbedder), Arc::new(index), db, 2, 20);
        let nodes = retriever.retrieve("garbage collection in python").unwrap();

        assert_eq!(nodes[0].id, ids[1].to_string());
        assert!(retriever.retrieve("   ").is_err());
    }
}
