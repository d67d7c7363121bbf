//! Plain-text ingestion
//!
//! Walks a directory for configured text files, chunks them into passages,
//! and fills the passage store, keyword index and stored embeddings. Only
//! UTF-8 text is read.

mod chunker;

pub use chunker::{chunk_text, split_sentences};

use crate::config::IngestConfig;
use crate::embedding::{EmbeddingProvider, KeywordIndex};
use crate::error::{DelveError, Result};
use crate::storage::{Database, DocumentUpsert};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Counters for one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub passages_added: usize,
    pub passages_embedded: usize,
}

pub struct Ingestor {
    store: Arc<Database>,
    keyword_index: KeywordIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IngestConfig,
    batch_size: usize,
}

impl Ingestor {
    pub fn new(
        store: Arc<Database>,
        keyword_index: KeywordIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IngestConfig,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            keyword_index,
            embedder,
            config,
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest every matching file under `dir`, then embed new passages
    pub fn ingest_dir(&mut self, dir: &Path) -> Result<IngestReport> {
        if !dir.is_dir() {
            return Err(DelveError::Config(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut report = IngestReport::default();
        let mut written = Vec::new();

        for path in self.candidate_files(dir) {
            match self.ingest_file(&path) {
                Ok(Some((document_id, added))) => {
                    written.push(document_id);
                    report.files_indexed += 1;
                    report.passages_added += added;
                }
                Ok(None) => report.files_unchanged += 1,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    report.files_skipped += 1;
                }
            }
        }

        self.keyword_index
            .commit()
            .map_err(|e| DelveError::Retrieval(e.to_string()))?;
        // Only now are the new keyword entries durable
        self.store.mark_indexed(&written)?;

        report.passages_embedded = self.embed_pending()?;

        tracing::info!(
            "Ingestion complete: {} indexed, {} unchanged, {} skipped, {} passages",
            report.files_indexed,
            report.files_unchanged,
            report.files_skipped,
            report.passages_added
        );

        Ok(report)
    }

    fn candidate_files(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.has_configured_extension(p))
            .collect();
        files.sort();
        files
    }

    fn has_configured_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.config
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }

    /// Returns the document id and number of passages added, or `None` if
    /// the file is unchanged
    fn ingest_file(&mut self, path: &Path) -> Result<Option<(i64, usize)>> {
        let text = std::fs::read_to_string(path).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to read {} as UTF-8 text", path.display()),
        })?;

        let hash = blake3::hash(text.as_bytes()).to_hex().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path_str = path.display().to_string();

        let document_id = match self.store.upsert_document(&path_str, &file_name, &hash)? {
            DocumentUpsert::Unchanged(_) => {
                tracing::debug!("Unchanged: {}", path.display());
                return Ok(None);
            }
            DocumentUpsert::Created(id) => id,
            DocumentUpsert::Replaced {
                id,
                removed_passages,
            } => {
                for passage in removed_passages {
                    self.keyword_index
                        .delete(passage as u64)
                        .map_err(|e| DelveError::Retrieval(e.to_string()))?;
                }
                id
            }
        };

        let mut added = 0;
        for (position, chunk) in chunk_text(&text, self.config.chunk_size, self.config.chunk_overlap)
            .into_iter()
            .enumerate()
        {
            let Some(passage_id) = self
                .store
                .insert_passage(document_id, position as i64, &chunk)?
            else {
                continue;
            };

            self.keyword_index
                .insert(passage_id as u64, &chunk)
                .map_err(|e| DelveError::Retrieval(e.to_string()))?;
            added += 1;
        }

        tracing::debug!("Indexed {} passages from {}", added, path.display());
        Ok(Some((document_id, added)))
    }

    /// Embed every stored passage lacking an embedding, in batches
    pub fn embed_pending(&self) -> Result<usize> {
        let pending = self.store.passages_without_embedding()?;
        let mut embedded = 0;

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|(_, text)| text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .map_err(|e| DelveError::Retrieval(e.to_string()))?;

            for ((id, _), vector) in batch.iter().zip(vectors) {
                self.store.set_embedding(*id, &vector)?;
                embedded += 1;
            }
            tracing::debug!("Embedded {}/{} passages", embedded, pending.len());
        }

        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use tempfile::TempDir;

    struct LengthEmbedder;

    impl EmbeddingProvider for LengthEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "length"
        }
    }

    fn ingestor(root: &Path) -> Ingestor {
        let store = Arc::new(Database::new(&root.join("store").join("corpus.sqlite")).unwrap());
        let keyword = KeywordIndex::open_writable(&root.join("kw")).unwrap();
        let config = IngestConfig {
            chunk_size: 8,
            chunk_overlap: 2,
            extensions: vec!["md".to_string(), "txt".to_string()],
        };
        Ingestor::new(store, keyword, Arc::new(LengthEmbedder), config, 2)
    }

    #[test]
    fn test_ingest_directory() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(docs.join("nested")).unwrap();
        std::fs::write(docs.join("a.md"), "Entropy measures disorder. It always grows.").unwrap();
        std::fs::write(docs.join("nested").join("b.txt"), "Qubits are fragile.").unwrap();
        std::fs::write(docs.join("c.pdf"), "ignored").unwrap();
        std::fs::write(docs.join("d.txt"), [0xff, 0xfe, 0x00]).unwrap();

        let mut ingestor = ingestor(temp.path());
        let report = ingestor.ingest_dir(&docs).unwrap();

        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.passages_added, 2);
        assert_eq!(report.passages_embedded, 2);
        assert_eq!(ingestor.keyword_index.search("entropy", 5).unwrap().len(), 1);

        let again = ingestor.ingest_dir(&docs).unwrap();
        assert_eq!(again.files_unchanged, 2);
        assert_eq!(again.passages_added, 0);
    }

    #[test]
    fn test_changed_file_replaces_passages() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "Original wording here.").unwrap();

        let mut ingestor = ingestor(temp.path());
        ingestor.ingest_dir(&docs).unwrap();

        std::fs::write(docs.join("a.md"), "Completely revised text.").unwrap();
        let report = ingestor.ingest_dir(&docs).unwrap();

        assert_eq!(report.files_indexed, 1);
        assert!(ingestor.keyword_index.search("original", 5).unwrap().is_empty());
        assert_eq!(ingestor.keyword_index.search("revised", 5).unwrap().len(), 1);
        assert_eq!(ingestor.store.stats().unwrap().passage_count, 1);
    }

    #[test]
    fn test_shared_passage_survives_other_document_edit() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "Shared entropy sentence.").unwrap();
        std::fs::write(docs.join("b.md"), "Shared entropy sentence.").unwrap();

        let mut ingestor = ingestor(temp.path());
        let first = ingestor.ingest_dir(&docs).unwrap();
        assert_eq!(first.passages_added, 2);

        std::fs::write(docs.join("a.md"), "Revised wording about orbits.").unwrap();
        let second = ingestor.ingest_dir(&docs).unwrap();
        assert_eq!(second.files_indexed, 1);
        assert_eq!(second.files_unchanged, 1);

        let hits = ingestor.keyword_index.search("entropy", 5).unwrap();
        assert_eq!(hits.len(), 1);
        let records = ingestor.store.get_passages(&[hits[0].id as i64]).unwrap();
        assert_eq!(records[0].file_name, "b.md");
    }

    #[test]
    fn test_interrupted_run_is_reindexed() {
        let temp = TempDir::new().unwrap();
        let docs = temp.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "Entropy measures disorder.").unwrap();

        {
            // Stored in SQLite, but the keyword writer is dropped uncommitted
            let mut interrupted = ingestor(temp.path());
            assert!(interrupted.ingest_file(&docs.join("a.md")).unwrap().is_some());
        }

        let mut ingestor = ingestor(temp.path());
        let report = ingestor.ingest_dir(&docs).unwrap();

        assert_eq!(report.files_indexed, 1);
        assert_eq!(report.files_unchanged, 0);
        assert_eq!(ingestor.keyword_index.search("entropy", 5).unwrap().len(), 1);
        assert_eq!(ingestor.store.stats().unwrap().passage_count, 1);

        let again = ingestor.ingest_dir(&docs).unwrap();
        assert_eq!(again.files_unchanged, 1);
    }

    #[test]
    fn test_rejects_missing_directory() {
        let temp = TempDir::new().unwrap();
        let mut ingestor = ingestor(temp.path());
        assert!(ingestor.ingest_dir(&temp.path().join("absent")).is_err());
    }
}
