//! Wiring of the research stack from a [`Config`]
//!
//! Setup failures here are configuration errors and are fatal. A language
//! model that cannot be constructed is not: the stack is built without one.

use crate::config::{Config, RetrievalMode};
use crate::embedding::{build_provider, EmbeddingProvider, KeywordIndex, KeywordIndexError, VectorIndex};
use crate::error::{DelveError, Result};
use crate::export::ResearchExporter;
use crate::ingest::Ingestor;
use crate::llm::build_language_model;
use crate::research::{build_agent, ResearchAgent, SynthesisStage, Toolkit};
use crate::retrieval::{
    FusionRetriever, KeywordRetriever, QueryEngine, Reranker, Retriever, VectorRetriever,
};
use crate::storage::{create_store, open_store, store_path};
use std::sync::Arc;

/// Build the research agent over the ingested collection
///
/// Blocking: loads the embedding model and may construct a blocking HTTP
/// client, so call it from a plain thread or `spawn_blocking`.
pub fn build_research_agent(config: &Config) -> Result<Arc<dyn ResearchAgent>> {
    let llm = build_language_model(&config.llm)?;

    let store = Arc::new(open_store(config)?);
    let stats = store.stats()?;
    if stats.passage_count == 0 {
        return Err(DelveError::IndexNotFound {
            path: store_path(config),
        });
    }
    tracing::info!(
        "Passage store: {} documents, {} passages ({} embedded)",
        stats.document_count,
        stats.passage_count,
        stats.embedded_count
    );

    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(build_provider(&config.embedding, &config.indexing)?);

    let vector_index = VectorIndex::build(
        config.indexing.vector_dim,
        config.indexing.hnsw_ef_construction,
        config.indexing.hnsw_m,
        &store.embeddings()?,
    )
    .map_err(|e| DelveError::Retrieval(e.to_string()))?;

    let semantic: Arc<dyn Retriever> = Arc::new(VectorRetriever::new(
        embedder,
        Arc::new(vector_index),
        store.clone(),
        config.retrieval.vector_top_k,
        config.retrieval.hnsw_ef_search,
    ));

    let retriever = match config.retrieval.mode {
        RetrievalMode::Hybrid => {
            let keyword_dir = config.keyword_index_dir();
            let keyword_index = KeywordIndex::open_reader(&keyword_dir).map_err(|e| match e {
                KeywordIndexError::IndexNotFound(_) => DelveError::IndexNotFound {
                    path: keyword_dir.clone(),
                },
                other => DelveError::Retrieval(other.to_string()),
            })?;
            let lexical: Arc<dyn Retriever> = Arc::new(KeywordRetriever::new(
                keyword_index,
                store.clone(),
                config.retrieval.keyword_top_k,
            ));
            FusionRetriever::hybrid(lexical, semantic)
        }
        RetrievalMode::Semantic => FusionRetriever::semantic_only(semantic),
    };

    let mut engine = QueryEngine::new(Arc::new(retriever));

    if config.retrieval.enable_reranking {
        match Reranker::new(config.retrieval.reranker_top_n) {
            Ok(reranker) => engine = engine.with_reranker(reranker),
            Err(e) => tracing::warn!("Reranker unavailable, continuing without it: {}", e),
        }
    }

    if let Some(llm) = llm.clone() {
        engine = engine.with_language_model(llm);
    }

    let stage = Arc::new(SynthesisStage::new(
        Arc::new(engine),
        config.research.max_listed_sources,
    ));
    let toolkit = Toolkit::new(stage, config.research.enable_query_decomposition);

    Ok(build_agent(toolkit, llm))
}

/// Build an ingestor writing into the configured store and indexes
pub fn build_ingestor(config: &Config) -> Result<Ingestor> {
    let store = Arc::new(create_store(config)?);
    let keyword_index = KeywordIndex::open_writable(&config.keyword_index_dir())
        .map_err(|e| DelveError::Retrieval(e.to_string()))?;
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(build_provider(&config.embedding, &config.indexing)?);

    Ok(Ingestor::new(
        store,
        keyword_index,
        embedder,
        config.ingest.clone(),
        config.embedding.batch_size,
    ))
}

/// Exporter writing into the configured output directory
pub fn build_exporter(config: &Config) -> Result<ResearchExporter> {
    ResearchExporter::new(config.output_dir(), config.research.agent_version.clone())
}
