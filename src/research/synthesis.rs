//! Synthesis stage: one retrieval + answer call formatted with attribution

use crate::error::{DelveError, Result};
use crate::retrieval::AnswerBackend;
use serde::Serialize;
use std::sync::Arc;

/// Answer for one query with its attributed sources
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisResult {
    pub query: String,
    pub answer_text: String,
    /// Source labels, truncated to the configured count
    pub source_list: Vec<String>,
    /// Number of passages the answer drew on
    pub node_count: usize,
}

impl SynthesisResult {
    /// Human-readable synthesis block
    pub fn render(&self) -> String {
        let mut out = format!("Research Synthesis for: {}\n\n", self.query);
        out.push_str(&format!("Primary Analysis:\n{}\n\n", self.answer_text));

        if !self.source_list.is_empty() {
            out.push_str("Sources Analyzed:\n");
            for (i, source) in self.source_list.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, source));
            }
            out.push('\n');
        }

        out.push_str("Information Assessment:\n");
        out.push_str(&format!("- Found {} relevant sources\n", self.node_count));
        out.push_str("- Synthesized information from local document collection\n");
        out.push_str("- Analysis based on semantic similarity and keyword matching\n");
        out
    }
}

/// Runs queries through the answering backend
pub struct SynthesisStage {
    backend: Arc<dyn AnswerBackend>,
    max_listed_sources: usize,
}

impl SynthesisStage {
    pub fn new(backend: Arc<dyn AnswerBackend>, max_listed_sources: usize) -> Self {
        Self {
            backend,
            max_listed_sources,
        }
    }

    /// Query the backend once and collect attribution
    pub fn run(&self, query: &str) -> Result<SynthesisResult> {
        let answer = self
            .backend
            .query(query)
            .map_err(|e| DelveError::Retrieval(e.to_string()))?;

        let source_list = answer
            .source_nodes
            .iter()
            .take(self.max_listed_sources)
            .enumerate()
            .map(|(i, node)| {
                node.file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Document {}", i + 1))
            })
            .collect();

        Ok(SynthesisResult {
            query: query.to_string(),
            answer_text: answer.response_text,
            source_list,
            node_count: answer.source_nodes.len(),
        })
    }

    /// Rendered synthesis block; failures become a one-line report
    pub fn synthesize(&self, query: &str) -> String {
        match self.run(query) {
            Ok(result) => result.render(),
            Err(e) => {
                tracing::warn!("Synthesis failed for '{}': {}", query, e);
                format!("Error in document synthesis search: {}", e)
            }
        }
    }
}
