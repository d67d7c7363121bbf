//! Query engine: retrieval plus answer phrasing

use crate::llm::LanguageModel;
use crate::retrieval::{Answer, AnswerBackend, RetrievedNode, Reranker, Retriever, SearchError};
use std::sync::Arc;

/// Response text when nothing was retrieved
pub const NO_PASSAGES_FOUND: &str = "No relevant passages were found in the document collection.";

/// Passages summarized by the extractive digest
const DIGEST_PASSAGES: usize = 5;

/// Longest sentence kept in a digest line, in characters
const DIGEST_SENTENCE_CHARS: usize = 300;

const SYSTEM_PROMPT: &str = "You are a research assistant. Answer the question using only the \
numbered context passages. Cite passages by their number. If the context does not contain the \
answer, say so plainly.";

/// Answering backend over a retriever
///
/// With a language model the retrieved passages become numbered prompt
/// context. Without one the answer is an extractive digest.
pub struct QueryEngine {
    retriever: Arc<dyn Retriever>,
    reranker: Option<Reranker>,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl QueryEngine {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self {
            retriever,
            reranker: None,
            llm: None,
        }
    }

    pub fn with_reranker(mut self, reranker: Reranker) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_language_model(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn has_language_model(&self) -> bool {
        self.llm.is_some()
    }

    fn candidates(&self, text: &str) -> Result<Vec<RetrievedNode>, SearchError> {
        let nodes = self.retriever.retrieve(text)?;
        tracing::debug!(
            retriever = self.retriever.name(),
            candidates = nodes.len(),
            "Retrieved candidates"
        );

        match &self.reranker {
            Some(reranker) => reranker
                .rerank(text, nodes)
                .map_err(|e| SearchError::RerankingError(e.to_string())),
            None => Ok(nodes),
        }
    }
}

impl AnswerBackend for QueryEngine {
    fn query(&self, text: &str) -> Result<Answer, SearchError> {
        if text.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let nodes = self.candidates(text)?;
        if nodes.is_empty() {
            return Ok(Answer::new(NO_PASSAGES_FOUND, nodes));
        }

        let response_text = match &self.llm {
            Some(llm) => llm
                .complete(SYSTEM_PROMPT, &build_prompt(text, &nodes))
                .map_err(|e| SearchError::AnswerError(e.to_string()))?,
            None => extractive_digest(&nodes),
        };

        Ok(Answer::new(response_text, nodes))
    }
}

fn source_label(node: &RetrievedNode, position: usize) -> String {
    node.file_name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("Document {}", position))
}

/// Numbered context block followed by the question
pub fn build_prompt(question: &str, nodes: &[RetrievedNode]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, node) in nodes.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] ({})\n{}\n\n",
            i + 1,
            source_label(node, i + 1),
            node.text.trim()
        ));
    }
    prompt.push_str(&format!("Question: {}\n\nAnswer:", question));
    prompt
}

/// Leading sentence of each top passage, labelled by source
pub fn extractive_digest(nodes: &[RetrievedNode]) -> String {
    nodes
        .iter()
        .take(DIGEST_PASSAGES)
        .enumerate()
        .map(|(i, node)| format!("[{}] {}", source_label(node, i + 1), first_sentence(&node.text)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_sentence(text: &str) -> String {
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| {
            matches!(c, '.' | '?' | '!')
                && text[i + c.len_utf8()..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(text.len());

    let sentence = text[..end].split_whitespace().collect::<Vec<_>>().join(" ");
    if sentence.chars().count() <= DIGEST_SENTENCE_CHARS {
        sentence
    } else {
        let cut: String = sentence.chars().take(DIGEST_SENTENCE_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}
