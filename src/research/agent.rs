//! Research agent: routes a chat message to one of three tools
//!
//! Two variants share the [`ResearchAgent`] contract. [`RoutedAgent`] asks
//! the language model which tool fits; [`KeywordAgent`] routes on keywords
//! alone and is used when no language model is available.

use crate::error::{DelveError, Result};
use crate::llm::LanguageModel;
use crate::research::refine::refine;
use crate::research::{Orchestrator, SynthesisStage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    DocumentSynthesizer,
    DeepResearcher,
    QueryRefiner,
}

impl ToolKind {
    pub const ALL: [ToolKind; 3] = [
        ToolKind::DocumentSynthesizer,
        ToolKind::DeepResearcher,
        ToolKind::QueryRefiner,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DocumentSynthesizer => "document_synthesizer",
            Self::DeepResearcher => "deep_researcher",
            Self::QueryRefiner => "query_refiner",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::DocumentSynthesizer => {
                "Synthesizes information from multiple local documents with detailed source analysis. \
                 Use for comprehensive research on topics covered in the local collection."
            }
            Self::DeepResearcher => {
                "Breaks complex queries into sub-tasks and analyzes each systematically. \
                 Use for research questions that need multi-step reasoning."
            }
            Self::QueryRefiner => {
                "Suggests follow-up questions and refinements for exploring a topic more thoroughly."
            }
        }
    }

    /// First tool whose name appears in `reply`
    pub fn from_reply(reply: &str) -> Option<Self> {
        let reply = reply.to_lowercase();
        Self::ALL.into_iter().find(|t| reply.contains(t.name()))
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which agent variant is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Routed,
    Keyword,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Routed => f.write_str("routed"),
            Self::Keyword => f.write_str("keyword"),
        }
    }
}

/// The three research tools over one answering backend
pub struct Toolkit {
    stage: Arc<SynthesisStage>,
    orchestrator: Orchestrator,
}

impl Toolkit {
    pub fn new(stage: Arc<SynthesisStage>, decompose: bool) -> Self {
        let orchestrator = Orchestrator::new(stage.clone(), decompose);
        Self {
            stage,
            orchestrator,
        }
    }

    pub fn invoke(&self, tool: ToolKind, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DelveError::Retrieval(
                "Query text cannot be empty".to_string(),
            ));
        }

        tracing::info!(tool = tool.name(), "Invoking research tool");

        Ok(match tool {
            ToolKind::DocumentSynthesizer => self.stage.synthesize(query),
            ToolKind::DeepResearcher => self.orchestrator.run(query).render(),
            ToolKind::QueryRefiner => refine(query),
        })
    }
}

/// Capability shared by both agent variants
pub trait ResearchAgent: Send + Sync {
    /// Answer a message; never fails, errors are rendered as text
    fn chat(&self, message: &str) -> String;

    fn mode(&self) -> AgentMode;
}

const DEEP_TERMS: &[&str] = &["deep", "complex", "analyze", "breakdown"];
const REFINE_TERMS: &[&str] = &["follow", "refine", "explore", "suggestions"];

/// Keyword routing, first match wins
pub fn route_by_keywords(message: &str) -> ToolKind {
    let lowered = message.to_lowercase();
    if DEEP_TERMS.iter().any(|t| lowered.contains(t)) {
        ToolKind::DeepResearcher
    } else if REFINE_TERMS.iter().any(|t| lowered.contains(t)) {
        ToolKind::QueryRefiner
    } else {
        ToolKind::DocumentSynthesizer
    }
}

/// A leading `deep ` or `refine ` command selects the tool explicitly
fn explicit_tool(message: &str) -> Option<(ToolKind, &str)> {
    let trimmed = message.trim_start();
    let (head, rest) = trimmed.split_once(char::is_whitespace)?;
    match head.to_lowercase().as_str() {
        "deep" => Some((ToolKind::DeepResearcher, rest)),
        "refine" => Some((ToolKind::QueryRefiner, rest)),
        _ => None,
    }
}

fn render_failure(result: Result<String>) -> String {
    result.unwrap_or_else(|e| {
        tracing::warn!("Query failed: {}", e);
        format!("Error processing query: {}", e)
    })
}

/// Agent used when no language model is available
pub struct KeywordAgent {
    toolkit: Toolkit,
}

impl KeywordAgent {
    pub fn new(toolkit: Toolkit) -> Self {
        Self { toolkit }
    }
}

impl ResearchAgent for KeywordAgent {
    fn chat(&self, message: &str) -> String {
        let (tool, query) =
            explicit_tool(message).unwrap_or_else(|| (route_by_keywords(message), message));
        render_failure(self.toolkit.invoke(tool, query))
    }

    fn mode(&self) -> AgentMode {
        AgentMode::Keyword
    }
}

/// Agent that lets the language model pick the tool
pub struct RoutedAgent {
    toolkit: Toolkit,
    llm: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl RoutedAgent {
    pub fn new(toolkit: Toolkit, llm: Arc<dyn LanguageModel>) -> Self {
        let mut system_prompt = String::from(
            "You route research requests to exactly one tool. \
             Reply with the tool name only.\n\nTools:\n",
        );
        for tool in ToolKind::ALL {
            system_prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
        }

        Self {
            toolkit,
            llm,
            system_prompt,
        }
    }

    fn select_tool(&self, message: &str) -> ToolKind {
        match self.llm.complete(&self.system_prompt, message) {
            Ok(reply) => ToolKind::from_reply(&reply).unwrap_or_else(|| {
                tracing::debug!("Unrecognised tool reply '{}', using keyword routing", reply);
                route_by_keywords(message)
            }),
            Err(e) => {
                tracing::warn!("Tool selection failed, using keyword routing: {}", e);
                route_by_keywords(message)
            }
        }
    }
}

impl ResearchAgent for RoutedAgent {
    fn chat(&self, message: &str) -> String {
        let (tool, query) = match explicit_tool(message) {
            Some(explicit) => explicit,
            None => (self.select_tool(message), message),
        };
        render_failure(self.toolkit.invoke(tool, query))
    }

    fn mode(&self) -> AgentMode {
        AgentMode::Routed
    }
}

/// Select the agent variant from backend availability
pub fn build_agent(toolkit: Toolkit, llm: Option<Arc<dyn LanguageModel>>) -> Arc<dyn ResearchAgent> {
    match llm {
        Some(llm) => {
            tracing::info!("Research agent ready (routing with {})", llm.model_name());
            Arc::new(RoutedAgent::new(toolkit, llm))
        }
        None => {
            tracing::info!("Research agent ready (keyword routing, no LLM)");
            Arc::new(KeywordAgent::new(toolkit))
        }
    }
}
