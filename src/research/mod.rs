//! Research orchestration pipeline
//!
//! [`decomposer`] splits a query into subtasks, [`SynthesisStage`] answers
//! one query with attribution, [`Orchestrator`] runs the subtasks into a
//! [`ResearchReport`], and [`agent`] routes chat messages between the tools.

pub mod agent;
pub mod decomposer;
mod orchestrator;
mod refine;
mod synthesis;

pub use agent::{
    build_agent, route_by_keywords, AgentMode, KeywordAgent, ResearchAgent, RoutedAgent, ToolKind,
    Toolkit,
};
pub use decomposer::{decompose, extract_main_topic, Decomposition, Subtask, SubtaskKind};
pub use orchestrator::{Orchestrator, ReportSection, ResearchReport, SubtaskOutcome};
pub use refine::refine;
pub use synthesis::{SynthesisResult, SynthesisStage};
