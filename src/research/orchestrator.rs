//! Deep-research orchestrator
//!
//! Three strictly sequential phases: decompose the query, run every subtask
//! through the synthesis stage in order, then close the report. A failing
//! subtask is recorded in its own section and never stops the run.

use crate::research::decomposer::{self, Decomposition, Subtask};
use crate::research::synthesis::{SynthesisResult, SynthesisStage};
use serde::Serialize;
use std::sync::Arc;

/// Per-subtask result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubtaskOutcome {
    Completed(SynthesisResult),
    Failed { reason: String },
}

impl SubtaskOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub subtask: Subtask,
    pub outcome: SubtaskOutcome,
}

/// Structured deep-research report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResearchReport {
    pub query: String,
    pub reasoning_steps: Vec<String>,
    pub sections: Vec<ReportSection>,
}

impl ResearchReport {
    pub fn completed_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.outcome.is_completed())
            .count()
    }

    /// Plain-text report
    pub fn render(&self) -> String {
        let mut out = format!("Deep Research Analysis: {}\n", self.query);
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");

        out.push_str("Research Strategy:\n");
        for (i, step) in self.reasoning_steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, step));
        }
        out.push('\n');

        out.push_str("Detailed Analysis:\n\n");
        for (i, section) in self.sections.iter().enumerate() {
            let subtask = &section.subtask;
            out.push_str(&format!("Sub-Analysis {}: {}\n", i + 1, subtask.kind.label()));
            out.push_str(&format!("Reasoning: {}\n", subtask.reasoning));
            out.push_str(&format!("Query: {}\n\n", subtask.query));

            match &section.outcome {
                SubtaskOutcome::Completed(result) => {
                    out.push_str(&format!("Findings:\n{}\n\n", result.answer_text));
                }
                SubtaskOutcome::Failed { reason } => {
                    out.push_str(&format!("Error processing sub-task: {}\n\n", reason));
                }
            }

            out.push_str(&"-".repeat(30));
            out.push_str("\n\n");
        }

        out.push_str("Research Synthesis:\n");
        out.push_str(&format!(
            "Completed comprehensive analysis of '{}' through {} sub-analyses. ",
            self.query,
            self.sections.len()
        ));
        out.push_str(
            "This systematic approach ensures thorough coverage of the topic from multiple angles.\n",
        );
        out
    }
}

pub struct Orchestrator {
    stage: Arc<SynthesisStage>,
    decompose: bool,
}

impl Orchestrator {
    pub fn new(stage: Arc<SynthesisStage>, decompose: bool) -> Self {
        Self { stage, decompose }
    }

    pub fn run(&self, query: &str) -> ResearchReport {
        let Decomposition {
            subtasks,
            reasoning_steps,
        } = if self.decompose {
            decomposer::decompose(query)
        } else {
            decomposer::single_subtask(query)
        };

        tracing::info!("Running deep research over {} sub-tasks", subtasks.len());

        let sections = subtasks
            .into_iter()
            .map(|subtask| {
                let outcome = match self.stage.run(&subtask.query) {
                    Ok(result) => SubtaskOutcome::Completed(result),
                    Err(e) => {
                        tracing::warn!("Sub-task '{}' failed: {}", subtask.query, e);
                        SubtaskOutcome::Failed {
                            reason: e.to_string(),
                        }
                    }
                };
                ReportSection { subtask, outcome }
            })
            .collect();

        ResearchReport {
            query: query.to_string(),
            reasoning_steps,
            sections,
        }
    }
}
