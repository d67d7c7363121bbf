//! Query classification and decomposition
//!
//! A query is matched against an ordered rule table. The first rule whose
//! trigger terms appear in the lowercased query expands it into subtasks;
//! a query that matches nothing falls through to the general rule.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a generated subtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskKind {
    Comparison,
    Process,
    ProsConsPos,
    ProsConsNeg,
    ApplicationsTheory,
    ApplicationsPractice,
    Background,
    Detail,
}

impl SubtaskKind {
    /// Heading used for the subtask in research reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::Comparison => "Concept Analysis",
            Self::Process => "Process Analysis",
            Self::ProsConsPos => "Advantages Analysis",
            Self::ProsConsNeg => "Limitations Analysis",
            Self::ApplicationsTheory => "Theoretical Analysis",
            Self::ApplicationsPractice => "Practical Applications",
            Self::Background => "Background Research",
            Self::Detail => "Detailed Analysis",
        }
    }
}

impl fmt::Display for SubtaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A derived sub-query with its category and rationale
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub kind: SubtaskKind,
    pub query: String,
    pub reasoning: String,
}

impl Subtask {
    fn new(kind: SubtaskKind, query: String, reasoning: impl Into<String>) -> Self {
        Self {
            kind,
            query,
            reasoning: reasoning.into(),
        }
    }
}

/// Result of one decomposition call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decomposition {
    pub subtasks: Vec<Subtask>,
    pub reasoning_steps: Vec<String>,
}

/// One entry of the classification table
struct Rule {
    /// Any of these substrings of the lowercased query selects the rule
    triggers: &'static [&'static str],
    announcement: &'static str,
    expand: fn(&str) -> Vec<Subtask>,
}

impl Rule {
    fn matches(&self, lowered: &str) -> bool {
        self.triggers.iter().any(|t| lowered.contains(t))
    }
}

const GENERAL_ANNOUNCEMENT: &str = "General query - breaking into background and specific analysis";

/// Evaluated top to bottom; first match wins
const RULES: &[Rule] = &[
    Rule {
        triggers: &["compare", "versus", "vs", "difference"],
        announcement: "Detected comparison query - need to analyze multiple concepts",
        expand: expand_comparison,
    },
    Rule {
        triggers: &["steps", "process", "how to", "methodology"],
        announcement: "Detected process/methodology query - need step-by-step breakdown",
        expand: expand_process,
    },
    Rule {
        triggers: &["advantages", "benefits", "disadvantages", "limitations"],
        announcement: "Detected pros/cons analysis query",
        expand: expand_pros_cons,
    },
    Rule {
        triggers: &["applications", "use cases", "examples"],
        announcement: "Detected applications/use cases query",
        expand: expand_applications,
    },
];

const TOPIC_STOP_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "is", "are", "the", "of",
];

const COMPARISON_CONNECTORS: &[&str] = &["vs", "versus", "and", "compared"];

/// Decompose a query into ordered subtasks plus a fresh reasoning trace
///
/// Pure function of the query text.
pub fn decompose(query: &str) -> Decomposition {
    let lowered = query.to_lowercase();
    let mut reasoning_steps = vec![format!("Original query: {}", query)];

    let subtasks = match RULES.iter().find(|rule| rule.matches(&lowered)) {
        Some(rule) => {
            reasoning_steps.push(rule.announcement.to_string());
            (rule.expand)(query)
        }
        None => {
            reasoning_steps.push(GENERAL_ANNOUNCEMENT.to_string());
            expand_general(query)
        }
    };

    reasoning_steps.push(format!(
        "Generated {} sub-tasks for systematic analysis",
        subtasks.len()
    ));

    tracing::debug!(subtasks = subtasks.len(), "Decomposed query");

    Decomposition {
        subtasks,
        reasoning_steps,
    }
}

/// Treat the whole query as a single detail subtask
pub fn single_subtask(query: &str) -> Decomposition {
    Decomposition {
        subtasks: vec![Subtask::new(
            SubtaskKind::Detail,
            query.to_string(),
            "Detailed analysis based on original query",
        )],
        reasoning_steps: vec![
            format!("Original query: {}", query),
            "Query decomposition disabled - analyzing the query as a whole".to_string(),
            "Generated 1 sub-tasks for systematic analysis".to_string(),
        ],
    }
}

/// Crude topic extraction: first three non stop-word tokens longer than two characters
pub fn extract_main_topic(query: &str) -> String {
    let lowered = query.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| !TOPIC_STOP_WORDS.contains(w) && w.chars().count() > 2)
        .take(3)
        .collect();

    if words.is_empty() {
        query.to_string()
    } else {
        words.join(" ")
    }
}

/// Tokens adjacent to comparison connectors, cleaned and deduplicated
///
/// The length check applies to the raw token, before punctuation is
/// stripped. Falls back to the whole query when nothing survives.
pub fn extract_comparison_concepts(query: &str) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut concepts: Vec<String> = Vec::new();

    for (i, word) in words.iter().enumerate() {
        if !COMPARISON_CONNECTORS.contains(&word.to_lowercase().as_str()) {
            continue;
        }

        let neighbours = [
            i.checked_sub(1).and_then(|j| words.get(j)),
            words.get(i + 1),
        ];

        for candidate in neighbours.into_iter().flatten() {
            if candidate.chars().count() <= 2 {
                continue;
            }
            let cleaned = candidate
                .trim_matches(|c| matches!(c, '.' | ',' | '?' | '!'))
                .to_lowercase();
            if !concepts.contains(&cleaned) {
                concepts.push(cleaned);
            }
        }
    }

    if concepts.is_empty() {
        vec![query.to_string()]
    } else {
        concepts
    }
}

fn expand_comparison(query: &str) -> Vec<Subtask> {
    extract_comparison_concepts(query)
        .into_iter()
        .map(|concept| {
            Subtask::new(
                SubtaskKind::Comparison,
                format!(
                    "What are the key characteristics and properties of {}?",
                    concept
                ),
                format!("Need to understand {} for comparison", concept),
            )
        })
        .collect()
}

fn expand_process(query: &str) -> Vec<Subtask> {
    vec![Subtask::new(
        SubtaskKind::Process,
        format!("What are the detailed steps or methodology for: {}", query),
        "Breaking down the process into sequential steps",
    )]
}

fn expand_pros_cons(query: &str) -> Vec<Subtask> {
    let topic = extract_main_topic(query);
    vec![
        Subtask::new(
            SubtaskKind::ProsConsPos,
            format!("What are the advantages and benefits of {}?", topic),
            "Analyzing positive aspects",
        ),
        Subtask::new(
            SubtaskKind::ProsConsNeg,
            format!("What are the limitations and challenges of {}?", topic),
            "Analyzing negative aspects or challenges",
        ),
    ]
}

fn expand_applications(query: &str) -> Vec<Subtask> {
    let topic = extract_main_topic(query);
    vec![
        Subtask::new(
            SubtaskKind::ApplicationsTheory,
            format!("What is the theoretical foundation of {}?", topic),
            "Understanding the theoretical background",
        ),
        Subtask::new(
            SubtaskKind::ApplicationsPractice,
            format!(
                "What are real-world applications and use cases of {}?",
                topic
            ),
            "Finding practical implementations",
        ),
    ]
}

fn expand_general(query: &str) -> Vec<Subtask> {
    let topic = extract_main_topic(query);
    vec![
        Subtask::new(
            SubtaskKind::Background,
            format!(
                "What is the background and fundamental concepts of {}?",
                topic
            ),
            "Establishing foundational understanding",
        ),
        Subtask::new(
            SubtaskKind::Detail,
            query.to_string(),
            "Detailed analysis based on original query",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(d: &Decomposition) -> Vec<SubtaskKind> {
        d.subtasks.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn test_comparison_concepts() {
        let d = decompose("Compare Python vs Rust.");
        assert_eq!(kinds(&d), vec![SubtaskKind::Comparison; 2]);
        assert_eq!(
            d.subtasks[0].query,
            "What are the key characteristics and properties of python?"
        );
        assert_eq!(d.subtasks[1].reasoning, "Need to understand rust for comparison");
    }

    #[test]
    fn test_comparison_deduplicates_concepts() {
        let concepts = extract_comparison_concepts("cats and dogs versus dogs");
        assert_eq!(concepts, vec!["cats", "dogs"]);
    }

    #[test]
    fn test_comparison_fallback_to_query() {
        let d = decompose("difference between these");
        assert_eq!(d.subtasks.len(), 1);
        assert_eq!(d.subtasks[0].kind, SubtaskKind::Comparison);
        assert!(d.subtasks[0].query.ends_with("of difference between these?"));
    }

    #[test]
    fn test_short_raw_tokens_are_dropped() {
        // "AI," is three characters raw, "ML" only two
        assert_eq!(extract_comparison_concepts("AI, vs ML"), vec!["ai"]);
    }

    #[test]
    fn test_first_rule_wins() {
        // Contains both a comparison and a process trigger
        let d = decompose("compare the process of A and B");
        assert!(d.subtasks.iter().all(|s| s.kind == SubtaskKind::Comparison));
    }

    #[test]
    fn test_process_rule() {
        let d = decompose("How to train a tokenizer");
        assert_eq!(kinds(&d), vec![SubtaskKind::Process]);
        assert_eq!(
            d.subtasks[0].query,
            "What are the detailed steps or methodology for: How to train a tokenizer"
        );
    }

    #[test]
    fn test_pros_cons_order() {
        let query = "What are the advantages and disadvantages of X?";
        let d = decompose(query);
        let topic = extract_main_topic(query);

        assert_eq!(
            kinds(&d),
            vec![SubtaskKind::ProsConsPos, SubtaskKind::ProsConsNeg]
        );
        assert!(d.subtasks.iter().all(|s| s.query.contains(&topic)));
    }

    #[test]
    fn test_applications_theory_before_practice() {
        let d = decompose("Applications of graph neural networks");
        assert_eq!(
            kinds(&d),
            vec![
                SubtaskKind::ApplicationsTheory,
                SubtaskKind::ApplicationsPractice
            ]
        );
        assert_eq!(
            d.subtasks[0].query,
            "What is the theoretical foundation of applications graph neural?"
        );
    }

    #[test]
    fn test_general_fallback() {
        let query = "Tell me about quantum computing";
        let d = decompose(query);

        assert_eq!(kinds(&d), vec![SubtaskKind::Background, SubtaskKind::Detail]);
        assert_eq!(
            d.subtasks[0].query,
            "What is the background and fundamental concepts of tell about quantum?"
        );
        assert_eq!(d.subtasks[1].query, query);
    }

    #[test]
    fn test_reasoning_trace_is_per_call() {
        let d = decompose("Tell me about quantum computing");
        assert_eq!(
            d.reasoning_steps,
            vec![
                "Original query: Tell me about quantum computing".to_string(),
                GENERAL_ANNOUNCEMENT.to_string(),
                "Generated 2 sub-tasks for systematic analysis".to_string(),
            ]
        );
        assert_eq!(decompose("Tell me about quantum computing"), d);
    }

    #[test]
    fn test_topic_extraction() {
        assert_eq!(extract_main_topic("What is the role of entropy"), "role entropy");
        assert_eq!(extract_main_topic("is it ok"), "is it ok");
        assert_eq!(
            extract_main_topic("Explain transformer attention heads today"),
            extract_main_topic("Explain transformer attention heads today")
        );
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&SubtaskKind::ProsConsNeg).unwrap();
        assert_eq!(json, "\"pros_cons_neg\"");
        assert_eq!(SubtaskKind::Background.to_string(), "Background Research");
    }
}
