//! Research pipeline with substitute backends: decomposition, fusion,
//! orchestration with a failing subtask, and agent routing

use delve::research::{
    decompose, extract_main_topic, KeywordAgent, Orchestrator, ResearchAgent, SubtaskKind,
    SubtaskOutcome, SynthesisStage, Toolkit,
};
use delve::retrieval::{
    Answer, AnswerBackend, FusionRetriever, QueryEngine, RetrievedNode, Retriever, SearchError,
    FILE_NAME_KEY, NO_PASSAGES_FOUND,
};
use std::sync::Arc;

struct Fixed(Vec<&'static str>);

impl Retriever for Fixed {
    fn retrieve(&self, _query: &str) -> Result<Vec<RetrievedNode>, SearchError> {
        Ok(self
            .0
            .iter()
            .map(|id| {
                RetrievedNode::new(*id, 1.0, format!("Passage {}. More detail follows.", id))
                    .with_metadata(FILE_NAME_KEY, format!("{}.md", id.to_lowercase()))
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Answers every query except those mentioning `poison`
struct FailsOn {
    poison: &'static str,
}

impl AnswerBackend for FailsOn {
    fn query(&self, text: &str) -> Result<Answer, SearchError> {
        if text.contains(self.poison) {
            return Err(SearchError::VectorSearchError("backend unavailable".to_string()));
        }
        Ok(Answer::new(
            format!("answer for {}", text),
            vec![RetrievedNode::new("1", 0.9, "x").with_metadata(FILE_NAME_KEY, "notes.md")],
        ))
    }
}

fn stage(backend: impl AnswerBackend + 'static) -> Arc<SynthesisStage> {
    Arc::new(SynthesisStage::new(Arc::new(backend), 3))
}

#[test]
fn test_comparison_queries_only_yield_comparison_subtasks() {
    let queries = [
        "Compare solar and wind",
        "python vs rust",
        "What is the difference between TCP and UDP?",
        "compare",
    ];

    for query in queries {
        let decomposition = decompose(query);
        assert!(!decomposition.subtasks.is_empty(), "{}", query);
        assert!(decomposition
            .subtasks
            .iter()
            .all(|s| s.kind == SubtaskKind::Comparison));
    }

    assert_eq!(decompose("python vs rust").subtasks.len(), 2);
    // No usable concept: the whole query is the only comparison target
    assert_eq!(decompose("compare").subtasks.len(), 1);
}

#[test]
fn test_pros_cons_and_general_queries() {
    let query = "What are the advantages and disadvantages of X?";
    let subtasks = decompose(query).subtasks;
    assert_eq!(subtasks.len(), 2);
    assert_eq!(subtasks[0].kind, SubtaskKind::ProsConsPos);
    assert_eq!(subtasks[1].kind, SubtaskKind::ProsConsNeg);
    let topic = extract_main_topic(query);
    assert!(subtasks.iter().all(|s| s.query.contains(&topic)));

    let general = decompose("Tell me about quantum computing").subtasks;
    assert_eq!(general.len(), 2);
    assert_eq!(general[0].kind, SubtaskKind::Background);
    assert_eq!(general[1].kind, SubtaskKind::Detail);
    assert_eq!(general[1].query, "Tell me about quantum computing");
}

#[test]
fn test_decomposition_is_pure() {
    let query = "How to train a transformer model step by step";
    assert_eq!(extract_main_topic(query), extract_main_topic(query));
    assert_eq!(decompose(query), decompose(query));
}

#[test]
fn test_fusion_keeps_lexical_order_then_new_semantic_hits() {
    let fusion = FusionRetriever::hybrid(
        Arc::new(Fixed(vec!["A", "B", "C"])),
        Arc::new(Fixed(vec!["B", "D", "A"])),
    );

    let ids: Vec<String> = fusion
        .retrieve("anything")
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec!["A", "B", "C", "D"]);
}

#[test]
fn test_one_failing_subtask_keeps_the_report() {
    let orchestrator = Orchestrator::new(stage(FailsOn { poison: "beta" }), true);

    let report = orchestrator.run("compare alpha and beta and gamma");

    assert_eq!(report.sections.len(), 3);
    assert_eq!(report.completed_count(), 2);
    assert!(matches!(
        report.sections[1].outcome,
        SubtaskOutcome::Failed { .. }
    ));

    let text = report.render();
    assert_eq!(text.matches("Sub-Analysis ").count(), 3);
    assert_eq!(text.matches("Error processing sub-task:").count(), 1);
    assert!(text.contains("answer for What are the key characteristics and properties of gamma?"));
    assert!(text.contains("through 3 sub-analyses"));
}

#[test]
fn test_degraded_engine_answers_extractively() {
    let engine = QueryEngine::new(Arc::new(FusionRetriever::semantic_only(Arc::new(Fixed(
        vec!["A", "B"],
    )))));
    let stage = stage(engine);

    let block = stage.synthesize("what is A");
    assert!(block.starts_with("Research Synthesis for: what is A"));
    assert!(block.contains("[a.md] Passage A."));
    assert!(block.contains("1. a.md\n2. b.md"));
    assert!(block.contains("- Found 2 relevant sources"));

    let empty = QueryEngine::new(Arc::new(FusionRetriever::semantic_only(Arc::new(Fixed(
        vec![],
    )))));
    let answer = empty.query("nothing").unwrap();
    assert_eq!(answer.response_text, NO_PASSAGES_FOUND);
}

#[test]
fn test_keyword_agent_routes_to_tools() {
    let agent = KeywordAgent::new(Toolkit::new(stage(FailsOn { poison: "never" }), true));

    let synthesis = agent.chat("entropy in closed systems");
    assert!(synthesis.starts_with("Research Synthesis for: entropy in closed systems"));

    let deep = agent.chat("analyze the history of entropy");
    assert!(deep.starts_with("Deep Research Analysis: analyze the history of entropy"));

    let refined = agent.chat("refine entropy");
    assert!(refined.starts_with("Follow-up Research Suggestions for: 'entropy'"));

    let failed = agent.chat("   ");
    assert!(failed.starts_with("Error processing query:"));
}
