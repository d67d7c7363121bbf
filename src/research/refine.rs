//! Follow-up question suggestions

use crate::research::decomposer;

/// Suggest deeper exploration paths for a query
pub fn refine(query: &str) -> String {
    let decomposition = decomposer::decompose(query);

    let mut out = format!("Follow-up Research Suggestions for: '{}'\n\n", query);

    out.push_str("Suggested deeper exploration paths:\n");
    for (i, subtask) in decomposition.subtasks.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, subtask.query));
    }

    out.push_str("\nGeneral refinement directions:\n");
    out.push_str(&format!(
        "• What are the practical applications of concepts in '{}'?\n",
        query
    ));
    out.push_str(&format!(
        "• What are the limitations or challenges related to '{}'?\n",
        query
    ));
    out.push_str(&format!("• How has '{}' evolved over time?\n", query));
    out.push_str(&format!("• What are alternative approaches to '{}'?\n", query));
    out
}
