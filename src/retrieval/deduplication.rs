//! Result deduplication by node identity

use crate::retrieval::RetrievedNode;
use ahash::AHashSet;

/// Deduplicate nodes by id, keeping the first occurrence
///
/// Order of the surviving nodes is the input order.
pub fn deduplicate_nodes(nodes: impl IntoIterator<Item = RetrievedNode>) -> Vec<RetrievedNode> {
    let mut seen: AHashSet<String> = AHashSet::new();

    nodes
        .into_iter()
        .filter(|node| seen.insert(node.id.clone()))
        .collect()
}
