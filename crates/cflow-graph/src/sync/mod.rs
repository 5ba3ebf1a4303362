//! Entity to graph synchronization.
//!
//! Each `sync_*` function upserts one entity's node and then its edges, so
//! an entity is complete in the graph before the caller moves on. Edges whose
//! endpoint is not in the graph yet are kept as pending intents that
//! [`reconcile_edges`] can retry later.

pub mod architecture_sync;
pub mod github_sync;
pub mod jira_sync;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::store::{EdgeMerge, EdgeOutcome, GraphStore, NodeLabel, NodeMerge, NodeRef, RelType};

pub use architecture_sync::sync_element;
pub use github_sync::{sync_issue, sync_milestone, sync_project, sync_repository};
pub use jira_sync::{sync_epic, sync_story};

/// Result of a sync operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub nodes_merged: usize,
    pub relationships_linked: usize,
    /// Edges not created because an endpoint was missing.
    pub pending_edges: Vec<EdgeMerge>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.nodes_merged += other.nodes_merged;
        self.relationships_linked += other.relationships_linked;
        self.pending_edges.extend(other.pending_edges);
    }
}

pub(crate) async fn upsert_node(store: &dyn GraphStore, node: &NodeMerge, result: &mut SyncResult) -> Result<()> {
    store.merge_node(node).await?;
    result.nodes_merged += 1;
    Ok(())
}

pub(crate) async fn link(store: &dyn GraphStore, edge: EdgeMerge, result: &mut SyncResult) -> Result<()> {
    match store.merge_edge(&edge).await? {
        EdgeOutcome::Linked => result.relationships_linked += 1,
        EdgeOutcome::MissingEndpoint => {
            debug!(edge = %edge, "Deferring edge, endpoint not synced yet");
            result.pending_edges.push(edge);
        }
    }
    Ok(())
}

/// Point a single-valued relationship at `to`, or drop it when there is none.
pub(crate) async fn relink(
    store: &dyn GraphStore,
    from: NodeRef,
    rel: RelType,
    target: NodeLabel,
    to: Option<NodeRef>,
    result: &mut SyncResult,
) -> Result<()> {
    match to {
        Some(to) => link(store, EdgeMerge::exclusive(from, rel, to), result).await,
        None => {
            let removed = store.detach_edges(&from, rel, target).await?;
            if removed > 0 {
                debug!(from = %from, rel = %rel, removed, "Detached stale edges");
            }
            Ok(())
        }
    }
}

/// Retry deferred edges.
///
/// Edges that still miss an endpoint come back in `pending_edges`.
pub async fn reconcile_edges(store: &dyn GraphStore, pending: Vec<EdgeMerge>) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    if pending.is_empty() {
        return Ok(result);
    }

    let attempted = pending.len();
    for edge in pending {
        link(store, edge, &mut result).await?;
    }

    info!(
        attempted,
        linked = result.relationships_linked,
        still_pending = result.pending_edges.len(),
        "Reconciled deferred edges"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;

    fn story_edge() -> EdgeMerge {
        EdgeMerge::new(
            NodeRef::by_key(NodeLabel::Story, "PROJ-2"),
            RelType::BelongsTo,
            NodeRef::by_key(NodeLabel::Epic, "PROJ-1"),
        )
    }

    #[tokio::test]
    async fn test_reconcile_links_once_parent_exists() {
        let graph = MemoryGraph::new();
        graph.merge_node(&NodeMerge::new(NodeLabel::Story, "PROJ-2")).await.unwrap();

        let first = reconcile_edges(&graph, vec![story_edge()]).await.unwrap();
        assert_eq!(first.pending_edges, vec![story_edge()]);

        graph.merge_node(&NodeMerge::new(NodeLabel::Epic, "PROJ-1")).await.unwrap();
        let second = reconcile_edges(&graph, first.pending_edges).await.unwrap();

        assert_eq!(second.relationships_linked, 1);
        assert!(second.pending_edges.is_empty());
    }

    #[test]
    fn test_merge_results() {
        let mut total = SyncResult {
            nodes_merged: 1,
            relationships_linked: 1,
            pending_edges: vec![],
        };
        total.merge(SyncResult {
            nodes_merged: 2,
            relationships_linked: 0,
            pending_edges: vec![story_edge()],
        });

        assert_eq!(total.nodes_merged, 3);
        assert_eq!(total.relationships_linked, 1);
        assert_eq!(total.pending_edges.len(), 1);
    }
}
