//! C4 architecture element synchronization.
//!
//! Each element belongs to its parent one level up:
//! (:Code)->(:Component)->(:Container)->(:Context), all `BELONGS_TO`.

use anyhow::Result;
use tracing::debug;

use cflow_core::{ArchitectureElement, C4Level};

use super::{relink, upsert_node, SyncResult};
use crate::store::{GraphStore, NodeLabel, NodeMerge, NodeRef, RelType};

pub fn level_label(level: C4Level) -> NodeLabel {
    match level {
        C4Level::Context => NodeLabel::Context,
        C4Level::Container => NodeLabel::Container,
        C4Level::Component => NodeLabel::Component,
        C4Level::Code => NodeLabel::Code,
    }
}

pub fn element_node(element: &ArchitectureElement) -> NodeMerge {
    NodeMerge::new(level_label(element.level), element.name.as_str())
        .set("description", element.description.clone())
        .set("technology", element.technology.clone())
}

/// Upsert an element and link it to its parent element.
pub async fn sync_element(store: &dyn GraphStore, element: &ArchitectureElement) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let node = element_node(element);
    upsert_node(store, &node, &mut result).await?;

    if let Some(parent_level) = element.level.parent_level() {
        let parent_label = level_label(parent_level);
        relink(
            store,
            node.node_ref(),
            RelType::BelongsTo,
            parent_label,
            element.parent.as_deref().map(|parent| NodeRef::by_key(parent_label, parent)),
            &mut result,
        )
        .await?;
    }

    debug!(level = %element.level, name = %element.name, "Synced architecture element");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::store::NodeKey;

    #[tokio::test]
    async fn test_container_links_to_context() {
        let graph = MemoryGraph::new();
        let context = ArchitectureElement::new(C4Level::Context, "ContextFlow", None, None, None).unwrap();
        let container = ArchitectureElement::new(
            C4Level::Container,
            "Collector",
            Some("ContextFlow".into()),
            None,
            Some("Rust".into()),
        )
        .unwrap();

        sync_element(&graph, &context).await.unwrap();
        let result = sync_element(&graph, &container).await.unwrap();

        assert_eq!(result.relationships_linked, 1);
        let targets = graph.outgoing(NodeLabel::Container, "Collector", RelType::BelongsTo).await;
        assert_eq!(targets, vec![(NodeLabel::Context, NodeKey::from("ContextFlow"))]);
    }

    #[tokio::test]
    async fn test_moved_container_has_one_parent() {
        let graph = MemoryGraph::new();
        for name in ["Billing", "Shipping"] {
            let context = ArchitectureElement::new(C4Level::Context, name, None, None, None).unwrap();
            sync_element(&graph, &context).await.unwrap();
        }

        for parent in ["Billing", "Shipping"] {
            let container =
                ArchitectureElement::new(C4Level::Container, "Ledger", Some(parent.into()), None, None).unwrap();
            sync_element(&graph, &container).await.unwrap();
        }

        let targets = graph.outgoing(NodeLabel::Container, "Ledger", RelType::BelongsTo).await;
        assert_eq!(targets, vec![(NodeLabel::Context, NodeKey::from("Shipping"))]);
    }

    #[tokio::test]
    async fn test_same_name_on_different_levels() {
        let graph = MemoryGraph::new();
        let context = ArchitectureElement::new(C4Level::Context, "Billing", None, None, None).unwrap();
        let container =
            ArchitectureElement::new(C4Level::Container, "Billing", Some("Billing".into()), None, None).unwrap();

        sync_element(&graph, &context).await.unwrap();
        sync_element(&graph, &container).await.unwrap();

        assert_eq!(graph.counts().await.unwrap().nodes, 2);
    }
}
