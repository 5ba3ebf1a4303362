//! In-memory graph store.
//!
//! Follows the same merge semantics as the Neo4j statements: nodes are
//! keyed by label + identity key, properties are overwritten on every merge
//! (nulls remove them), an edge exists at most once per ordered pair and
//! type, and an exclusive edge replaces its siblings. Used by tests and by
//! `--dry-run`.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{
    EdgeMerge, EdgeOutcome, GraphCounts, GraphStore, NodeKey, NodeLabel, NodeMerge, NodeRef, PropValue, RelType,
    SchemaDeclaration,
};

pub type NodeId = (NodeLabel, NodeKey);
pub type Properties = BTreeMap<&'static str, PropValue>;

#[derive(Default)]
pub struct MemoryGraph {
    nodes: RwLock<BTreeMap<NodeId, Properties>>,
    edges: RwLock<BTreeSet<(NodeId, RelType, NodeId)>>,
    declarations: RwLock<Vec<String>>,
    rejected: HashSet<String>,
    failing: HashSet<NodeLabel>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `declare` for the named constraint or index.
    pub fn rejecting(mut self, declaration_name: impl Into<String>) -> Self {
        self.rejected.insert(declaration_name.into());
        self
    }

    /// Fail every `merge_node` for `label`.
    pub fn failing_label(mut self, label: NodeLabel) -> Self {
        self.failing.insert(label);
        self
    }

    /// Properties of one node.
    pub async fn node(&self, label: NodeLabel, key: impl Into<NodeKey>) -> Option<Properties> {
        self.nodes.read().await.get(&(label, key.into())).cloned()
    }

    pub async fn count_label(&self, label: NodeLabel) -> usize {
        self.nodes.read().await.keys().filter(|(l, _)| *l == label).count()
    }

    /// Targets of `rel` edges leaving the given node.
    pub async fn outgoing(&self, label: NodeLabel, key: impl Into<NodeKey>, rel: RelType) -> Vec<NodeId> {
        let from = (label, key.into());
        self.edges
            .read()
            .await
            .iter()
            .filter(|(f, r, _)| *f == from && *r == rel)
            .map(|(_, _, to)| to.clone())
            .collect()
    }

    /// Number of edges of one type.
    pub async fn count_rel(&self, rel: RelType) -> usize {
        self.edges.read().await.iter().filter(|(_, r, _)| *r == rel).count()
    }

    /// Names of successfully applied declarations, in order.
    pub async fn declarations(&self) -> Vec<String> {
        self.declarations.read().await.clone()
    }
}

fn resolve(nodes: &BTreeMap<NodeId, Properties>, node: &NodeRef) -> Vec<NodeId> {
    if node.property == node.label.key_property() {
        let id = (node.label, node.value.clone());
        return if nodes.contains_key(&id) { vec![id] } else { Vec::new() };
    }

    let wanted = PropValue::from(node.value.clone());
    nodes
        .iter()
        .filter(|((label, _), props)| *label == node.label && props.get(node.property) == Some(&wanted))
        .map(|(id, _)| id.clone())
        .collect()
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn merge_node(&self, node: &NodeMerge) -> Result<()> {
        if self.failing.contains(&node.label) {
            bail!("merge of {} rejected", node.node_ref());
        }
        let mut nodes = self.nodes.write().await;
        let props = nodes.entry((node.label, node.key.clone())).or_default();
        for (name, value) in &node.properties {
            match value {
                PropValue::Null => {
                    props.remove(name);
                }
                other => {
                    props.insert(*name, other.clone());
                }
            }
        }
        Ok(())
    }

    async fn merge_edge(&self, edge: &EdgeMerge) -> Result<EdgeOutcome> {
        let nodes = self.nodes.read().await;
        let from = resolve(&nodes, &edge.from);
        let to = resolve(&nodes, &edge.to);

        let mut edges = self.edges.write().await;
        if edge.exclusive {
            edges.retain(|(f, r, t)| !(from.contains(f) && *r == edge.rel && t.0 == edge.to.label && !to.contains(t)));
        }
        if from.is_empty() || to.is_empty() {
            return Ok(EdgeOutcome::MissingEndpoint);
        }

        for a in &from {
            for b in &to {
                edges.insert((a.clone(), edge.rel, b.clone()));
            }
        }
        Ok(EdgeOutcome::Linked)
    }

    async fn detach_edges(&self, from: &NodeRef, rel: RelType, target: NodeLabel) -> Result<usize> {
        let nodes = self.nodes.read().await;
        let sources = resolve(&nodes, from);

        let mut edges = self.edges.write().await;
        let before = edges.len();
        edges.retain(|(f, r, t)| !(sources.contains(f) && *r == rel && t.0 == target));
        Ok(before - edges.len())
    }

    async fn declare(&self, declaration: &SchemaDeclaration) -> Result<()> {
        let name = declaration.name();
        if self.rejected.contains(&name) {
            bail!("declaration {} rejected", name);
        }

        let mut declarations = self.declarations.write().await;
        if !declarations.contains(&name) {
            declarations.push(name);
        }
        Ok(())
    }

    async fn counts(&self) -> Result<GraphCounts> {
        Ok(GraphCounts {
            nodes: self.nodes.read().await.len(),
            relationships: self.edges.read().await.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_overwrites_and_clears() {
        let graph = MemoryGraph::new();
        graph
            .merge_node(&NodeMerge::new(NodeLabel::Epic, "PROJ-1").set("summary", "Old").set("assignee", "Alice"))
            .await
            .unwrap();
        graph
            .merge_node(&NodeMerge::new(NodeLabel::Epic, "PROJ-1").set("summary", "New").set("assignee", None::<String>))
            .await
            .unwrap();

        let props = graph.node(NodeLabel::Epic, "PROJ-1").await.unwrap();
        assert_eq!(props.get("summary"), Some(&PropValue::from("New")));
        assert!(!props.contains_key("assignee"));
        assert_eq!(graph.counts().await.unwrap().nodes, 1);
    }

    #[tokio::test]
    async fn test_edge_needs_both_endpoints() {
        let graph = MemoryGraph::new();
        let edge = EdgeMerge::new(
            NodeRef::by_key(NodeLabel::Story, "PROJ-2"),
            RelType::BelongsTo,
            NodeRef::by_key(NodeLabel::Epic, "PROJ-1"),
        );

        graph.merge_node(&NodeMerge::new(NodeLabel::Story, "PROJ-2")).await.unwrap();
        assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::MissingEndpoint);

        graph.merge_node(&NodeMerge::new(NodeLabel::Epic, "PROJ-1")).await.unwrap();
        assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::Linked);
        assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::Linked);
        assert_eq!(graph.count_rel(RelType::BelongsTo).await, 1);
    }

    #[tokio::test]
    async fn test_edge_by_secondary_property() {
        let graph = MemoryGraph::new();
        graph
            .merge_node(&NodeMerge::new(NodeLabel::GitHubRepository, 1_i64).set("full_name", "acme/widgets"))
            .await
            .unwrap();
        graph.merge_node(&NodeMerge::new(NodeLabel::GitHubIssue, 10_i64)).await.unwrap();

        let edge = EdgeMerge::new(
            NodeRef::by_key(NodeLabel::GitHubIssue, 10_i64),
            RelType::BelongsTo,
            NodeRef::by(NodeLabel::GitHubRepository, "full_name", "acme/widgets"),
        );
        assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::Linked);

        let targets = graph.outgoing(NodeLabel::GitHubIssue, 10_i64, RelType::BelongsTo).await;
        assert_eq!(targets, vec![(NodeLabel::GitHubRepository, NodeKey::Id(1))]);
    }

    #[tokio::test]
    async fn test_exclusive_edge_moves() {
        let graph = MemoryGraph::new();
        for key in ["PROJ-1", "PROJ-2"] {
            graph.merge_node(&NodeMerge::new(NodeLabel::Epic, key)).await.unwrap();
        }
        graph.merge_node(&NodeMerge::new(NodeLabel::Story, "PROJ-7")).await.unwrap();
        let story = || NodeRef::by_key(NodeLabel::Story, "PROJ-7");

        for parent in ["PROJ-1", "PROJ-2"] {
            let edge = EdgeMerge::exclusive(story(), RelType::BelongsTo, NodeRef::by_key(NodeLabel::Epic, parent));
            assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::Linked);
        }
        assert_eq!(
            graph.outgoing(NodeLabel::Story, "PROJ-7", RelType::BelongsTo).await,
            vec![(NodeLabel::Epic, NodeKey::from("PROJ-2"))]
        );

        // A missing target still clears the old edge.
        let edge = EdgeMerge::exclusive(story(), RelType::BelongsTo, NodeRef::by_key(NodeLabel::Epic, "PROJ-9"));
        assert_eq!(graph.merge_edge(&edge).await.unwrap(), EdgeOutcome::MissingEndpoint);
        assert_eq!(graph.count_rel(RelType::BelongsTo).await, 0);
    }

    #[tokio::test]
    async fn test_detach_edges() {
        let graph = MemoryGraph::new();
        graph.merge_node(&NodeMerge::new(NodeLabel::GitHubIssue, 10_i64)).await.unwrap();
        graph.merge_node(&NodeMerge::new(NodeLabel::GitHubMilestone, 300_i64)).await.unwrap();
        let issue = NodeRef::by_key(NodeLabel::GitHubIssue, 10_i64);
        graph
            .merge_edge(&EdgeMerge::new(
                issue.clone(),
                RelType::Targets,
                NodeRef::by_key(NodeLabel::GitHubMilestone, 300_i64),
            ))
            .await
            .unwrap();

        assert_eq!(graph.detach_edges(&issue, RelType::Targets, NodeLabel::GitHubMilestone).await.unwrap(), 1);
        assert_eq!(graph.detach_edges(&issue, RelType::Targets, NodeLabel::GitHubMilestone).await.unwrap(), 0);
        assert_eq!(graph.count_rel(RelType::Targets).await, 0);
    }

    #[tokio::test]
    async fn test_rejected_declaration() {
        let graph = MemoryGraph::new().rejecting("epic_key_unique");
        assert!(graph.declare(&SchemaDeclaration::Unique { label: NodeLabel::Epic }).await.is_err());
        assert!(graph.declare(&SchemaDeclaration::Unique { label: NodeLabel::Story }).await.is_ok());
        assert_eq!(graph.declarations().await, vec!["story_key_unique".to_string()]);
    }
}
