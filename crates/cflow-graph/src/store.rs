//! Graph store abstraction.
//!
//! Every label, relationship type and property name that reaches a statement
//! comes from the closed enums and `&'static str` names defined here. Values
//! always travel as parameters.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use cflow_core::Timestamp;
use serde::Serialize;

/// Node labels known to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NodeLabel {
    GitHubRepository,
    GitHubIssue,
    GitHubProject,
    GitHubMilestone,
    Epic,
    Story,
    Context,
    Container,
    Component,
    Code,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 10] = [
        Self::GitHubRepository,
        Self::GitHubIssue,
        Self::GitHubProject,
        Self::GitHubMilestone,
        Self::Epic,
        Self::Story,
        Self::Context,
        Self::Container,
        Self::Component,
        Self::Code,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GitHubRepository => "GitHubRepository",
            Self::GitHubIssue => "GitHubIssue",
            Self::GitHubProject => "GitHubProject",
            Self::GitHubMilestone => "GitHubMilestone",
            Self::Epic => "Epic",
            Self::Story => "Story",
            Self::Context => "Context",
            Self::Container => "Container",
            Self::Component => "Component",
            Self::Code => "Code",
        }
    }

    /// Lowercase prefix for constraint and index names.
    pub fn schema_prefix(&self) -> &'static str {
        match self {
            Self::GitHubRepository => "github_repository",
            Self::GitHubIssue => "github_issue",
            Self::GitHubProject => "github_project",
            Self::GitHubMilestone => "github_milestone",
            Self::Epic => "epic",
            Self::Story => "story",
            Self::Context => "context",
            Self::Container => "container",
            Self::Component => "component",
            Self::Code => "code",
        }
    }

    /// Property holding the identity key for this label.
    pub fn key_property(&self) -> &'static str {
        match self {
            Self::GitHubRepository | Self::GitHubIssue | Self::GitHubProject | Self::GitHubMilestone => "id",
            Self::Epic | Self::Story => "key",
            Self::Context | Self::Container | Self::Component | Self::Code => "name",
        }
    }
}

impl fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relationship types. Fixed per entity pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RelType {
    BelongsTo,
    HostedIn,
    Targets,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BelongsTo => "BELONGS_TO",
            Self::HostedIn => "HOSTED_IN",
            Self::Targets => "TARGETS",
        }
    }
}

impl fmt::Display for RelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value used to match a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum NodeKey {
    Id(i64),
    Name(String),
}

impl From<i64> for NodeKey {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for NodeKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for NodeKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Property value written to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    /// Removes the property from the node.
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    Timestamp(Timestamp),
}

impl PropValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for PropValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Vec<String>> for PropValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

impl From<Timestamp> for PropValue {
    fn from(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<NodeKey> for PropValue {
    fn from(key: NodeKey) -> Self {
        match key {
            NodeKey::Id(id) => Self::Int(id),
            NodeKey::Name(name) => Self::Text(name),
        }
    }
}

/// Pattern identifying a single node: `(:label {property: value})`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub property: &'static str,
    pub value: NodeKey,
}

impl NodeRef {
    /// Match on the label's identity key.
    pub fn by_key(label: NodeLabel, value: impl Into<NodeKey>) -> Self {
        Self {
            label,
            property: label.key_property(),
            value: value.into(),
        }
    }

    /// Match on another unique property (e.g. a repository's `full_name`).
    pub fn by(label: NodeLabel, property: &'static str, value: impl Into<NodeKey>) -> Self {
        Self {
            label,
            property,
            value: value.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(:{} {{{}: {}}})", self.label, self.property, self.value)
    }
}

/// Create-or-update of one node, overwriting every listed property.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMerge {
    pub label: NodeLabel,
    pub key: NodeKey,
    pub properties: Vec<(&'static str, PropValue)>,
}

impl NodeMerge {
    pub fn new(label: NodeLabel, key: impl Into<NodeKey>) -> Self {
        Self {
            label,
            key: key.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property. Later values for the same name replace earlier ones.
    pub fn set(mut self, name: &'static str, value: impl Into<PropValue>) -> Self {
        let value = value.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
        self
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::by_key(self.label, self.key.clone())
    }
}

/// Create-if-absent of one typed edge between two existing nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeMerge {
    pub from: NodeRef,
    pub rel: RelType,
    pub to: NodeRef,
    /// `from` keeps at most one `rel` edge to a node labelled like `to`;
    /// any other such edge is removed by the merge.
    pub exclusive: bool,
}

impl EdgeMerge {
    pub fn new(from: NodeRef, rel: RelType, to: NodeRef) -> Self {
        Self {
            from,
            rel,
            to,
            exclusive: false,
        }
    }

    /// Single-valued relationship such as an issue's milestone or a story's epic.
    pub fn exclusive(from: NodeRef, rel: RelType, to: NodeRef) -> Self {
        Self {
            exclusive: true,
            ..Self::new(from, rel, to)
        }
    }
}

impl fmt::Display for EdgeMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-[:{}]->{}", self.from, self.rel, self.to)
    }
}

/// Result of an edge merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The edge exists now (created or already present).
    Linked,
    /// One of the endpoints does not exist yet; nothing was written.
    MissingEndpoint,
}

/// A constraint or index the graph should carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaDeclaration {
    Unique { label: NodeLabel },
    Index { label: NodeLabel, property: &'static str },
}

impl SchemaDeclaration {
    /// Stable identifier used as the constraint/index name.
    pub fn name(&self) -> String {
        match self {
            Self::Unique { label } => format!("{}_{}_unique", label.schema_prefix(), label.key_property()),
            Self::Index { label, property } => format!("{}_{}_idx", label.schema_prefix(), property),
        }
    }
}

/// Node and relationship counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphCounts {
    pub nodes: usize,
    pub relationships: usize,
}

/// Write-side operations the synchronization engine needs.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert a node by identity key in one atomic statement.
    async fn merge_node(&self, node: &NodeMerge) -> Result<()>;

    /// Create the edge unless it exists. Missing endpoints are not an error.
    ///
    /// An exclusive edge first drops the other `rel` edges from `from` to
    /// nodes with the target's label, even when the target is missing.
    async fn merge_edge(&self, edge: &EdgeMerge) -> Result<EdgeOutcome>;

    /// Remove every `rel` edge from `from` to a node labelled `target`.
    /// Returns how many were removed.
    async fn detach_edges(&self, from: &NodeRef, rel: RelType, target: NodeLabel) -> Result<usize>;

    /// Apply one constraint or index declaration. Idempotent.
    async fn declare(&self, declaration: &SchemaDeclaration) -> Result<()>;

    async fn counts(&self) -> Result<GraphCounts>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_properties() {
        assert_eq!(NodeLabel::GitHubIssue.key_property(), "id");
        assert_eq!(NodeLabel::Story.key_property(), "key");
        assert_eq!(NodeLabel::Component.key_property(), "name");
    }

    #[test]
    fn test_set_replaces_existing_property() {
        let node = NodeMerge::new(NodeLabel::GitHubIssue, 1_i64)
            .set("title", "old")
            .set("state", "open")
            .set("title", "new");

        assert_eq!(node.properties.len(), 2);
        assert_eq!(node.properties[0], ("title", PropValue::from("new")));
    }

    #[test]
    fn test_optional_values_become_null() {
        assert_eq!(PropValue::from(None::<String>), PropValue::Null);
        assert_eq!(PropValue::from(Some(3_i64)), PropValue::Int(3));
    }

    #[test]
    fn test_declaration_names() {
        let unique = SchemaDeclaration::Unique { label: NodeLabel::GitHubRepository };
        assert_eq!(unique.name(), "github_repository_id_unique");

        let index = SchemaDeclaration::Index { label: NodeLabel::Story, property: "status" };
        assert_eq!(index.name(), "story_status_idx");
    }

    #[test]
    fn test_edge_display() {
        let edge = EdgeMerge::new(
            NodeRef::by_key(NodeLabel::Story, "PROJ-2"),
            RelType::BelongsTo,
            NodeRef::by_key(NodeLabel::Epic, "PROJ-1"),
        );
        assert_eq!(edge.to_string(), "(:Story {key: PROJ-2})-[:BELONGS_TO]->(:Epic {key: PROJ-1})");
    }
}
