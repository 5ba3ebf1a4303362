//! Cypher statement construction.
//!
//! Pure functions from store operations to statement text plus parameters.
//! Only closed-enum labels, relationship types and static property names are
//! spliced into the text.

use crate::store::{EdgeMerge, NodeKey, NodeLabel, NodeMerge, NodeRef, PropValue, RelType, SchemaDeclaration};

/// Statement text with its named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub params: Vec<(String, PropValue)>,
}

impl Statement {
    fn new(text: String) -> Self {
        Self { text, params: Vec::new() }
    }

    fn param(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// `MERGE (n:Label {key: $key}) SET n.p = $p_p, ...`
///
/// Null values clear the property so no stale value survives an update.
pub fn node_merge(node: &NodeMerge) -> Statement {
    let mut text = format!(
        "MERGE (n:{} {{{}: $key}})",
        node.label.as_str(),
        node.label.key_property()
    );

    let assignments: Vec<String> = node
        .properties
        .iter()
        .map(|(name, value)| match value {
            PropValue::Timestamp(_) => format!("n.{name} = datetime($p_{name})"),
            _ => format!("n.{name} = $p_{name}"),
        })
        .collect();
    if !assignments.is_empty() {
        text.push_str("\nSET ");
        text.push_str(&assignments.join(",\n    "));
    }

    let mut statement = Statement::new(text).param("key", key_value(&node.key));
    for (name, value) in &node.properties {
        statement = statement.param(format!("p_{name}"), value.clone());
    }
    statement
}

/// Match both endpoints, then merge the edge. Returns `linked`: 0 when an
/// endpoint is missing, 1 otherwise.
pub fn edge_merge(edge: &EdgeMerge) -> Statement {
    if edge.exclusive {
        return exclusive_edge_merge(edge);
    }

    let text = format!(
        "MATCH (a:{} {{{}: $from}})\n\
         MATCH (b:{} {{{}: $to}})\n\
         MERGE (a)-[r:{}]->(b)\n\
         RETURN count(r) AS linked",
        edge.from.label.as_str(),
        edge.from.property,
        edge.to.label.as_str(),
        edge.to.property,
        edge.rel.as_str(),
    );

    Statement::new(text)
        .param("from", key_value(&edge.from.value))
        .param("to", key_value(&edge.to.value))
}

/// Drop the other edges of this type first, then merge when the target exists.
fn exclusive_edge_merge(edge: &EdgeMerge) -> Statement {
    let to_label = edge.to.label.as_str();
    let rel = edge.rel.as_str();
    let text = format!(
        "MATCH (a:{} {{{}: $from}})\n\
         OPTIONAL MATCH (b:{} {{{}: $to}})\n\
         OPTIONAL MATCH (a)-[old:{}]->(x:{})\n\
         WHERE b IS NULL OR x <> b\n\
         WITH a, b, collect(old) AS stale\n\
         FOREACH (o IN stale | DELETE o)\n\
         WITH a, b WHERE b IS NOT NULL\n\
         MERGE (a)-[r:{}]->(b)\n\
         RETURN count(r) AS linked",
        edge.from.label.as_str(),
        edge.from.property,
        to_label,
        edge.to.property,
        rel,
        to_label,
        rel,
    );

    Statement::new(text)
        .param("from", key_value(&edge.from.value))
        .param("to", key_value(&edge.to.value))
}

/// Delete `rel` edges from one node to nodes with the `target` label.
pub fn edge_detach(from: &NodeRef, rel: RelType, target: NodeLabel) -> Statement {
    let text = format!(
        "MATCH (a:{} {{{}: $from}})-[old:{}]->(:{})\n\
         DELETE old\n\
         RETURN count(old) AS removed",
        from.label.as_str(),
        from.property,
        rel.as_str(),
        target.as_str(),
    );
    Statement::new(text).param("from", key_value(&from.value))
}

/// `CREATE CONSTRAINT|INDEX ... IF NOT EXISTS`
pub fn schema(declaration: &SchemaDeclaration) -> Statement {
    let text = match declaration {
        SchemaDeclaration::Unique { label } => format!(
            "CREATE CONSTRAINT {} IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
            declaration.name(),
            label.as_str(),
            label.key_property()
        ),
        SchemaDeclaration::Index { label, property } => format!(
            "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
            declaration.name(),
            label.as_str(),
            property
        ),
    };
    Statement::new(text)
}

pub const COUNT_NODES: &str = "MATCH (n) RETURN count(n) AS count";
pub const COUNT_RELATIONSHIPS: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

fn key_value(key: &NodeKey) -> PropValue {
    PropValue::from(key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_node_merge_sets_every_property() {
        let created = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let node = NodeMerge::new(NodeLabel::GitHubIssue, 42_i64)
            .set("title", "Crash on save")
            .set("body", None::<String>)
            .set("created_at", created);

        let stmt = node_merge(&node);

        assert!(stmt.text.starts_with("MERGE (n:GitHubIssue {id: $key})"));
        assert!(stmt.text.contains("n.title = $p_title"));
        assert!(stmt.text.contains("n.body = $p_body"));
        assert!(stmt.text.contains("n.created_at = datetime($p_created_at)"));
        assert_eq!(stmt.get("key"), Some(&PropValue::Int(42)));
        assert_eq!(stmt.get("p_body"), Some(&PropValue::Null));
        assert!(!stmt.text.contains("Crash on save"));
    }

    #[test]
    fn test_node_merge_without_properties() {
        let stmt = node_merge(&NodeMerge::new(NodeLabel::Context, "Billing"));
        assert_eq!(stmt.text, "MERGE (n:Context {name: $key})");
    }

    #[test]
    fn test_edge_merge_is_parameterized() {
        let edge = EdgeMerge::new(
            NodeRef::by_key(NodeLabel::GitHubIssue, 42_i64),
            RelType::BelongsTo,
            NodeRef::by(NodeLabel::GitHubRepository, "full_name", "acme/widgets"),
        );

        let stmt = edge_merge(&edge);

        assert!(stmt.text.contains("MATCH (a:GitHubIssue {id: $from})"));
        assert!(stmt.text.contains("MATCH (b:GitHubRepository {full_name: $to})"));
        assert!(stmt.text.contains("MERGE (a)-[r:BELONGS_TO]->(b)"));
        assert!(stmt.text.ends_with("RETURN count(r) AS linked"));
        assert_eq!(stmt.get("to"), Some(&PropValue::from("acme/widgets")));
        assert!(!stmt.text.contains("acme"));
    }

    #[test]
    fn test_exclusive_edge_drops_other_targets() {
        let edge = EdgeMerge::exclusive(
            NodeRef::by_key(NodeLabel::GitHubIssue, 42_i64),
            RelType::Targets,
            NodeRef::by_key(NodeLabel::GitHubMilestone, 301_i64),
        );

        let stmt = edge_merge(&edge);

        assert!(stmt.text.contains("OPTIONAL MATCH (b:GitHubMilestone {id: $to})"));
        assert!(stmt.text.contains("OPTIONAL MATCH (a)-[old:TARGETS]->(x:GitHubMilestone)"));
        assert!(stmt.text.contains("FOREACH (o IN stale | DELETE o)"));
        assert!(stmt.text.contains("MERGE (a)-[r:TARGETS]->(b)"));
        assert_eq!(stmt.get("to"), Some(&PropValue::Int(301)));
    }

    #[test]
    fn test_edge_detach() {
        let stmt = edge_detach(&NodeRef::by_key(NodeLabel::Story, "PROJ-7"), RelType::BelongsTo, NodeLabel::Epic);

        assert!(stmt.text.starts_with("MATCH (a:Story {key: $from})-[old:BELONGS_TO]->(:Epic)"));
        assert!(stmt.text.ends_with("RETURN count(old) AS removed"));
        assert_eq!(stmt.get("from"), Some(&PropValue::from("PROJ-7")));
    }

    #[test]
    fn test_schema_statements() {
        let unique = schema(&SchemaDeclaration::Unique { label: NodeLabel::Epic });
        assert_eq!(
            unique.text,
            "CREATE CONSTRAINT epic_key_unique IF NOT EXISTS FOR (n:Epic) REQUIRE n.key IS UNIQUE"
        );

        let index = schema(&SchemaDeclaration::Index { label: NodeLabel::GitHubIssue, property: "state" });
        assert_eq!(
            index.text,
            "CREATE INDEX github_issue_state_idx IF NOT EXISTS FOR (n:GitHubIssue) ON (n.state)"
        );
    }
}
