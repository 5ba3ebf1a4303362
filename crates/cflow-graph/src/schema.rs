//! Neo4j schema initialization (constraints and indexes).

use serde::Serialize;
use tracing::{info, warn};

use crate::store::{GraphStore, NodeLabel, SchemaDeclaration};

/// Secondary indexes on frequently filtered properties.
const INDEXES: &[(NodeLabel, &str)] = &[
    (NodeLabel::GitHubRepository, "full_name"),
    (NodeLabel::GitHubIssue, "number"),
    (NodeLabel::GitHubIssue, "state"),
    (NodeLabel::GitHubProject, "number"),
    (NodeLabel::GitHubProject, "state"),
    (NodeLabel::GitHubMilestone, "number"),
    (NodeLabel::GitHubMilestone, "state"),
    (NodeLabel::Epic, "status"),
    (NodeLabel::Story, "status"),
];

/// One uniqueness constraint per label on its identity key, then the indexes.
pub fn schema_declarations() -> Vec<SchemaDeclaration> {
    NodeLabel::ALL
        .iter()
        .map(|&label| SchemaDeclaration::Unique { label })
        .chain(
            INDEXES
                .iter()
                .map(|&(label, property)| SchemaDeclaration::Index { label, property }),
        )
        .collect()
}

/// Outcome of a schema run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaReport {
    pub applied: Vec<String>,
    /// Declaration name and the error that stopped it.
    pub failed: Vec<(String, String)>,
}

impl SchemaReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply every declaration independently.
///
/// Safe to run multiple times. A failing declaration is logged and the rest
/// still run.
pub async fn ensure_schema(store: &dyn GraphStore) -> SchemaReport {
    let declarations = schema_declarations();
    info!(count = declarations.len(), "Ensuring graph schema");

    let mut report = SchemaReport::default();
    for declaration in &declarations {
        let name = declaration.name();
        match store.declare(declaration).await {
            Ok(()) => report.applied.push(name),
            Err(e) => {
                warn!(declaration = %name, error = %format!("{:#}", e), "Schema declaration failed");
                report.failed.push((name, format!("{:#}", e)));
            }
        }
    }

    info!(
        applied = report.applied.len(),
        failed = report.failed.len(),
        "Graph schema ensured"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;

    #[test]
    fn test_one_constraint_per_label() {
        let declarations = schema_declarations();
        let unique = declarations
            .iter()
            .filter(|d| matches!(d, SchemaDeclaration::Unique { .. }))
            .count();
        assert_eq!(unique, NodeLabel::ALL.len());
        assert!(declarations.contains(&SchemaDeclaration::Index {
            label: NodeLabel::GitHubIssue,
            property: "state"
        }));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_remaining() {
        let graph = MemoryGraph::new().rejecting("github_issue_id_unique");

        let report = ensure_schema(&graph).await;

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "github_issue_id_unique");
        assert_eq!(report.applied.len(), schema_declarations().len() - 1);
        assert!(report.applied.contains(&"story_status_idx".to_string()));
    }

    #[tokio::test]
    async fn test_rerun_is_harmless() {
        let graph = MemoryGraph::new();
        ensure_schema(&graph).await;
        let second = ensure_schema(&graph).await;

        assert!(second.is_complete());
        assert_eq!(graph.declarations().await.len(), schema_declarations().len());
    }
}
