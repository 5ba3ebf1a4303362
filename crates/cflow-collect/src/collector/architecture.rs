//! Architecture manifest collection.

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use cflow_core::{ArchitectureElement, ArchitectureManifest, C4Level, CflowResult};
use cflow_graph::sync::sync_element;
use cflow_graph::{GraphStore, SyncResult};

use super::{drain, EntityKind, KindReport, ScopePhase, ScopeReport};

pub const ARCHITECTURE_SCOPE: &str = "architecture";

fn level_kind(level: C4Level) -> EntityKind {
    match level {
        C4Level::Context => EntityKind::Contexts,
        C4Level::Container => EntityKind::Containers,
        C4Level::Component => EntityKind::Components,
        C4Level::Code => EntityKind::Code,
    }
}

/// Sync every element of one level. The error is returned when the level
/// stopped early.
async fn collect_level(
    store: &dyn GraphStore,
    manifest: &ArchitectureManifest,
    level: C4Level,
) -> (KindReport, SyncResult, Option<cflow_core::CflowError>) {
    let mut report = KindReport::new(level_kind(level));
    let mut total = SyncResult::default();

    let elements = stream::iter(manifest.elements_at(level)).boxed();
    let stopped = drain(
        ARCHITECTURE_SCOPE,
        &mut report,
        elements,
        &mut total,
        move |element: ArchitectureElement| async move { sync_element(store, &element).await },
    )
    .await;

    (report, total, stopped)
}

/// Collect a manifest: contexts are the root, then containers, components
/// and code, each level after its parent level.
pub async fn collect_architecture(store: &dyn GraphStore, manifest: &ArchitectureManifest) -> ScopeReport {
    let mut report = ScopeReport::new(ARCHITECTURE_SCOPE);
    info!(elements = manifest.len(), "Collecting architecture");

    if let Err(e) = run_scope(store, manifest, &mut report).await {
        warn!(error = %e, "Architecture collection failed");
        report.fail(&e);
    }
    report.log_finished();
    report
}

async fn run_scope(store: &dyn GraphStore, manifest: &ArchitectureManifest, report: &mut ScopeReport) -> CflowResult<()> {
    report.advance(ScopePhase::CollectingRoot)?;
    let (contexts, sync, stopped) = collect_level(store, manifest, C4Level::Context).await;
    if let Some(error) = stopped {
        return Err(error);
    }
    report.record(contexts, sync);

    report.advance(ScopePhase::CollectingChildren)?;
    for level in [C4Level::Container, C4Level::Component, C4Level::Code] {
        let (kind, sync, _) = collect_level(store, manifest, level).await;
        report.record(kind, sync);
    }

    report.reconcile(store).await;
    report.advance(ScopePhase::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::ScopeOutcome;
    use cflow_graph::store::{NodeLabel, RelType};
    use cflow_graph::MemoryGraph;

    const MANIFEST: &str = r#"
[[context]]
name = "ContextFlow"

[[container]]
name = "Collector"
context = "ContextFlow"
technology = "Rust"

[[container]]
name = "Graph"
context = "ContextFlow"
technology = "Neo4j"

[[component]]
name = "RetryClient"
container = "Collector"

[[code]]
name = "execute"
component = "RetryClient"

[[component]]
name = ""
container = "Collector"
"#;

    #[tokio::test]
    async fn test_collect_manifest() {
        let graph = MemoryGraph::new();
        let manifest = ArchitectureManifest::from_toml(MANIFEST).unwrap();

        let report = collect_architecture(&graph, &manifest).await;

        assert_eq!(report.phase, ScopePhase::Done);
        assert_eq!(report.outcome(), ScopeOutcome::Succeeded);
        assert_eq!(report.kind(EntityKind::Containers).unwrap().collected, 2);
        let components = report.kind(EntityKind::Components).unwrap();
        assert_eq!((components.collected, components.skipped), (1, 1));
        assert_eq!(report.nodes_merged, 5);
        assert_eq!(report.relationships_linked, 4);
        assert!(report.pending_edges.is_empty());

        assert_eq!(graph.count_label(NodeLabel::Container).await, 2);
        assert_eq!(graph.count_rel(RelType::BelongsTo).await, 4);
    }

    #[tokio::test]
    async fn test_undeclared_parent_stays_pending() {
        let graph = MemoryGraph::new();
        let manifest = ArchitectureManifest::from_toml(
            r#"
[[context]]
name = "ContextFlow"

[[component]]
name = "Orphan"
container = "Missing"
"#,
        )
        .unwrap();

        let report = collect_architecture(&graph, &manifest).await;

        assert_eq!(report.outcome(), ScopeOutcome::Succeeded);
        assert_eq!(report.pending_edges.len(), 1);
        assert_eq!(graph.count_label(NodeLabel::Component).await, 1);
    }

    #[tokio::test]
    async fn test_context_graph_failure_fails_scope() {
        let graph = MemoryGraph::new().failing_label(NodeLabel::Context);
        let manifest = ArchitectureManifest::from_toml(MANIFEST).unwrap();

        let report = collect_architecture(&graph, &manifest).await;

        assert_eq!(report.phase, ScopePhase::Failed);
        assert!(report.root_error.is_some());
        assert_eq!(graph.count_label(NodeLabel::Container).await, 0);
    }
}
