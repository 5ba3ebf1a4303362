//! Collection orchestration.
//!
//! A scope is one unit of collection: a GitHub repository, a Jira project or
//! an architecture manifest. Each scope collects its root entity first and
//! then its child kinds in dependency order. A root failure fails that scope
//! only; a child-kind failure is recorded on the kind and the scope still
//! finishes.

pub mod architecture;
pub mod github;
pub mod jira;

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use cflow_core::{CflowError, CflowResult, StateFilter};
use cflow_graph::store::EdgeMerge;
use cflow_graph::{reconcile_edges, GraphStore, SyncResult};

use crate::retry::RetryPolicy;

pub use architecture::collect_architecture;
pub use github::GitHubCollector;
pub use jira::JiraCollector;

// ============================================================================
// Scope state machine
// ============================================================================

/// Lifecycle of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePhase {
    Pending,
    CollectingRoot,
    CollectingChildren,
    Done,
    Failed,
}

impl ScopePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::CollectingRoot => "collecting_root",
            Self::CollectingChildren => "collecting_children",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// Phases move forward one step at a time; `Failed` is reachable from
    /// any non-terminal phase.
    pub fn can_advance_to(&self, next: ScopePhase) -> bool {
        match (self, next) {
            (from, Self::Failed) => !from.is_terminal(),
            (Self::Pending, Self::CollectingRoot)
            | (Self::CollectingRoot, Self::CollectingChildren)
            | (Self::CollectingChildren, Self::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScopePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity kinds reported per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Repository,
    Milestones,
    Projects,
    Issues,
    Epics,
    Stories,
    Contexts,
    Containers,
    Components,
    Code,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repository => "repository",
            Self::Milestones => "milestones",
            Self::Projects => "projects",
            Self::Issues => "issues",
            Self::Epics => "epics",
            Self::Stories => "stories",
            Self::Contexts => "contexts",
            Self::Containers => "containers",
            Self::Components => "components",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of collecting one entity kind within a scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    /// Entities upserted into the graph.
    pub collected: usize,
    /// Entities dropped for validation or parse errors.
    pub skipped: usize,
    /// Set when the kind stopped early.
    pub error: Option<String>,
}

impl KindReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            collected: 0,
            skipped: 0,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Record a failure. Several failures on one kind are joined.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.error = Some(match self.error.take() {
            Some(previous) => format!("{}; {}", previous, message),
            None => message,
        });
    }
}

/// How a scope ended, from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeOutcome {
    Succeeded,
    /// Root collected but at least one child kind failed.
    Partial,
    Failed,
}

impl fmt::Display for ScopeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Succeeded => "succeeded",
            Self::Partial => "partial",
            Self::Failed => "failed",
        })
    }
}

/// Result of collecting one scope.
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: String,
    pub phase: ScopePhase,
    pub root_error: Option<String>,
    pub kinds: Vec<KindReport>,
    pub nodes_merged: usize,
    pub relationships_linked: usize,
    /// Edges still waiting for an endpoint after reconciliation.
    pub pending_edges: Vec<EdgeMerge>,
}

impl ScopeReport {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            phase: ScopePhase::Pending,
            root_error: None,
            kinds: Vec::new(),
            nodes_merged: 0,
            relationships_linked: 0,
            pending_edges: Vec::new(),
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: ScopePhase) -> CflowResult<()> {
        if !self.phase.can_advance_to(next) {
            return Err(CflowError::validation(format!(
                "scope '{}' cannot move from {} to {}",
                self.scope, self.phase, next
            )));
        }
        self.phase = next;
        Ok(())
    }

    /// Mark the scope failed with its root error. No-op once terminal.
    pub fn fail(&mut self, error: &CflowError) {
        if self.advance(ScopePhase::Failed).is_ok() {
            self.root_error = Some(error.to_string());
        }
    }

    pub fn absorb(&mut self, sync: SyncResult) {
        self.nodes_merged += sync.nodes_merged;
        self.relationships_linked += sync.relationships_linked;
        self.pending_edges.extend(sync.pending_edges);
    }

    pub fn record(&mut self, kind: KindReport, sync: SyncResult) {
        self.kinds.push(kind);
        self.absorb(sync);
    }

    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|k| k.kind == kind)
    }

    pub fn outcome(&self) -> ScopeOutcome {
        match self.phase {
            ScopePhase::Done if self.kinds.iter().all(KindReport::is_ok) => ScopeOutcome::Succeeded,
            ScopePhase::Done => ScopeOutcome::Partial,
            _ => ScopeOutcome::Failed,
        }
    }

    /// Retry every edge deferred during this scope and keep what is left.
    pub(crate) async fn reconcile(&mut self, store: &dyn GraphStore) {
        let pending = std::mem::take(&mut self.pending_edges);
        if pending.is_empty() {
            return;
        }
        match reconcile_edges(store, pending.clone()).await {
            Ok(result) => self.absorb(result),
            Err(e) => {
                warn!(scope = %self.scope, error = %e, "Edge reconciliation failed");
                self.pending_edges = pending;
            }
        }
    }

    pub(crate) fn log_finished(&self) {
        info!(
            scope = %self.scope,
            outcome = %self.outcome(),
            nodes = self.nodes_merged,
            rels = self.relationships_linked,
            pending = self.pending_edges.len(),
            "Scope collected"
        );
    }
}

/// Result of a multi-scope run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub run_id: Uuid,
    pub scopes: Vec<ScopeReport>,
}

impl CollectionSummary {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scopes: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ScopeReport) {
        self.scopes.push(report);
    }

    pub fn extend(&mut self, other: CollectionSummary) {
        self.scopes.extend(other.scopes);
    }

    fn count(&self, outcome: ScopeOutcome) -> usize {
        self.scopes.iter().filter(|s| s.outcome() == outcome).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(ScopeOutcome::Succeeded)
    }

    pub fn partial(&self) -> usize {
        self.count(ScopeOutcome::Partial)
    }

    pub fn failed(&self) -> usize {
        self.count(ScopeOutcome::Failed)
    }

    /// Scopes worth re-running: failed ones and partial ones.
    pub fn incomplete(&self) -> impl Iterator<Item = &ScopeReport> {
        self.scopes.iter().filter(|s| s.outcome() != ScopeOutcome::Succeeded)
    }
}

impl Default for CollectionSummary {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Which kinds to collect and how to filter them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionSettings {
    pub issues: bool,
    pub projects: bool,
    pub milestones: bool,
    pub issue_state: StateFilter,
    pub milestone_state: StateFilter,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for CollectionSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            issues: true,
            projects: true,
            milestones: true,
            issue_state: StateFilter::All,
            milestone_state: StateFilter::All,
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
        }
    }
}

impl CollectionSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

// ============================================================================
// Shared drain loop
// ============================================================================

/// Pull every item from `items` and sync it, one entity at a time.
///
/// Validation and parse failures skip the entity. Any other failure, from
/// the remote or from the graph, is recorded on `report`, ends the loop and
/// is returned.
pub(crate) async fn drain<T, F, Fut>(
    scope: &str,
    report: &mut KindReport,
    mut items: BoxStream<'_, CflowResult<T>>,
    total: &mut SyncResult,
    mut sync: F,
) -> Option<CflowError>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<SyncResult>>,
{
    while let Some(item) = items.next().await {
        match item {
            Ok(entity) => match sync(entity).await {
                Ok(result) => {
                    report.collected += 1;
                    total.merge(result);
                }
                Err(e) => {
                    warn!(scope, kind = %report.kind, error = %e, "Graph upsert failed");
                    let error = CflowError::graph(format!("{:#}", e));
                    report.record_error(error.to_string());
                    return Some(error);
                }
            },
            Err(e) if e.is_entity_error() => {
                warn!(scope, kind = %report.kind, error = %e, "Skipping invalid entity");
                report.skipped += 1;
            }
            Err(e) => {
                warn!(scope, kind = %report.kind, error = %e, "Collection failed");
                report.record_error(e.to_string());
                return Some(e);
            }
        }
    }
    None
}
