//! GitHub repository collection.

use std::sync::Arc;

use tracing::info;

use cflow_core::{CflowError, CflowResult, Issue, Milestone, Project, Repository};
use cflow_graph::sync::{sync_issue, sync_milestone, sync_project, sync_repository};
use cflow_graph::{ensure_schema, GraphStore, SchemaReport, SyncResult};

use super::{drain, CollectionSettings, CollectionSummary, EntityKind, KindReport, ScopePhase, ScopeReport};
use crate::source::{parse_repo_scope, GitHubSource};

/// Collects repositories, one `owner/repo` scope at a time.
pub struct GitHubCollector {
    source: GitHubSource,
    store: Arc<dyn GraphStore>,
    settings: CollectionSettings,
}

impl GitHubCollector {
    pub fn new(source: GitHubSource, store: Arc<dyn GraphStore>, settings: CollectionSettings) -> Self {
        Self { source, store, settings }
    }

    pub fn settings(&self) -> &CollectionSettings {
        &self.settings
    }

    /// Apply the graph schema. Safe to call before every run.
    pub async fn ensure_schema(&self) -> SchemaReport {
        ensure_schema(self.store.as_ref()).await
    }

    /// Collect every scope in order. A failing scope never stops the rest.
    pub async fn collect_all(&self, scopes: &[String]) -> CollectionSummary {
        let mut summary = CollectionSummary::new();
        info!(run_id = %summary.run_id, scopes = scopes.len(), "Starting GitHub collection");
        for scope in scopes {
            summary.push(self.collect_repository_data(scope).await);
        }
        summary
    }

    /// Collect one repository and its milestones, projects and issues.
    pub async fn collect_repository_data(&self, scope: &str) -> ScopeReport {
        let mut report = ScopeReport::new(scope);
        info!(scope, "Collecting repository");

        if let Err(e) = self.run_scope(scope, &mut report).await {
            tracing::warn!(scope, error = %e, "Repository collection failed");
            report.fail(&e);
        }
        report.log_finished();
        report
    }

    async fn run_scope(&self, scope: &str, report: &mut ScopeReport) -> CflowResult<()> {
        let (owner, name) = parse_repo_scope(scope)?;

        report.advance(ScopePhase::CollectingRoot)?;
        let (repository, sync) = self.collect_repository(owner, name).await?;
        let mut root = KindReport::new(EntityKind::Repository);
        root.collected = 1;
        report.record(root, sync);

        // Milestones before issues so TARGETS edges find their endpoint.
        report.advance(ScopePhase::CollectingChildren)?;
        if self.settings.milestones {
            let (kind, sync) = self.collect_milestones(&repository).await;
            report.record(kind, sync);
        }
        if self.settings.projects {
            let (kind, sync) = self.collect_projects(&repository).await;
            report.record(kind, sync);
        }
        if self.settings.issues {
            let (kind, sync) = self.collect_issues(&repository).await;
            report.record(kind, sync);
        }

        report.reconcile(self.store.as_ref()).await;
        report.advance(ScopePhase::Done)
    }

    /// Fetch the repository and upsert its node.
    pub async fn collect_repository(&self, owner: &str, name: &str) -> CflowResult<(Repository, SyncResult)> {
        let repository = self.source.repository(owner, name).await?;
        let sync = sync_repository(self.store.as_ref(), &repository)
            .await
            .map_err(|e| CflowError::graph(format!("{:#}", e)))?;
        Ok((repository, sync))
    }

    pub async fn collect_issues(&self, repository: &Repository) -> (KindReport, SyncResult) {
        let mut report = KindReport::new(EntityKind::Issues);
        let mut total = SyncResult::default();
        let Some((owner, name)) = self.split(repository, &mut report) else {
            return (report, total);
        };

        let store = self.store.as_ref();
        let full_name = repository.full_name.as_str();
        let issues = self.source.issues(owner, name, self.settings.issue_state);
        drain(full_name, &mut report, issues, &mut total, move |issue: Issue| async move {
            sync_issue(store, full_name, &issue).await
        })
        .await;

        info!(repo = full_name, collected = report.collected, skipped = report.skipped, "Issues synced");
        (report, total)
    }

    pub async fn collect_projects(&self, repository: &Repository) -> (KindReport, SyncResult) {
        let mut report = KindReport::new(EntityKind::Projects);
        let mut total = SyncResult::default();
        let Some((owner, name)) = self.split(repository, &mut report) else {
            return (report, total);
        };

        let store = self.store.as_ref();
        let full_name = repository.full_name.as_str();
        let projects = self.source.projects(owner, name);
        drain(full_name, &mut report, projects, &mut total, move |project: Project| async move {
            sync_project(store, full_name, &project).await
        })
        .await;

        info!(repo = full_name, collected = report.collected, skipped = report.skipped, "Projects synced");
        (report, total)
    }

    pub async fn collect_milestones(&self, repository: &Repository) -> (KindReport, SyncResult) {
        let mut report = KindReport::new(EntityKind::Milestones);
        let mut total = SyncResult::default();
        let Some((owner, name)) = self.split(repository, &mut report) else {
            return (report, total);
        };

        let store = self.store.as_ref();
        let full_name = repository.full_name.as_str();
        let milestones = self.source.milestones(owner, name, self.settings.milestone_state);
        drain(full_name, &mut report, milestones, &mut total, move |milestone: Milestone| async move {
            sync_milestone(store, full_name, &milestone).await
        })
        .await;

        info!(repo = full_name, collected = report.collected, skipped = report.skipped, "Milestones synced");
        (report, total)
    }

    fn split<'r>(&self, repository: &'r Repository, report: &mut KindReport) -> Option<(&'r str, &'r str)> {
        match parse_repo_scope(&repository.full_name) {
            Ok(parts) => Some(parts),
            Err(e) => {
                report.record_error(e.to_string());
                None
            }
        }
    }
}
