//! Jira project collection: epics, then the stories under each epic.

use std::sync::Arc;

use tracing::{info, warn};

use cflow_core::{CflowResult, Epic, Story};
use cflow_graph::sync::{sync_epic, sync_story};
use cflow_graph::{ensure_schema, GraphStore, SchemaReport, SyncResult};

use super::{drain, CollectionSummary, EntityKind, KindReport, ScopePhase, ScopeReport};
use crate::source::JiraSource;

pub struct JiraCollector {
    source: JiraSource,
    store: Arc<dyn GraphStore>,
}

impl JiraCollector {
    pub fn new(source: JiraSource, store: Arc<dyn GraphStore>) -> Self {
        Self { source, store }
    }

    pub async fn ensure_schema(&self) -> SchemaReport {
        ensure_schema(self.store.as_ref()).await
    }

    pub async fn collect_all(&self, project_keys: &[String]) -> CollectionSummary {
        let mut summary = CollectionSummary::new();
        info!(run_id = %summary.run_id, projects = project_keys.len(), "Starting Jira collection");
        for key in project_keys {
            summary.push(self.collect_project(key).await);
        }
        summary
    }

    /// Collect one project. Epics are the root: if they cannot be fetched
    /// the scope fails. A story failure under one epic does not stop the
    /// next epic.
    pub async fn collect_project(&self, project_key: &str) -> ScopeReport {
        let mut report = ScopeReport::new(project_key);
        info!(project = project_key, "Collecting Jira project");

        if let Err(e) = self.run_scope(project_key, &mut report).await {
            warn!(project = project_key, error = %e, "Jira collection failed");
            report.fail(&e);
        }
        report.log_finished();
        report
    }

    async fn run_scope(&self, project_key: &str, report: &mut ScopeReport) -> CflowResult<()> {
        report.advance(ScopePhase::CollectingRoot)?;
        let (epic_keys, epics, sync) = self.collect_epics(project_key).await?;
        report.record(epics, sync);

        report.advance(ScopePhase::CollectingChildren)?;
        let (stories, sync) = self.collect_stories(project_key, &epic_keys).await;
        report.record(stories, sync);

        report.reconcile(self.store.as_ref()).await;
        report.advance(ScopePhase::Done)
    }

    async fn collect_epics(&self, project_key: &str) -> CflowResult<(Vec<String>, KindReport, SyncResult)> {
        let mut report = KindReport::new(EntityKind::Epics);
        let mut total = SyncResult::default();
        let mut keys = Vec::new();

        let store = self.store.as_ref();
        let epics = self.source.epics(project_key)?;
        let stopped = drain(project_key, &mut report, epics, &mut total, |epic: Epic| {
            keys.push(epic.key.clone());
            async move { sync_epic(store, &epic).await }
        })
        .await;

        if let Some(error) = stopped {
            return Err(error);
        }
        info!(project = project_key, collected = report.collected, skipped = report.skipped, "Epics synced");
        Ok((keys, report, total))
    }

    async fn collect_stories(&self, project_key: &str, epic_keys: &[String]) -> (KindReport, SyncResult) {
        let mut report = KindReport::new(EntityKind::Stories);
        let mut total = SyncResult::default();
        let store = self.store.as_ref();

        for epic_key in epic_keys {
            let stories = match self.source.stories_for_epic(epic_key) {
                Ok(stories) => stories,
                Err(e) => {
                    report.record_error(format!("{}: {}", epic_key, e));
                    continue;
                }
            };

            let mut epic_report = KindReport::new(EntityKind::Stories);
            drain(epic_key, &mut epic_report, stories, &mut total, move |story: Story| async move {
                sync_story(store, &story).await
            })
            .await;

            report.collected += epic_report.collected;
            report.skipped += epic_report.skipped;
            if let Some(error) = epic_report.error {
                report.record_error(format!("{}: {}", epic_key, error));
            }
        }

        info!(project = project_key, collected = report.collected, skipped = report.skipped, "Stories synced");
        (report, total)
    }
}
