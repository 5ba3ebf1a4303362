//! GitHub entity synchronization.
//!
//! Creates nodes and relationships:
//! - (:GitHubIssue)-[:BELONGS_TO]->(:GitHubRepository)
//! - (:GitHubIssue)-[:TARGETS]->(:GitHubMilestone)
//! - (:GitHubProject)-[:HOSTED_IN]->(:GitHubRepository)
//! - (:GitHubMilestone)-[:BELONGS_TO]->(:GitHubRepository)
//!
//! Child entities reach their repository through its `full_name`.

use anyhow::Result;
use tracing::debug;

use cflow_core::{Issue, Milestone, Project, Repository};

use super::{link, relink, upsert_node, SyncResult};
use crate::store::{EdgeMerge, GraphStore, NodeLabel, NodeMerge, NodeRef, RelType};

fn repository_ref(full_name: &str) -> NodeRef {
    NodeRef::by(NodeLabel::GitHubRepository, "full_name", full_name)
}

pub fn repository_node(repo: &Repository) -> NodeMerge {
    NodeMerge::new(NodeLabel::GitHubRepository, repo.id)
        .set("name", repo.name.as_str())
        .set("full_name", repo.full_name.as_str())
        .set("description", repo.description.clone())
        .set("private", repo.private)
        .set("html_url", repo.html_url.as_str())
        .set("created_at", repo.created_at)
        .set("updated_at", repo.updated_at)
}

pub fn issue_node(issue: &Issue) -> NodeMerge {
    NodeMerge::new(NodeLabel::GitHubIssue, issue.id)
        .set("number", issue.number)
        .set("title", issue.title.as_str())
        .set("body", issue.body.clone())
        .set("state", issue.state.as_str())
        .set("labels", issue.labels.clone())
        .set("assignees", issue.assignees.clone())
        .set("created_at", issue.created_at)
        .set("updated_at", issue.updated_at)
        .set("closed_at", issue.closed_at)
}

pub fn project_node(project: &Project) -> NodeMerge {
    NodeMerge::new(NodeLabel::GitHubProject, project.id)
        .set("name", project.name.as_str())
        .set("body", project.body.clone())
        .set("state", project.state.as_str())
        .set("number", project.number)
        .set("columns", project.columns.clone())
        .set("created_at", project.created_at)
        .set("updated_at", project.updated_at)
}

/// Open/closed counters are stored as reported upstream.
pub fn milestone_node(milestone: &Milestone) -> NodeMerge {
    NodeMerge::new(NodeLabel::GitHubMilestone, milestone.id)
        .set("number", milestone.number)
        .set("title", milestone.title.as_str())
        .set("description", milestone.description.clone())
        .set("state", milestone.state.as_str())
        .set("due_on", milestone.due_on)
        .set("created_at", milestone.created_at)
        .set("updated_at", milestone.updated_at)
        .set("open_issues", milestone.open_issues)
        .set("closed_issues", milestone.closed_issues)
}

/// Upsert the repository root node.
pub async fn sync_repository(store: &dyn GraphStore, repo: &Repository) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    upsert_node(store, &repository_node(repo), &mut result).await?;
    debug!(repo = %repo.full_name, id = repo.id, "Synced repository");
    Ok(result)
}

/// Upsert an issue and link it to its repository and milestone.
pub async fn sync_issue(store: &dyn GraphStore, repo_full_name: &str, issue: &Issue) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let node = issue_node(issue);
    upsert_node(store, &node, &mut result).await?;

    link(
        store,
        EdgeMerge::new(node.node_ref(), RelType::BelongsTo, repository_ref(repo_full_name)),
        &mut result,
    )
    .await?;

    relink(
        store,
        node.node_ref(),
        RelType::Targets,
        NodeLabel::GitHubMilestone,
        issue.milestone_id.map(|id| NodeRef::by_key(NodeLabel::GitHubMilestone, id)),
        &mut result,
    )
    .await?;

    debug!(number = issue.number, state = %issue.state, "Synced issue");
    Ok(result)
}

/// Upsert a project and link it to the repository hosting it.
pub async fn sync_project(store: &dyn GraphStore, repo_full_name: &str, project: &Project) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let node = project_node(project);
    upsert_node(store, &node, &mut result).await?;

    link(
        store,
        EdgeMerge::new(node.node_ref(), RelType::HostedIn, repository_ref(repo_full_name)),
        &mut result,
    )
    .await?;

    debug!(number = project.number, name = %project.name, "Synced project");
    Ok(result)
}

/// Upsert a milestone and link it to its repository.
pub async fn sync_milestone(store: &dyn GraphStore, repo_full_name: &str, milestone: &Milestone) -> Result<SyncResult> {
    let mut result = SyncResult::default();
    let node = milestone_node(milestone);
    upsert_node(store, &node, &mut result).await?;

    link(
        store,
        EdgeMerge::new(node.node_ref(), RelType::BelongsTo, repository_ref(repo_full_name)),
        &mut result,
    )
    .await?;

    debug!(number = milestone.number, title = %milestone.title, "Synced milestone");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGraph;
    use crate::store::{NodeKey, PropValue};
    use cflow_core::ItemState;
    use chrono::{TimeZone, Utc};

    fn repo() -> Repository {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Repository {
            id: 1001,
            name: "widgets".into(),
            full_name: "acme/widgets".into(),
            description: None,
            private: false,
            html_url: "https://github.com/acme/widgets".into(),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn issue(title: &str, state: ItemState) -> Issue {
        let ts = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        Issue {
            id: 5007,
            number: 7,
            title: title.into(),
            body: None,
            state,
            labels: vec!["bug".into()],
            assignees: vec![],
            created_at: ts,
            updated_at: ts,
            closed_at: None,
            milestone_id: None,
        }
    }

    fn milestone() -> Milestone {
        let ts = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        Milestone {
            id: 300,
            number: 1,
            title: "v1.0".into(),
            description: None,
            state: ItemState::Open,
            due_on: None,
            created_at: ts,
            updated_at: ts,
            open_issues: 1,
            closed_issues: 0,
        }
    }

    #[tokio::test]
    async fn test_repository_with_issue() {
        let graph = MemoryGraph::new();
        sync_repository(&graph, &repo()).await.unwrap();
        let result = sync_issue(&graph, "acme/widgets", &issue("Crash on save", ItemState::Open))
            .await
            .unwrap();

        assert_eq!(result.relationships_linked, 1);
        let props = graph.node(NodeLabel::GitHubIssue, 5007_i64).await.unwrap();
        assert_eq!(props.get("number"), Some(&PropValue::Int(7)));
        assert_eq!(props.get("state"), Some(&PropValue::from("open")));

        let targets = graph.outgoing(NodeLabel::GitHubIssue, 5007_i64, RelType::BelongsTo).await;
        assert_eq!(targets, vec![(NodeLabel::GitHubRepository, NodeKey::Id(1001))]);
    }

    #[tokio::test]
    async fn test_resync_converges_without_duplicates() {
        let graph = MemoryGraph::new();
        sync_repository(&graph, &repo()).await.unwrap();
        sync_issue(&graph, "acme/widgets", &issue("Crash on save", ItemState::Open)).await.unwrap();
        let before = graph.counts().await.unwrap();

        sync_repository(&graph, &repo()).await.unwrap();
        sync_issue(&graph, "acme/widgets", &issue("Crash when saving", ItemState::Closed))
            .await
            .unwrap();

        assert_eq!(graph.counts().await.unwrap(), before);
        let props = graph.node(NodeLabel::GitHubIssue, 5007_i64).await.unwrap();
        assert_eq!(props.get("title"), Some(&PropValue::from("Crash when saving")));
        assert_eq!(props.get("state"), Some(&PropValue::from("closed")));
    }

    #[tokio::test]
    async fn test_issue_before_repository_is_pending() {
        let graph = MemoryGraph::new();
        let result = sync_issue(&graph, "acme/widgets", &issue("Crash on save", ItemState::Open))
            .await
            .unwrap();

        assert_eq!(result.relationships_linked, 0);
        assert_eq!(result.pending_edges.len(), 1);
        assert_eq!(graph.counts().await.unwrap().relationships, 0);

        sync_repository(&graph, &repo()).await.unwrap();
        sync_issue(&graph, "acme/widgets", &issue("Crash on save", ItemState::Open)).await.unwrap();
        assert_eq!(graph.count_rel(RelType::BelongsTo).await, 1);
    }

    #[tokio::test]
    async fn test_issue_targets_milestone() {
        let graph = MemoryGraph::new();
        sync_repository(&graph, &repo()).await.unwrap();
        sync_milestone(&graph, "acme/widgets", &milestone()).await.unwrap();

        let mut targeted = issue("Crash on save", ItemState::Open);
        targeted.milestone_id = Some(300);
        let result = sync_issue(&graph, "acme/widgets", &targeted).await.unwrap();

        assert_eq!(result.relationships_linked, 2);
        assert_eq!(graph.count_rel(RelType::Targets).await, 1);
        let props = graph.node(NodeLabel::GitHubMilestone, 300_i64).await.unwrap();
        assert_eq!(props.get("open_issues"), Some(&PropValue::Int(1)));
    }

    #[tokio::test]
    async fn test_issue_follows_milestone_changes() {
        let graph = MemoryGraph::new();
        sync_repository(&graph, &repo()).await.unwrap();
        let mut next = milestone();
        next.id = 301;
        next.number = 2;
        sync_milestone(&graph, "acme/widgets", &milestone()).await.unwrap();
        sync_milestone(&graph, "acme/widgets", &next).await.unwrap();

        let mut moved = issue("Crash on save", ItemState::Open);
        for milestone_id in [Some(300), Some(301)] {
            moved.milestone_id = milestone_id;
            sync_issue(&graph, "acme/widgets", &moved).await.unwrap();
        }
        let targets = graph.outgoing(NodeLabel::GitHubIssue, 5007_i64, RelType::Targets).await;
        assert_eq!(targets, vec![(NodeLabel::GitHubMilestone, NodeKey::Id(301))]);

        moved.milestone_id = None;
        sync_issue(&graph, "acme/widgets", &moved).await.unwrap();
        assert!(graph.outgoing(NodeLabel::GitHubIssue, 5007_i64, RelType::Targets).await.is_empty());
        // The repository edge is untouched.
        assert_eq!(graph.count_rel(RelType::BelongsTo).await, 3);
    }

    #[test]
    fn test_issue_node_clears_missing_optionals() {
        let node = issue_node(&issue("Crash on save", ItemState::Open));
        let closed_at = node.properties.iter().find(|(n, _)| *n == "closed_at").map(|(_, v)| v);
        assert_eq!(closed_at, Some(&PropValue::Null));
    }
}
