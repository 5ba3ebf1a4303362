//! Read queries over synced GitHub data.
//!
//! Statement builders are pure and take every caller-supplied value as a
//! parameter; the `find_*`/`get_*` functions run them against Neo4j.

use anyhow::{Context, Result};
use neo4rs::Row;
use serde::Serialize;

use cflow_core::StateFilter;

use crate::client::to_query;
use crate::cypher::Statement;
use crate::store::PropValue;
use crate::GraphClient;

/// An issue as returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub updated_at: Option<String>,
    pub repository: Option<String>,
}

/// A project with its board columns.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectBoard {
    pub number: i64,
    pub name: String,
    pub state: String,
    pub columns: Vec<String>,
}

/// Milestone counters as reported upstream next to what the graph links.
#[derive(Debug, Clone, Serialize)]
pub struct MilestoneProgress {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub due_on: Option<String>,
    pub open_issues: i64,
    pub closed_issues: i64,
    /// Issues with a `TARGETS` edge to this milestone.
    pub linked_issues: i64,
    pub linked_open: i64,
}

impl MilestoneProgress {
    /// Percentage of closed issues per upstream counters.
    pub fn completion(&self) -> f64 {
        let total = self.open_issues + self.closed_issues;
        if total == 0 {
            0.0
        } else {
            self.closed_issues as f64 * 100.0 / total as f64
        }
    }

    /// Upstream total differs from the linked issue count.
    pub fn has_drift(&self) -> bool {
        self.open_issues + self.closed_issues != self.linked_issues
    }
}

const ISSUE_RETURN: &str = "RETURN i.number AS number, i.title AS title, i.state AS state,
       coalesce(i.labels, []) AS labels, coalesce(i.assignees, []) AS assignees,
       toString(i.updated_at) AS updated_at, r.full_name AS repository
ORDER BY i.updated_at DESC
LIMIT $limit";

fn statement(text: String) -> Statement {
    Statement { text, params: Vec::new() }
}

fn with(mut statement: Statement, name: &str, value: impl Into<PropValue>) -> Statement {
    statement.params.push((name.to_string(), value.into()));
    statement
}

fn repo_match(repo: Option<&str>) -> &'static str {
    if repo.is_some() {
        "MATCH (i)-[:BELONGS_TO]->(r:GitHubRepository {full_name: $repo})"
    } else {
        "OPTIONAL MATCH (i)-[:BELONGS_TO]->(r:GitHubRepository)"
    }
}

pub fn issues_by_repo_statement(repo: &str, state: StateFilter, limit: usize) -> Statement {
    let mut text = String::from("MATCH (i:GitHubIssue)-[:BELONGS_TO]->(r:GitHubRepository {full_name: $repo})\n");
    if state != StateFilter::All {
        text.push_str("WHERE i.state = $state\n");
    }
    text.push_str(ISSUE_RETURN);

    let mut stmt = with(statement(text), "repo", repo);
    if state != StateFilter::All {
        stmt = with(stmt, "state", state.as_str());
    }
    with(stmt, "limit", limit as i64)
}

pub fn open_issues_with_labels_statement(labels: &[String], repo: Option<&str>, limit: usize) -> Statement {
    let text = format!(
        "MATCH (i:GitHubIssue)\n{}\nWHERE i.state = 'open' AND any(label IN i.labels WHERE label IN $labels)\n{}",
        repo_match(repo),
        ISSUE_RETURN
    );

    let mut stmt = with(statement(text), "labels", labels.to_vec());
    if let Some(repo) = repo {
        stmt = with(stmt, "repo", repo);
    }
    with(stmt, "limit", limit as i64)
}

pub fn search_issues_statement(text_query: &str, repo: Option<&str>, limit: usize) -> Statement {
    let text = format!(
        "MATCH (i:GitHubIssue)\n{}\n\
         WHERE toLower(i.title) CONTAINS toLower($text)\n   \
         OR toLower(coalesce(i.body, '')) CONTAINS toLower($text)\n{}",
        repo_match(repo),
        ISSUE_RETURN
    );

    let mut stmt = with(statement(text), "text", text_query);
    if let Some(repo) = repo {
        stmt = with(stmt, "repo", repo);
    }
    with(stmt, "limit", limit as i64)
}

pub fn project_board_statement(repo: &str, number: Option<i64>) -> Statement {
    let mut text = String::from("MATCH (p:GitHubProject)-[:HOSTED_IN]->(:GitHubRepository {full_name: $repo})\n");
    if number.is_some() {
        text.push_str("WHERE p.number = $number\n");
    }
    text.push_str(
        "RETURN p.number AS number, p.name AS name, p.state AS state, coalesce(p.columns, []) AS columns\n\
         ORDER BY p.number",
    );

    let mut stmt = with(statement(text), "repo", repo);
    if let Some(number) = number {
        stmt = with(stmt, "number", number);
    }
    stmt
}

pub fn milestone_progress_statement(repo: &str, number: Option<i64>) -> Statement {
    let mut text = String::from("MATCH (m:GitHubMilestone)-[:BELONGS_TO]->(:GitHubRepository {full_name: $repo})\n");
    if number.is_some() {
        text.push_str("WHERE m.number = $number\n");
    }
    text.push_str(
        "OPTIONAL MATCH (m)<-[:TARGETS]-(i:GitHubIssue)\n\
         RETURN m.number AS number, m.title AS title, m.state AS state,\n       \
         toString(m.due_on) AS due_on,\n       \
         coalesce(m.open_issues, 0) AS open_issues, coalesce(m.closed_issues, 0) AS closed_issues,\n       \
         count(i) AS linked_issues,\n       \
         count(CASE WHEN i.state = 'open' THEN 1 END) AS linked_open\n\
         ORDER BY m.number",
    );

    let mut stmt = with(statement(text), "repo", repo);
    if let Some(number) = number {
        stmt = with(stmt, "number", number);
    }
    stmt
}

fn field<T: serde::de::DeserializeOwned>(row: &Row, name: &str) -> Result<T> {
    row.get(name)
        .map_err(|e| anyhow::anyhow!("Failed to get field '{}': {:?}", name, e))
}

fn issue_from_row(row: &Row) -> Result<IssueSummary> {
    Ok(IssueSummary {
        number: field(row, "number")?,
        title: field(row, "title")?,
        state: field(row, "state")?,
        labels: field(row, "labels")?,
        assignees: field(row, "assignees")?,
        updated_at: field(row, "updated_at")?,
        repository: field(row, "repository")?,
    })
}

async fn issues(client: &GraphClient, statement: Statement) -> Result<Vec<IssueSummary>> {
    client
        .query(to_query(statement))
        .await?
        .iter()
        .map(issue_from_row)
        .collect()
}

/// Issues of one repository, most recently updated first.
pub async fn find_issues_by_repo(
    client: &GraphClient,
    repo: &str,
    state: StateFilter,
    limit: usize,
) -> Result<Vec<IssueSummary>> {
    issues(client, issues_by_repo_statement(repo, state, limit))
        .await
        .with_context(|| format!("Failed to list issues of {}", repo))
}

/// Open issues carrying any of `labels`.
pub async fn find_open_issues_with_labels(
    client: &GraphClient,
    labels: &[String],
    repo: Option<&str>,
    limit: usize,
) -> Result<Vec<IssueSummary>> {
    issues(client, open_issues_with_labels_statement(labels, repo, limit)).await
}

/// Case-insensitive substring search over issue title and body.
pub async fn search_issues(
    client: &GraphClient,
    text: &str,
    repo: Option<&str>,
    limit: usize,
) -> Result<Vec<IssueSummary>> {
    issues(client, search_issues_statement(text, repo, limit)).await
}

pub async fn get_project_board(client: &GraphClient, repo: &str, number: Option<i64>) -> Result<Vec<ProjectBoard>> {
    client
        .query(to_query(project_board_statement(repo, number)))
        .await?
        .iter()
        .map(|row| {
            Ok(ProjectBoard {
                number: field(row, "number")?,
                name: field(row, "name")?,
                state: field(row, "state")?,
                columns: field(row, "columns")?,
            })
        })
        .collect()
}

pub async fn get_milestone_progress(
    client: &GraphClient,
    repo: &str,
    number: Option<i64>,
) -> Result<Vec<MilestoneProgress>> {
    client
        .query(to_query(milestone_progress_statement(repo, number)))
        .await?
        .iter()
        .map(|row| {
            Ok(MilestoneProgress {
                number: field(row, "number")?,
                title: field(row, "title")?,
                state: field(row, "state")?,
                due_on: field(row, "due_on")?,
                open_issues: field(row, "open_issues")?,
                closed_issues: field(row, "closed_issues")?,
                linked_issues: field(row, "linked_issues")?,
                linked_open: field(row, "linked_open")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issues_by_repo_filters_state() {
        let all = issues_by_repo_statement("acme/widgets", StateFilter::All, 10);
        assert!(!all.text.contains("$state"));
        assert!(all.get("state").is_none());

        let open = issues_by_repo_statement("acme/widgets", StateFilter::Open, 10);
        assert!(open.text.contains("WHERE i.state = $state"));
        assert_eq!(open.get("state"), Some(&PropValue::from("open")));
        assert_eq!(open.get("limit"), Some(&PropValue::Int(10)));
    }

    #[test]
    fn test_search_is_parameterized() {
        let stmt = search_issues_statement("crash') DETACH DELETE n //", None, 5);
        assert!(!stmt.text.contains("DETACH"));
        assert!(stmt.text.contains("OPTIONAL MATCH (i)-[:BELONGS_TO]->(r:GitHubRepository)"));
        assert!(stmt.get("repo").is_none());
    }

    #[test]
    fn test_labels_statement_with_repo() {
        let labels = vec!["bug".to_string(), "urgent".to_string()];
        let stmt = open_issues_with_labels_statement(&labels, Some("acme/widgets"), 20);
        assert!(stmt.text.contains("{full_name: $repo}"));
        assert_eq!(stmt.get("labels"), Some(&PropValue::List(labels)));
    }

    #[test]
    fn test_milestone_progress_counts_links() {
        let stmt = milestone_progress_statement("acme/widgets", Some(3));
        assert!(stmt.text.contains("OPTIONAL MATCH (m)<-[:TARGETS]-(i:GitHubIssue)"));
        assert_eq!(stmt.get("number"), Some(&PropValue::Int(3)));
    }

    #[test]
    fn test_milestone_drift() {
        let progress = MilestoneProgress {
            number: 1,
            title: "v1.0".into(),
            state: "open".into(),
            due_on: None,
            open_issues: 3,
            closed_issues: 1,
            linked_issues: 2,
            linked_open: 2,
        };
        assert!(progress.has_drift());
        assert_eq!(progress.completion(), 25.0);
    }
}
