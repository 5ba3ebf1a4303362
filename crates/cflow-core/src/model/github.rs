//! GitHub entity models.

use serde::{Deserialize, Serialize};

use super::ItemState;
use crate::error::{CflowError, CflowResult};
use crate::time::{parse_optional_timestamp, parse_timestamp, Timestamp};

/// A GitHub repository. Root of every GitHub scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub html_url: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A GitHub issue (pull requests excluded).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub body: Option<String>,
    pub state: ItemState,
    pub labels: Vec<String>,
    /// GitHub logins.
    pub assignees: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    /// Id of the milestone this issue targets, if any.
    pub milestone_id: Option<i64>,
}

/// A classic GitHub project board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub body: Option<String>,
    pub state: ItemState,
    pub number: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Column names.
    pub columns: Vec<String>,
}

/// A GitHub milestone.
///
/// `open_issues` / `closed_issues` are the counters GitHub reports. They are
/// stored as-is and never reconciled against linked issue nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub id: i64,
    pub number: i64,
    pub title: String,
    pub description: Option<String>,
    pub state: ItemState,
    pub due_on: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub open_issues: u32,
    pub closed_issues: u32,
}

// ============================================================================
// Raw API shapes
// ============================================================================

/// Label sub-object: `{"name": "bug", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRef {
    #[serde(default)]
    pub name: String,
}

/// User sub-object: `{"login": "alice", ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(default)]
    pub login: String,
}

/// Milestone sub-object embedded in an issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRef {
    pub id: i64,
}

/// Column sub-object of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(default)]
    pub name: String,
}

/// Repository as returned by `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryResponse {
    pub id: i64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub private: bool,
    pub html_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl RepositoryResponse {
    /// Convert to the domain model.
    pub fn into_repository(self) -> CflowResult<Repository> {
        Ok(Repository {
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            id: self.id,
            name: self.name,
            full_name: self.full_name,
            description: self.description,
            private: self.private,
            html_url: self.html_url,
        })
    }
}

/// Issue as returned by `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    pub id: i64,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    #[serde(default)]
    pub labels: Vec<LabelRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub milestone: Option<MilestoneRef>,
    /// Present only when the "issue" is really a pull request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl IssueResponse {
    /// GitHub's issues endpoint also lists pull requests.
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    /// Convert to the domain model.
    pub fn into_issue(self) -> CflowResult<Issue> {
        if self.is_pull_request() {
            return Err(CflowError::validation(format!(
                "#{} is a pull request, not an issue",
                self.number
            )));
        }

        Ok(Issue {
            state: self.state.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            closed_at: parse_optional_timestamp(self.closed_at.as_deref())?,
            labels: self.labels.into_iter().map(|l| l.name).collect(),
            assignees: self.assignees.into_iter().map(|a| a.login).collect(),
            milestone_id: self.milestone.map(|m| m.id),
            id: self.id,
            number: self.number,
            title: self.title,
            body: self.body,
        })
    }
}

/// Project as returned by `GET /repos/{owner}/{repo}/projects`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: String,
    pub number: i64,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub columns: Vec<ColumnRef>,
}

impl ProjectResponse {
    /// Convert to the domain model.
    pub fn into_project(self) -> CflowResult<Project> {
        Ok(Project {
            state: self.state.parse()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            columns: self.columns.into_iter().map(|c| c.name).collect(),
            id: self.id,
            name: self.name,
            body: self.body,
            number: self.number,
        })
    }
}

/// Milestone as returned by `GET /repos/{owner}/{repo}/milestones`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneResponse {
    pub id: i64,
    pub number: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: String,
    #[serde(default)]
    pub due_on: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub open_issues: i64,
    pub closed_issues: i64,
}

impl MilestoneResponse {
    /// Convert to the domain model.
    pub fn into_milestone(self) -> CflowResult<Milestone> {
        Ok(Milestone {
            state: self.state.parse()?,
            due_on: parse_optional_timestamp(self.due_on.as_deref())?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            open_issues: non_negative("open_issues", self.open_issues)?,
            closed_issues: non_negative("closed_issues", self.closed_issues)?,
            id: self.id,
            number: self.number,
            title: self.title,
            description: self.description,
        })
    }
}

fn non_negative(field: &str, value: i64) -> CflowResult<u32> {
    u32::try_from(value)
        .map_err(|_| CflowError::validation(format!("{} must be >= 0, got {}", field, value)))
}
