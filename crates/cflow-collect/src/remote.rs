//! Remote tracker interfaces.
//!
//! One call fetches one page of raw records. Pages are 1-based. Errors are
//! kind-tagged [`CflowError`]s so the retry layer can classify them.

use async_trait::async_trait;

use cflow_core::model::github::{IssueResponse, MilestoneResponse, ProjectResponse, RepositoryResponse};
use cflow_core::model::jira::JiraIssueResponse;
use cflow_core::{CflowResult, StateFilter};

use crate::retry::Fetched;

/// One page of raw records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, has_next: false }
    }

    pub fn empty() -> Self {
        Self::last(Vec::new())
    }
}

/// GitHub REST API surface used for collection.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    async fn repository(&self, owner: &str, repo: &str) -> CflowResult<Fetched<RepositoryResponse>>;

    /// Issues and pull requests, as the REST endpoint returns both.
    async fn issues_page(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
    ) -> CflowResult<Fetched<Page<IssueResponse>>>;

    async fn projects_page(&self, owner: &str, repo: &str, page: u32) -> CflowResult<Fetched<Page<ProjectResponse>>>;

    async fn milestones_page(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
    ) -> CflowResult<Fetched<Page<MilestoneResponse>>>;
}

/// Jira search surface used for collection.
#[async_trait]
pub trait JiraApi: Send + Sync {
    /// Run a JQL search and return one page of matches.
    async fn search_page(&self, jql: &str, page: u32) -> CflowResult<Fetched<Page<JiraIssueResponse>>>;
}
