//! Lazy, paginated entity sequences.
//!
//! Each sequence pulls pages on demand, every page under the retry policy,
//! and yields normalized records. A record that fails normalization is
//! yielded as its entity error and the sequence continues; a page that
//! fails is yielded as its error and ends the sequence. Calling the method
//! again starts over from page 1.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, warn};

use cflow_core::model::github::{IssueResponse, MilestoneResponse, ProjectResponse};
use cflow_core::model::jira::JiraIssueResponse;
use cflow_core::{CflowError, CflowResult, Epic, Issue, Milestone, Project, Repository, StateFilter, Story};

use crate::remote::{GitHubApi, JiraApi, Page};
use crate::retry::{Fetched, RetryClient};

struct PageCursor<F> {
    fetch: F,
    next_page: Option<u32>,
}

/// Build a stream over pages produced by `fetch(page)`.
///
/// `convert` returns `None` for raw records that are not part of the
/// sequence (e.g. pull requests on the issues endpoint).
pub fn paginate<'a, R, T, F, Fut>(
    retry: &'a RetryClient,
    operation: &'static str,
    fetch: F,
    convert: fn(R) -> Option<CflowResult<T>>,
) -> BoxStream<'a, CflowResult<T>>
where
    R: Send + 'a,
    T: Send + 'a,
    F: Fn(u32) -> Fut + Send + Sync + 'a,
    Fut: Future<Output = CflowResult<Fetched<Page<R>>>> + Send + 'a,
{
    let cursor = PageCursor {
        fetch,
        next_page: Some(1),
    };

    stream::unfold(cursor, move |mut cursor| async move {
        let page = cursor.next_page?;
        let batch: Vec<CflowResult<T>> = match retry.execute(operation, || (cursor.fetch)(page)).await {
            Ok(fetched) => {
                debug!(operation, page, items = fetched.items.len(), "Fetched page");
                cursor.next_page = (fetched.has_next && !fetched.items.is_empty()).then_some(page + 1);
                fetched.items.into_iter().filter_map(convert).collect()
            }
            Err(e) => {
                cursor.next_page = None;
                vec![Err(e)]
            }
        };
        Some((stream::iter(batch), cursor))
    })
    .flatten()
    .boxed()
}

/// Split `owner/repo`.
pub fn parse_repo_scope(scope: &str) -> CflowResult<(&str, &str)> {
    match scope.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => Ok((owner, repo)),
        _ => Err(CflowError::validation(format!(
            "repository scope must look like 'owner/repo', got '{}'",
            scope
        ))),
    }
}

/// GitHub entities for one repository at a time.
pub struct GitHubSource {
    api: Arc<dyn GitHubApi>,
    retry: RetryClient,
}

impl GitHubSource {
    pub fn new(api: Arc<dyn GitHubApi>, retry: RetryClient) -> Self {
        Self { api, retry }
    }

    pub fn retry(&self) -> &RetryClient {
        &self.retry
    }

    pub async fn repository(&self, owner: &str, repo: &str) -> CflowResult<Repository> {
        let raw = self
            .retry
            .execute("repository", || self.api.repository(owner, repo))
            .await?;
        raw.into_repository()
    }

    /// Issues, excluding pull requests.
    pub fn issues(&self, owner: &str, repo: &str, state: StateFilter) -> BoxStream<'_, CflowResult<Issue>> {
        let api = Arc::clone(&self.api);
        let (owner, repo) = (owner.to_string(), repo.to_string());
        paginate(
            &self.retry,
            "issues",
            move |page| {
                let api = Arc::clone(&api);
                let (owner, repo) = (owner.clone(), repo.clone());
                async move { api.issues_page(&owner, &repo, state, page).await }
            },
            |raw: IssueResponse| (!raw.is_pull_request()).then(|| raw.into_issue()),
        )
    }

    /// Projects. A repository without projects (404) yields nothing.
    pub fn projects(&self, owner: &str, repo: &str) -> BoxStream<'_, CflowResult<Project>> {
        let api = Arc::clone(&self.api);
        let (owner, repo) = (owner.to_string(), repo.to_string());
        paginate(
            &self.retry,
            "projects",
            move |page| {
                let api = Arc::clone(&api);
                let (owner, repo) = (owner.clone(), repo.clone());
                async move {
                    match api.projects_page(&owner, &repo, page).await {
                        Err(e) if e.is_not_found() => {
                            warn!(repo = %format!("{}/{}", owner, repo), "Projects unavailable for repository");
                            Ok(Fetched::new(Page::empty()))
                        }
                        other => other,
                    }
                }
            },
            |raw: ProjectResponse| Some(raw.into_project()),
        )
    }

    pub fn milestones(&self, owner: &str, repo: &str, state: StateFilter) -> BoxStream<'_, CflowResult<Milestone>> {
        let api = Arc::clone(&self.api);
        let (owner, repo) = (owner.to_string(), repo.to_string());
        paginate(
            &self.retry,
            "milestones",
            move |page| {
                let api = Arc::clone(&api);
                let (owner, repo) = (owner.clone(), repo.clone());
                async move { api.milestones_page(&owner, &repo, state, page).await }
            },
            |raw: MilestoneResponse| Some(raw.into_milestone()),
        )
    }
}

/// Accept `ABC` style project keys.
pub fn validate_project_key(key: &str) -> CflowResult<&str> {
    let mut chars = key.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(key)
    } else {
        Err(CflowError::validation(format!("invalid Jira project key '{}'", key)))
    }
}

/// Accept `ABC-123` style issue keys.
pub fn validate_issue_key(key: &str) -> CflowResult<&str> {
    let valid = key.rsplit_once('-').is_some_and(|(project, number)| {
        validate_project_key(project).is_ok() && !number.is_empty() && number.chars().all(|c| c.is_ascii_digit())
    });
    if valid {
        Ok(key)
    } else {
        Err(CflowError::validation(format!("invalid Jira issue key '{}'", key)))
    }
}

pub fn epics_jql(project_key: &str) -> CflowResult<String> {
    let key = validate_project_key(project_key)?;
    Ok(format!("project = \"{}\" AND issuetype = Epic ORDER BY created ASC", key))
}

/// Every child of the epic, whatever its issue type.
pub fn stories_jql(epic_key: &str) -> CflowResult<String> {
    let key = validate_issue_key(epic_key)?;
    Ok(format!("parent = \"{}\" ORDER BY created ASC", key))
}

/// Jira epics and stories.
pub struct JiraSource {
    api: Arc<dyn JiraApi>,
    retry: RetryClient,
}

impl JiraSource {
    pub fn new(api: Arc<dyn JiraApi>, retry: RetryClient) -> Self {
        Self { api, retry }
    }

    fn search<T: Send + 'static>(
        &self,
        operation: &'static str,
        jql: String,
        convert: fn(JiraIssueResponse) -> Option<CflowResult<T>>,
    ) -> BoxStream<'_, CflowResult<T>> {
        let api = Arc::clone(&self.api);
        paginate(
            &self.retry,
            operation,
            move |page| {
                let api = Arc::clone(&api);
                let jql = jql.clone();
                async move { api.search_page(&jql, page).await }
            },
            convert,
        )
    }

    pub fn epics(&self, project_key: &str) -> CflowResult<BoxStream<'_, CflowResult<Epic>>> {
        let jql = epics_jql(project_key)?;
        Ok(self.search("epics", jql, |raw: JiraIssueResponse| Some(raw.into_epic())))
    }

    pub fn stories_for_epic(&self, epic_key: &str) -> CflowResult<BoxStream<'_, CflowResult<Story>>> {
        let jql = stories_jql(epic_key)?;
        Ok(self.search("stories", jql, |raw: JiraIssueResponse| Some(raw.into_story())))
    }
}
