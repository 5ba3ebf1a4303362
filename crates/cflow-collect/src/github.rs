//! GitHub REST v3 client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cflow_core::model::github::{ColumnRef, IssueResponse, MilestoneResponse, ProjectResponse, RepositoryResponse};
use cflow_core::{CflowError, CflowResult, StateFilter};

use crate::remote::{GitHubApi, Page};
use crate::retry::{Fetched, RateLimitInfo};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: u32 = 100;

/// GitHub connection and scope settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: String,
    /// Repositories to collect, as `owner/repo`.
    pub repositories: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: DEFAULT_API_URL.to_string(),
            repositories: Vec::new(),
            timeout_secs: 30,
        }
    }
}

/// GitHub REST client.
#[derive(Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> CflowResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static("contextflow"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| CflowError::Config("GitHub token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CflowError::Config(format!("Failed to build GitHub client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, path: &str, query: &[(&str, String)]) -> CflowResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GitHub request");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| CflowError::Network(format!("GitHub request to {} failed: {}", path, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_error(status, &headers, &body, path))
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str) -> CflowResult<Fetched<T>> {
        let response = self.send(path, &[]).await?;
        let rate_limit = rate_limit_from_headers(response.headers());
        let value = decode(response, path).await?;
        Ok(Fetched::new(value).with_rate_limit(rate_limit))
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        mut query: Vec<(&str, String)>,
        page: u32,
    ) -> CflowResult<Fetched<Page<T>>> {
        query.push(("per_page", PER_PAGE.to_string()));
        query.push(("page", page.to_string()));

        let response = self.send(path, &query).await?;
        let rate_limit = rate_limit_from_headers(response.headers());
        let has_next = has_next_page(response.headers());
        let items: Vec<T> = decode(response, path).await?;
        Ok(Fetched::new(Page { items, has_next }).with_rate_limit(rate_limit))
    }
}

impl GitHubClient {
    async fn columns(&self, project_id: i64) -> CflowResult<Fetched<Vec<ColumnRef>>> {
        let path = format!("/projects/{}/columns", project_id);
        let response = self.send(&path, &[("per_page", PER_PAGE.to_string())]).await?;
        let rate_limit = rate_limit_from_headers(response.headers());
        let value = decode(response, &path).await?;
        Ok(Fetched::new(value).with_rate_limit(rate_limit))
    }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> CflowResult<T> {
    response
        .json()
        .await
        .map_err(|e| CflowError::Decode(format!("{}: {}", path, e)))
}

/// Map a non-success response onto the error taxonomy.
///
/// 403 counts as rate limiting when the window is exhausted or the body says
/// so; other 403s are plain client errors.
pub fn classify_error(status: StatusCode, headers: &HeaderMap, body: &str, path: &str) -> CflowError {
    let message = format!("{}: {}", path, body.trim());
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");

    match status {
        StatusCode::TOO_MANY_REQUESTS => CflowError::RateLimited(message),
        StatusCode::FORBIDDEN if exhausted || body.to_lowercase().contains("rate limit") => {
            CflowError::RateLimited(message)
        }
        StatusCode::NOT_FOUND => CflowError::NotFound(path.to_string()),
        s if s.is_server_error() => CflowError::Server {
            status: s.as_u16(),
            message,
        },
        s => CflowError::Client {
            status: s.as_u16(),
            message,
        },
    }
}

/// `x-ratelimit-remaining` / `x-ratelimit-reset` (epoch seconds).
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let info = RateLimitInfo {
        remaining: header_str("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
        reset_at: header_str("x-ratelimit-reset")
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    };
    (!info.is_empty()).then_some(info)
}

/// True when the `Link` header advertises a `rel="next"` page.
pub fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(header::LINK)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|link| link.split(',').any(|part| part.contains("rel=\"next\"")))
}

#[async_trait]
impl GitHubApi for GitHubClient {
    async fn repository(&self, owner: &str, repo: &str) -> CflowResult<Fetched<RepositoryResponse>> {
        self.get_one(&format!("/repos/{}/{}", owner, repo)).await
    }

    async fn issues_page(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
    ) -> CflowResult<Fetched<Page<IssueResponse>>> {
        self.get_page(
            &format!("/repos/{}/{}/issues", owner, repo),
            vec![("state", state.as_str().to_string())],
            page,
        )
        .await
    }

    /// Classic projects, each with its column names.
    async fn projects_page(&self, owner: &str, repo: &str, page: u32) -> CflowResult<Fetched<Page<ProjectResponse>>> {
        let mut fetched: Fetched<Page<ProjectResponse>> = self
            .get_page(
                &format!("/repos/{}/{}/projects", owner, repo),
                vec![("state", "all".to_string())],
                page,
            )
            .await?;

        for project in &mut fetched.value.items {
            let columns = match self.columns(project.id).await {
                Ok(columns) => columns,
                // A board whose columns are gone still belongs to the repository.
                Err(e) if e.is_not_found() => {
                    warn!(project = project.id, "Project columns unavailable");
                    continue;
                }
                Err(e) => return Err(e),
            };
            project.columns = columns.value;
            if columns.rate_limit.is_some() {
                fetched.rate_limit = columns.rate_limit;
            }
        }
        Ok(fetched)
    }

    async fn milestones_page(
        &self,
        owner: &str,
        repo: &str,
        state: StateFilter,
        page: u32,
    ) -> CflowResult<Fetched<Page<MilestoneResponse>>> {
        self.get_page(
            &format!("/repos/{}/{}/milestones", owner, repo),
            vec![("state", state.as_str().to_string())],
            page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_classify_rate_limit() {
        let exhausted = headers(&[("x-ratelimit-remaining", "0")]);
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, &exhausted, "{}", "/repos/a/b"),
            CflowError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, &HeaderMap::new(), "API rate limit exceeded", "/repos/a/b"),
            CflowError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, &HeaderMap::new(), "Resource not accessible", "/repos/a/b"),
            CflowError::Client { status: 403, .. }
        ));
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "", "/x"),
            CflowError::RateLimited(_)
        ));
    }

    #[test]
    fn test_classify_other_statuses() {
        assert!(matches!(
            classify_error(StatusCode::NOT_FOUND, &HeaderMap::new(), "", "/repos/a/b/projects"),
            CflowError::NotFound(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, &HeaderMap::new(), "", "/x"),
            CflowError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, &HeaderMap::new(), "Bad credentials", "/x"),
            CflowError::Client { status: 401, .. }
        ));
    }

    #[test]
    fn test_rate_limit_headers() {
        let info = rate_limit_from_headers(&headers(&[
            ("x-ratelimit-remaining", "42"),
            ("x-ratelimit-reset", "1700000000"),
        ]))
        .unwrap();
        assert_eq!(info.remaining, Some(42));
        assert_eq!(info.reset_at.unwrap().timestamp(), 1_700_000_000);

        assert!(rate_limit_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_link_header() {
        let next = headers(&[(
            "link",
            "<https://api.github.com/repositories/1/issues?page=2>; rel=\"next\", <https://api.github.com/repositories/1/issues?page=5>; rel=\"last\"",
        )]);
        assert!(has_next_page(&next));

        let last = headers(&[("link", "<https://api.github.com/repositories/1/issues?page=1>; rel=\"prev\"")]);
        assert!(!has_next_page(&last));
        assert!(!has_next_page(&HeaderMap::new()));
    }
}
