//! Jira REST v3 search client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use cflow_core::model::jira::JiraIssueResponse;
use cflow_core::{CflowError, CflowResult};

use crate::remote::{JiraApi, Page};
use crate::retry::{Fetched, RateLimitInfo};

const SEARCH_FIELDS: &str = "summary,description,issuetype,status,assignee,reporter,created,updated,labels,priority,parent";

/// Jira connection and scope settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    pub url: Option<String>,
    pub user: Option<String>,
    pub api_token: Option<String>,
    /// Project keys to collect.
    pub projects: Vec<String>,
    pub page_size: u32,
    pub timeout_secs: u64,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            url: None,
            user: None,
            api_token: None,
            projects: Vec::new(),
            page_size: 50,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    start_at: u32,
    #[serde(default)]
    total: u32,
    #[serde(default)]
    issues: Vec<JiraIssueResponse>,
}

/// Jira search client using basic auth (user + API token).
#[derive(Clone)]
pub struct JiraClient {
    client: Client,
    base_url: String,
    user: String,
    api_token: String,
    page_size: u32,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> CflowResult<Self> {
        let missing = |what: &str| CflowError::Config(format!("Jira {} is not configured", what));
        let base_url = config.url.as_deref().ok_or_else(|| missing("url"))?;
        let user = config.user.clone().ok_or_else(|| missing("user"))?;
        let api_token = config.api_token.clone().ok_or_else(|| missing("API token"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CflowError::Config(format!("Failed to build Jira client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user,
            api_token,
            page_size: config.page_size.max(1),
        })
    }
}

/// Map a non-success search response onto the error taxonomy.
pub fn classify_error(status: StatusCode, body: &str) -> CflowError {
    let message = format!("Jira search: {}", body.trim());
    match status {
        StatusCode::TOO_MANY_REQUESTS => CflowError::RateLimited(message),
        StatusCode::NOT_FOUND => CflowError::NotFound(message),
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

/// `X-RateLimit-Remaining` / `X-RateLimit-Reset` when Jira sends them.
/// The reset is an ISO timestamp, or epoch seconds on some proxies.
pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);

    let reset_at = header_str("x-ratelimit-reset").and_then(|v| {
        DateTime::parse_from_rfc3339(v)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| v.parse::<i64>().ok().and_then(|secs| Utc.timestamp_opt(secs, 0).single()))
    });
    let info = RateLimitInfo {
        remaining: header_str("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
        reset_at,
    };
    (!info.is_empty()).then_some(info)
}

#[async_trait]
impl JiraApi for JiraClient {
    async fn search_page(&self, jql: &str, page: u32) -> CflowResult<Fetched<Page<JiraIssueResponse>>> {
        let start_at = page.saturating_sub(1) * self.page_size;
        let url = format!("{}/rest/api/3/search", self.base_url);
        let params = [
            ("jql", jql.to_string()),
            ("startAt", start_at.to_string()),
            ("maxResults", self.page_size.to_string()),
            ("fields", SEARCH_FIELDS.to_string()),
        ];

        debug!(jql = %jql, start_at, "Searching Jira issues");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.api_token))
            .query(&params)
            .send()
            .await
            .map_err(|e| CflowError::Network(format!("Jira search failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &body));
        }

        let rate_limit = rate_limit_from_headers(response.headers());
        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| CflowError::Decode(format!("Jira search response: {}", e)))?;

        let seen = result.start_at.saturating_add(result.issues.len() as u32);
        let has_next = !result.issues.is_empty() && seen < result.total;
        Ok(Fetched::new(Page {
            items: result.issues,
            has_next,
        })
        .with_rate_limit(rate_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_missing_credentials() {
        let config = JiraConfig {
            url: Some("https://example.atlassian.net".into()),
            ..Default::default()
        };
        assert!(matches!(JiraClient::new(&config), Err(CflowError::Config(_))));
    }

    #[test]
    fn test_classify() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, ""),
            CflowError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::SERVICE_UNAVAILABLE, ""),
            CflowError::Server { status: 503, .. }
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "JQL error"),
            CflowError::Client { status: 400, .. }
        ));
    }

    #[test]
    fn test_iso_reset_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("2024-05-01T10:00:00Z"));
        let info = rate_limit_from_headers(&headers).unwrap();
        assert_eq!(info.reset_at.unwrap().to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(info.remaining.is_none());
    }
}
