//! # ContextFlow Collect
//!
//! Pulls entities from GitHub and Jira through a rate-limited retry client,
//! normalizes them and drives the graph upserts per scope.

pub mod collector;
pub mod github;
pub mod jira;
pub mod remote;
pub mod retry;
pub mod source;

pub use collector::{
    collect_architecture, CollectionSettings, CollectionSummary, EntityKind, GitHubCollector, JiraCollector,
    KindReport, ScopeOutcome, ScopePhase, ScopeReport,
};
pub use github::{GitHubClient, GitHubConfig};
pub use jira::{JiraClient, JiraConfig};
pub use remote::{GitHubApi, JiraApi, Page};
pub use retry::{Clock, Fetched, RateLimitInfo, RetryClient, RetryPolicy, TokioClock};
pub use source::{GitHubSource, JiraSource};
