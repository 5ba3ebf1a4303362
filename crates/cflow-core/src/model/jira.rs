//! Jira entity models (epics and their stories).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CflowError, CflowResult};
use crate::time::{parse_timestamp, Timestamp};

/// A Jira epic. Root entity within a Jira project scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Epic {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub assignee: Option<String>,
    pub reporter: String,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub labels: Vec<String>,
    pub priority: Option<String>,
}

/// A Jira story, optionally linked to its epic through `parent_key`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Story {
    pub key: String,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub assignee: Option<String>,
    pub reporter: String,
    pub created: Timestamp,
    pub updated: Timestamp,
    pub labels: Vec<String>,
    pub priority: Option<String>,
    pub parent_key: Option<String>,
}

// ============================================================================
// Raw API shapes
// ============================================================================

/// Issue as returned by `GET /rest/api/3/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraIssueResponse {
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
    pub fields: JiraFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraFields {
    #[serde(default)]
    pub summary: String,
    /// Plain text (API v2) or an Atlassian Document Format tree (API v3).
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(rename = "issuetype", default)]
    pub issue_type: Option<NamedRef>,
    #[serde(default)]
    pub status: Option<NamedRef>,
    #[serde(default)]
    pub assignee: Option<JiraUser>,
    #[serde(default)]
    pub reporter: Option<JiraUser>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub priority: Option<NamedRef>,
    #[serde(default)]
    pub parent: Option<ParentRef>,
}

/// Any `{"name": ...}` sub-object (status, priority, issue type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraUser {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRef {
    pub key: String,
}

/// Fields shared by epics and stories after validation.
struct Common {
    key: String,
    summary: String,
    description: Option<String>,
    status: String,
    assignee: Option<String>,
    reporter: String,
    created: Timestamp,
    updated: Timestamp,
    labels: Vec<String>,
    priority: Option<String>,
}

impl JiraIssueResponse {
    /// Name of the Jira issue type ("Epic", "Story", ...), if present.
    pub fn issue_type(&self) -> Option<&str> {
        self.fields.issue_type.as_ref().map(|t| t.name.as_str())
    }

    /// Convert to an epic.
    pub fn into_epic(self) -> CflowResult<Epic> {
        let (common, _) = self.into_common()?;
        Ok(Epic {
            key: common.key,
            summary: common.summary,
            description: common.description,
            status: common.status,
            assignee: common.assignee,
            reporter: common.reporter,
            created: common.created,
            updated: common.updated,
            labels: common.labels,
            priority: common.priority,
        })
    }

    /// Convert to a story.
    pub fn into_story(self) -> CflowResult<Story> {
        let (common, parent_key) = self.into_common()?;
        Ok(Story {
            key: common.key,
            summary: common.summary,
            description: common.description,
            status: common.status,
            assignee: common.assignee,
            reporter: common.reporter,
            created: common.created,
            updated: common.updated,
            labels: common.labels,
            priority: common.priority,
            parent_key,
        })
    }

    fn into_common(self) -> CflowResult<(Common, Option<String>)> {
        let key = self.key;
        let fields = self.fields;

        if key.trim().is_empty() {
            return Err(CflowError::validation("Jira issue without a key"));
        }
        let status = fields
            .status
            .map(|s| s.name)
            .ok_or_else(|| CflowError::validation(format!("{}: missing status", key)))?;
        let reporter = fields
            .reporter
            .map(|r| r.display_name)
            .ok_or_else(|| CflowError::validation(format!("{}: missing reporter", key)))?;
        let created = required_timestamp(&key, "created", fields.created.as_deref())?;
        let updated = required_timestamp(&key, "updated", fields.updated.as_deref())?;

        let common = Common {
            summary: fields.summary,
            description: fields.description.as_ref().and_then(description_text),
            status,
            assignee: fields.assignee.map(|a| a.display_name),
            reporter,
            created,
            updated,
            labels: fields.labels,
            priority: fields.priority.map(|p| p.name),
            key,
        };
        Ok((common, fields.parent.map(|p| p.key)))
    }
}

fn required_timestamp(key: &str, field: &str, raw: Option<&str>) -> CflowResult<Timestamp> {
    match raw {
        Some(s) => parse_timestamp(s),
        None => Err(CflowError::validation(format!("{}: missing {}", key, field))),
    }
}

/// Flatten a description into plain text.
///
/// ADF documents are walked depth-first; each top-level block becomes one
/// line. Empty results map to `None`.
fn description_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        Value::Object(_) => match value.get("content").and_then(Value::as_array) {
            Some(blocks) => blocks
                .iter()
                .map(inline_text)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            None => inline_text(value),
        },
        other => other.to_string(),
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn inline_text(node: &Value) -> String {
    if let Some(text) = node.get("text").and_then(Value::as_str) {
        return text.to_string();
    }
    node.get("content")
        .and_then(Value::as_array)
        .map(|children| children.iter().map(inline_text).collect::<String>())
        .unwrap_or_default()
}
