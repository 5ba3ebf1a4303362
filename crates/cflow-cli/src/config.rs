//! `contextflow.toml` loading with environment overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cflow_collect::{CollectionSettings, GitHubConfig, JiraConfig};
use cflow_graph::GraphConfig;

pub const DEFAULT_CONFIG_FILE: &str = "contextflow.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    /// Manifest collected by `sync all`.
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub github: GitHubConfig,
    pub jira: JiraConfig,
    pub collection: CollectionSettings,
    pub architecture: ArchitectureConfig,
}

impl Config {
    /// Load `path` (or `contextflow.toml` in the working directory) and apply
    /// environment overrides. A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Overlay credentials and endpoints from the environment.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |target: &mut String, name: &str| {
            if let Some(value) = var(name).filter(|v| !v.is_empty()) {
                *target = value;
            }
        };
        set(&mut self.graph.uri, "NEO4J_URI");
        set(&mut self.graph.user, "NEO4J_USER");
        set(&mut self.graph.password, "NEO4J_PASSWORD");

        let set_opt = |target: &mut Option<String>, name: &str| {
            if let Some(value) = var(name).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };
        set_opt(&mut self.github.token, "GITHUB_TOKEN");
        set_opt(&mut self.jira.url, "JIRA_URL");
        set_opt(&mut self.jira.user, "JIRA_USER");
        set_opt(&mut self.jira.api_token, "JIRA_API_TOKEN");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cflow_core::StateFilter;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[graph]
uri = "bolt://graph.internal:7687"

[github]
repositories = ["acme/widgets", "acme/gadgets"]

[jira]
url = "https://acme.atlassian.net"
projects = ["PROJ"]

[collection]
projects = false
issue_state = "open"

[architecture]
manifest = "docs/architecture.toml"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.graph.uri, "bolt://graph.internal:7687");
        assert_eq!(config.graph.user, "neo4j");
        assert_eq!(config.github.repositories.len(), 2);
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.jira.page_size, 50);
        assert!(!config.collection.projects);
        assert!(config.collection.issues);
        assert_eq!(config.collection.issue_state, StateFilter::Open);
        assert_eq!(config.architecture.manifest, Some(PathBuf::from("docs/architecture.toml")));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("GITHUB_TOKEN", "ghp_test"),
            ("NEO4J_PASSWORD", "s3cret"),
            ("JIRA_API_TOKEN", "jira-token"),
            ("NEO4J_URI", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.github.token.as_deref(), Some("ghp_test"));
        assert_eq!(config.graph.password, "s3cret");
        assert_eq!(config.jira.api_token.as_deref(), Some("jira-token"));
        // Empty values do not override.
        assert_eq!(config.graph.uri, "bolt://localhost:7687");
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[collection]\nissue_state = \"reopened\"").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }
}
