//! C4 architecture elements.
//!
//! Elements are declared in a TOML manifest:
//!
//! ```toml
//! [[context]]
//! name = "ContextFlow"
//!
//! [[container]]
//! name = "Collector"
//! context = "ContextFlow"
//! technology = "Rust"
//!
//! [[component]]
//! name = "RetryClient"
//! container = "Collector"
//!
//! [[code]]
//! name = "with_retry"
//! component = "RetryClient"
//! ```

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CflowError, CflowResult};

/// C4 abstraction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum C4Level {
    Context,
    Container,
    Component,
    Code,
}

impl C4Level {
    /// All levels, parents first.
    pub const ALL: [C4Level; 4] = [Self::Context, Self::Container, Self::Component, Self::Code];

    /// The level an element of this level belongs to.
    pub fn parent_level(&self) -> Option<C4Level> {
        match self {
            Self::Context => None,
            Self::Container => Some(Self::Context),
            Self::Component => Some(Self::Container),
            Self::Code => Some(Self::Component),
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Container => "container",
            Self::Component => "component",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for C4Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single architecture element. Names are unique per level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchitectureElement {
    pub level: C4Level,
    pub name: String,
    pub description: Option<String>,
    pub technology: Option<String>,
    /// Name of the element one level up. `None` only for contexts.
    pub parent: Option<String>,
}

impl ArchitectureElement {
    /// Build and validate an element.
    pub fn new(
        level: C4Level,
        name: impl Into<String>,
        parent: Option<String>,
        description: Option<String>,
        technology: Option<String>,
    ) -> CflowResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CflowError::validation(format!("{} without a name", level)));
        }

        let parent = parent.filter(|p| !p.trim().is_empty());
        match (level.parent_level(), &parent) {
            (Some(parent_level), None) => {
                return Err(CflowError::validation(format!(
                    "{} '{}' must name its {}",
                    level, name, parent_level
                )));
            }
            (None, Some(p)) => {
                return Err(CflowError::validation(format!(
                    "context '{}' cannot have a parent (got '{}')",
                    name, p
                )));
            }
            _ => {}
        }

        Ok(Self {
            level,
            name,
            description,
            technology,
            parent,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextEntry {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerEntry {
    pub name: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentEntry {
    pub name: String,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub technology: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodeEntry {
    pub name: String,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Architecture manifest as written on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchitectureManifest {
    #[serde(default, rename = "context")]
    pub contexts: Vec<ContextEntry>,
    #[serde(default, rename = "container")]
    pub containers: Vec<ContainerEntry>,
    #[serde(default, rename = "component")]
    pub components: Vec<ComponentEntry>,
    #[serde(default, rename = "code")]
    pub code: Vec<CodeEntry>,
}

impl ArchitectureManifest {
    /// Parse a manifest from TOML text.
    pub fn from_toml(text: &str) -> CflowResult<Self> {
        toml::from_str(text).map_err(|e| CflowError::parse(format!("architecture manifest: {}", e)))
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> CflowResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Elements of one level, each validated independently.
    pub fn elements_at(&self, level: C4Level) -> Vec<CflowResult<ArchitectureElement>> {
        match level {
            C4Level::Context => self
                .contexts
                .iter()
                .map(|c| ArchitectureElement::new(level, c.name.clone(), None, c.description.clone(), None))
                .collect(),
            C4Level::Container => self
                .containers
                .iter()
                .map(|c| {
                    ArchitectureElement::new(
                        level,
                        c.name.clone(),
                        c.context.clone(),
                        c.description.clone(),
                        c.technology.clone(),
                    )
                })
                .collect(),
            C4Level::Component => self
                .components
                .iter()
                .map(|c| {
                    ArchitectureElement::new(
                        level,
                        c.name.clone(),
                        c.container.clone(),
                        c.description.clone(),
                        c.technology.clone(),
                    )
                })
                .collect(),
            C4Level::Code => self
                .code
                .iter()
                .map(|c| ArchitectureElement::new(level, c.name.clone(), c.component.clone(), c.description.clone(), None))
                .collect(),
        }
    }

    /// Total number of declared elements.
    pub fn len(&self) -> usize {
        self.contexts.len() + self.containers.len() + self.components.len() + self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
[[context]]
name = "ContextFlow"
description = "Tracker to graph sync"

[[container]]
name = "Collector"
context = "ContextFlow"
technology = "Rust"

[[component]]
name = "RetryClient"
container = "Collector"

[[code]]
name = "with_retry"
component = "RetryClient"

[[code]]
name = "orphan"
"#;

    #[test]
    fn test_manifest_levels() {
        let manifest = ArchitectureManifest::from_toml(MANIFEST).unwrap();
        assert_eq!(manifest.len(), 5);

        let containers = manifest.elements_at(C4Level::Container);
        let collector = containers[0].as_ref().unwrap();
        assert_eq!(collector.parent.as_deref(), Some("ContextFlow"));
        assert_eq!(collector.technology.as_deref(), Some("Rust"));

        let code = manifest.elements_at(C4Level::Code);
        assert!(code[0].is_ok());
        assert!(matches!(code[1], Err(CflowError::Validation(_))));
    }

    #[test]
    fn test_context_cannot_have_parent() {
        let err = ArchitectureElement::new(C4Level::Context, "A", Some("B".into()), None, None);
        assert!(err.is_err());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(ArchitectureElement::new(C4Level::Context, "  ", None, None, None).is_err());
    }

    #[test]
    fn test_parent_levels() {
        assert_eq!(C4Level::Code.parent_level(), Some(C4Level::Component));
        assert_eq!(C4Level::Context.parent_level(), None);
        assert!(C4Level::Context < C4Level::Code);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(ArchitectureManifest::from_toml("[[context]\nname="), Err(CflowError::Parse(_))));
    }
}
