//! Entity models.
//!
//! Each tracker has a raw response shape (what the API returns, nested
//! sub-objects and all) and a flat domain shape that is stored in the graph.
//! The conversion between the two is pure.

pub mod architecture;
pub mod github;
pub mod jira;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CflowError;

/// Lifecycle state shared by GitHub issues, projects and milestones.
///
/// Only `open` and `closed` are accepted. Anything else upstream
/// introduces is rejected rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Open,
    Closed,
}

impl ItemState {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl FromStr for ItemState {
    type Err = CflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(CflowError::validation(format!(
                "state must be 'open' or 'closed', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State filter for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateFilter {
    Open,
    Closed,
    #[default]
    All,
}

impl StateFilter {
    /// Convert to the query-string value the trackers expect.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }

    /// Whether an item in `state` passes this filter.
    pub fn matches(&self, state: ItemState) -> bool {
        match self {
            Self::All => true,
            Self::Open => state == ItemState::Open,
            Self::Closed => state == ItemState::Closed,
        }
    }
}

impl FromStr for StateFilter {
    type Err = CflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "all" => Ok(Self::All),
            other => Err(CflowError::validation(format!(
                "state filter must be open, closed or all, got '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_is_strict() {
        assert_eq!("open".parse::<ItemState>().unwrap(), ItemState::Open);
        assert_eq!("closed".parse::<ItemState>().unwrap(), ItemState::Closed);
        assert!(matches!("merged".parse::<ItemState>(), Err(CflowError::Validation(_))));
        assert!("Open".parse::<ItemState>().is_err());
    }

    #[test]
    fn test_state_filter() {
        assert_eq!("ALL".parse::<StateFilter>().unwrap(), StateFilter::All);
        assert!(StateFilter::Open.matches(ItemState::Open));
        assert!(!StateFilter::Open.matches(ItemState::Closed));
        assert!(StateFilter::All.matches(ItemState::Closed));
        assert!("draft".parse::<StateFilter>().is_err());
    }
}
