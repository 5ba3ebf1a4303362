//! ContextFlow Core Library
//!
//! Entity models, timestamp normalization and the error taxonomy shared by
//! the collectors and the graph synchronization engine.

pub mod code;
pub mod error;
pub mod model;
pub mod time;

pub use code::{CodeEntity, CodeEntityKind, EntityExtractor, Language, ParseCache, PatternExtractor};
pub use error::{CflowError, CflowResult};
pub use model::architecture::{ArchitectureElement, ArchitectureManifest, C4Level};
pub use model::github::{Issue, Milestone, Project, Repository};
pub use model::jira::{Epic, Story};
pub use model::{ItemState, StateFilter};
pub use time::Timestamp;
