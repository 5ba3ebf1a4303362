//! Code-entity extraction interface and parse cache.
//!
//! An [`EntityExtractor`] turns file bytes into entity records. Syntax-aware
//! parsing lives outside this crate; [`PatternExtractor`] is the line-based
//! fallback. [`ParseCache`] memoizes extraction per file, keyed by path and
//! modification time, and is owned by whoever needs it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CflowError, CflowResult};

/// Kind of extracted code entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeEntityKind {
    Class,
    Function,
}

/// A named span in a source file. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub kind: CodeEntityKind,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// Source languages the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
}

impl Language {
    /// Guess the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "py" => Some(Self::Python),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            _ => None,
        }
    }
}

/// Pure, stateless extraction of entities from file contents.
pub trait EntityExtractor {
    fn extract(&self, source: &[u8], language: Language) -> Vec<CodeEntity>;
}

/// Top-level `class` and function declarations matched at line start.
///
/// Each entity spans a single line since no block structure is parsed.
pub struct PatternExtractor {
    class: Regex,
    python_function: Regex,
    script_function: Regex,
}

impl PatternExtractor {
    pub fn new() -> CflowResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| CflowError::Config(format!("invalid entity pattern: {}", e)))
        };
        Ok(Self {
            class: compile(r"^class\s+(\w+)")?,
            python_function: compile(r"^(?:async\s+)?def\s+(\w+)")?,
            script_function: compile(r"^(?:export\s+)?(?:async\s+)?function\s+(\w+)|\bconst\s+(\w+)\s*=\s*\(")?,
        })
    }
}

fn first_capture<'t>(pattern: &Regex, line: &'t str) -> Option<&'t str> {
    let captures = pattern.captures(line)?;
    captures.iter().skip(1).flatten().next().map(|m| m.as_str())
}

impl EntityExtractor for PatternExtractor {
    fn extract(&self, source: &[u8], language: Language) -> Vec<CodeEntity> {
        let function = match language {
            Language::Python => &self.python_function,
            Language::JavaScript | Language::TypeScript => &self.script_function,
        };

        let text = String::from_utf8_lossy(source);
        let mut entities = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let found = match first_capture(&self.class, line) {
                Some(name) => Some((CodeEntityKind::Class, name)),
                None => first_capture(function, line).map(|name| (CodeEntityKind::Function, name)),
            };
            if let Some((kind, name)) = found {
                let line_number = index as u32 + 1;
                entities.push(CodeEntity {
                    kind,
                    name: name.to_string(),
                    start_line: line_number,
                    end_line: line_number,
                });
            }
        }
        entities
    }
}

struct CacheEntry {
    modified: SystemTime,
    entities: Arc<Vec<CodeEntity>>,
}

/// Extraction results keyed by file path and modification time.
#[derive(Default)]
pub struct ParseCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities for `path`, re-extracting when the file changed on disk.
    ///
    /// Returns `Ok(None)` for files in an unsupported language.
    pub fn entities(
        &mut self,
        path: &Path,
        extractor: &dyn EntityExtractor,
    ) -> CflowResult<Option<Arc<Vec<CodeEntity>>>> {
        let Some(language) = Language::from_path(path) else {
            return Ok(None);
        };

        let modified = std::fs::metadata(path)?.modified()?;
        if let Some(entry) = self.entries.get(path) {
            if entry.modified == modified {
                return Ok(Some(Arc::clone(&entry.entities)));
            }
        }

        let source = std::fs::read(path)?;
        let entities = Arc::new(extractor.extract(&source, language));
        debug!(path = %path.display(), count = entities.len(), "Extracted code entities");

        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                modified,
                entities: Arc::clone(&entities),
            },
        );
        Ok(Some(entities))
    }

    /// Drop the cached result for one file.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
