//! `cflow code` commands.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;

use cflow_core::{CodeEntity, Language, ParseCache, PatternExtractor};

use crate::output;

#[derive(Subcommand)]
pub enum CodeCommands {
    /// List top-level classes and functions in source files
    Entities {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print entities as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Entities found in one file.
#[derive(Debug, Serialize)]
pub struct FileEntities {
    pub path: PathBuf,
    pub entities: Vec<CodeEntity>,
}

pub fn execute(cmd: CodeCommands) -> Result<()> {
    match cmd {
        CodeCommands::Entities { paths, json } => {
            let files = scan(&paths)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else {
                output::print_code_entities(&files);
            }
            Ok(())
        }
    }
}

/// Extract entities from every supported file under `paths`.
pub fn scan(paths: &[PathBuf]) -> Result<Vec<FileEntities>> {
    let extractor = PatternExtractor::new()?;
    let mut cache = ParseCache::new();

    let mut files = Vec::new();
    for path in paths {
        collect_sources(path, &mut files)?;
    }
    files.sort();
    files.dedup();

    let mut results = Vec::new();
    for path in files {
        let entities = cache
            .entities(&path, &extractor)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if let Some(entities) = entities {
            results.push(FileEntities {
                path,
                entities: entities.as_ref().clone(),
            });
        }
    }
    Ok(results)
}

/// Supported source files, descending into directories. Hidden entries are skipped.
fn collect_sources(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !path.is_dir() {
        if Language::from_path(path).is_some() {
            files.push(path.to_path_buf());
        }
        return Ok(());
    }

    let entries = std::fs::read_dir(path).with_context(|| format!("Failed to list {}", path.display()))?;
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        collect_sources(&entry.path(), files)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cflow_core::CodeEntityKind;

    #[test]
    fn test_scan_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/.cache")).unwrap();
        std::fs::write(dir.path().join("src/app.py"), "class App:\n    pass\n\ndef main():\n    App()\n").unwrap();
        std::fs::write(dir.path().join("src/view.js"), "function render() {}\n").unwrap();
        std::fs::write(dir.path().join("src/.cache/old.py"), "def stale():\n    pass\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "# App\n").unwrap();

        let files = scan(&[dir.path().to_path_buf()]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("src/app.py"));
        assert_eq!(files[0].entities.len(), 2);
        assert_eq!(files[0].entities[0].kind, CodeEntityKind::Class);
        assert_eq!(files[0].entities[1].name, "main");
        assert_eq!(files[0].entities[1].start_line, 4);
        assert_eq!(files[1].entities[0].name, "render");
    }

    #[test]
    fn test_scan_same_file_twice() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("lib.ts");
        std::fs::write(&file, "const load = () => 1;\n").unwrap();

        let files = scan(&[file.clone(), file]).unwrap();
        assert_eq!(files.len(), 1);
    }
}
