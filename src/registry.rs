//! Read-only listing of tools that already exist.
//!
//! Used to build refinement prompts so the model can prefer reuse over
//! synthesizing a duplicate.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ouroboros::ToolMetadata;

/// Source of existing tool names
pub trait ToolRegistry: Send + Sync {
    /// Names of every known tool, sorted
    fn tool_names(&self) -> Vec<String>;

    /// Check whether a tool with this name already exists
    fn contains(&self, name: &str) -> bool {
        self.tool_names().iter().any(|n| n == name)
    }
}

/// Fixed list of tool names
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    names: Vec<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.sort();
        names.dedup();
        Self { names }
    }
}

impl ToolRegistry for StaticRegistry {
    fn tool_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

/// Lists tools registered in a tools directory by their `<name>.json` manifests
#[derive(Debug, Clone)]
pub struct DirectoryRegistry {
    dir: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load every readable manifest; unreadable ones are skipped with a warning
    pub fn manifests(&self) -> Vec<ToolMetadata> {
        let pattern = self.dir.join("*.json");
        let Some(pattern) = pattern.to_str() else {
            log::warn!("Tools directory is not valid UTF-8: {}", self.dir.display());
            return Vec::new();
        };

        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                log::warn!("Invalid manifest pattern {}: {}", pattern, e);
                return Vec::new();
            }
        };

        let mut manifests = Vec::new();
        for path in paths.flatten() {
            match read_manifest(&path) {
                Ok(metadata) => manifests.push(metadata),
                Err(e) => log::warn!("Skipping manifest {}: {}", path.display(), e),
            }
        }
        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        manifests
    }
}

fn read_manifest(path: &Path) -> Result<ToolMetadata> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

impl ToolRegistry for DirectoryRegistry {
    fn tool_names(&self) -> Vec<String> {
        self.manifests().into_iter().map(|m| m.name).collect()
    }
}
