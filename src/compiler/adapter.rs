//! Compiler adapter
//!
//! Builds each candidate in its own staging directory under the tools dir and
//! publishes the source and artifact by rename once the build succeeds. The
//! artifact goes last, so a half-finished publish never leaves an artifact
//! without its source. A failed or cancelled build leaves nothing behind in
//! the tools dir.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{OuroborosError, Result};

use super::toolchain::Toolchain;

/// Result of compiling one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Built { source_path: PathBuf, artifact_path: PathBuf },
    Failed { diagnostics: String },
}

impl CompileOutcome {
    pub fn is_built(&self) -> bool {
        matches!(self, CompileOutcome::Built { .. })
    }
}

pub struct CompilerAdapter<T: Toolchain> {
    toolchain: T,
    tools_dir: PathBuf,
    staging_dir: PathBuf,
    source_extension: String,
    artifact_extension: String,
}

impl<T: Toolchain> CompilerAdapter<T> {
    pub fn new(config: &Config, toolchain: T) -> Self {
        Self {
            toolchain,
            tools_dir: config.tools.dir.clone(),
            staging_dir: config.staging_dir(),
            source_extension: config.tools.source_extension.clone(),
            artifact_extension: config.tools.artifact_extension.clone(),
        }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn source_path(&self, name: &str) -> PathBuf {
        self.tools_dir.join(format!("{}.{}", name, self.source_extension))
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.tools_dir.join(format!("{}.{}", name, self.artifact_extension))
    }

    /// Compile `source` as tool `name`
    ///
    /// `Err` means the toolchain could not run or the build was cancelled;
    /// a candidate that does not build is `Ok(CompileOutcome::Failed)`.
    pub async fn compile(&self, name: &str, source: &str, cancel: &CancellationToken) -> Result<CompileOutcome> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(OuroborosError::InvalidInput(format!("invalid tool name '{}'", name)));
        }

        tokio::fs::create_dir_all(&self.staging_dir).await?;
        let staging = tempfile::Builder::new()
            .prefix(&format!("{}-", name))
            .tempdir_in(&self.staging_dir)?;

        let staged_source = staging.path().join(format!("{}.{}", name, self.source_extension));
        let staged_artifact = staging.path().join(format!("{}.{}", name, self.artifact_extension));
        tokio::fs::write(&staged_source, source).await?;

        log::debug!(
            "Building {} with {} in {}",
            name,
            self.toolchain.description(),
            staging.path().display()
        );
        let report = self.toolchain.build(&staged_source, &staged_artifact, cancel).await?;

        if !report.success {
            log::debug!("Build of {} failed", name);
            return Ok(CompileOutcome::Failed {
                diagnostics: report.diagnostics,
            });
        }
        if !tokio::fs::try_exists(&staged_artifact).await? {
            return Ok(CompileOutcome::Failed {
                diagnostics: format!(
                    "toolchain reported success but produced no artifact at {}",
                    staged_artifact.display()
                ),
            });
        }

        let source_path = self.source_path(name);
        let artifact_path = self.artifact_path(name);
        tokio::fs::rename(&staged_source, &source_path).await?;
        if let Err(e) = tokio::fs::rename(&staged_artifact, &artifact_path).await {
            remove_published(&source_path).await;
            return Err(e.into());
        }
        log::info!("Built {} -> {}", name, artifact_path.display());

        Ok(CompileOutcome::Built {
            source_path,
            artifact_path,
        })
    }

    /// Remove a published tool's artifact and source
    pub async fn unpublish(&self, name: &str) {
        remove_published(&self.artifact_path(name)).await;
        remove_published(&self.source_path(name)).await;
    }
}

async fn remove_published(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
