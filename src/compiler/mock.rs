//! Scripted toolchain for tests
//!
//! Pops one scripted result per build. A passing build writes the source
//! bytes to the output path so callers see a real artifact.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{OuroborosError, Result};

use super::toolchain::{BuildReport, Toolchain};

#[derive(Debug, Clone)]
enum Scripted {
    Pass,
    /// Reports success without producing an artifact
    PassWithoutArtifact,
    Fail(String),
    Unavailable(String),
}

#[derive(Debug, Default)]
pub struct MockToolchain {
    script: Mutex<VecDeque<Scripted>>,
    /// Pass when nothing is scripted
    fallback_pass: bool,
    delay: Option<Duration>,
    builds: AtomicUsize,
    sources: Mutex<Vec<PathBuf>>,
}

impl MockToolchain {
    /// Every build passes
    pub fn passing() -> Self {
        Self {
            fallback_pass: true,
            ..Default::default()
        }
    }

    /// Every build fails with the given diagnostics
    pub fn failing(diagnostics: impl Into<String>) -> Self {
        let toolchain = Self::default();
        toolchain.push(Scripted::Fail(diagnostics.into()));
        toolchain
    }

    pub fn then_pass(self) -> Self {
        self.push(Scripted::Pass);
        self
    }

    pub fn then_fail(self, diagnostics: impl Into<String>) -> Self {
        self.push(Scripted::Fail(diagnostics.into()));
        self
    }

    pub fn then_pass_without_artifact(self) -> Self {
        self.push(Scripted::PassWithoutArtifact);
        self
    }

    pub fn then_unavailable(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Unavailable(message.into()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of builds started
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    /// Source paths handed to the toolchain, in order
    pub fn sources(&self) -> Vec<PathBuf> {
        self.sources.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn push(&self, step: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
    }

    fn next(&self) -> Scripted {
        let scripted = self.script.lock().ok().and_then(|mut s| {
            // The last scripted step repeats
            if s.len() > 1 { s.pop_front() } else { s.front().cloned() }
        });
        match scripted {
            Some(step) => step,
            None if self.fallback_pass => Scripted::Pass,
            None => Scripted::Unavailable("mock toolchain has no scripted results".to_string()),
        }
    }
}

#[async_trait]
impl Toolchain for MockToolchain {
    async fn build(&self, source: &Path, output: &Path, cancel: &CancellationToken) -> Result<BuildReport> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut sources) = self.sources.lock() {
            sources.push(source.to_path_buf());
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(OuroborosError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(OuroborosError::Cancelled);
        }

        match self.next() {
            Scripted::Pass => {
                let bytes = tokio::fs::read(source).await?;
                tokio::fs::write(output, bytes).await?;
                Ok(BuildReport::passed(""))
            }
            Scripted::PassWithoutArtifact => Ok(BuildReport::passed("")),
            Scripted::Fail(diagnostics) => Ok(BuildReport::failed(diagnostics)),
            Scripted::Unavailable(message) => Err(OuroborosError::Toolchain(message)),
        }
    }

    fn description(&self) -> &str {
        "mock toolchain"
    }
}
