//! Build toolchain capability
//!
//! A toolchain compiles one source unit into one artifact. `Err` is reserved
//! for infrastructure problems (toolchain missing, spawn failure); a candidate
//! that does not compile is a normal `BuildReport` with `success == false`.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::process_group::ProcessGroupGuard;
use crate::config::ToolchainConfig;
use crate::error::{OuroborosError, Result};

/// Verdict and raw diagnostics of one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub success: bool,
    pub diagnostics: String,
}

impl BuildReport {
    pub fn passed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: true,
            diagnostics: diagnostics.into(),
        }
    }

    pub fn failed(diagnostics: impl Into<String>) -> Self {
        Self {
            success: false,
            diagnostics: diagnostics.into(),
        }
    }
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Compile `source` into `output`
    async fn build(&self, source: &Path, output: &Path, cancel: &CancellationToken) -> Result<BuildReport>;

    /// Short description for logs
    fn description(&self) -> &str {
        "toolchain"
    }
}

/// Exit statuses `sh` uses when the command itself cannot be run
const SHELL_NOT_EXECUTABLE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

/// Toolchain that runs a shell command template
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    command: String,
    env: HashMap<String, String>,
    timeout: Duration,
}

impl CommandToolchain {
    pub fn new(command: impl Into<String>) -> Self {
        Self::from_config(&ToolchainConfig {
            command: command.into(),
            ..Default::default()
        })
    }

    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self {
            command: config.command.clone(),
            env: config.env.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Set the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Substitute shell-quoted paths into the command template
    pub fn render_command(&self, source: &Path, output: &Path) -> String {
        self.command
            .replace("{source}", &shell_quote(&source.to_string_lossy()))
            .replace("{output}", &shell_quote(&output.to_string_lossy()))
    }
}

/// Single-quote a string for `sh`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl Toolchain for CommandToolchain {
    async fn build(&self, source: &Path, output: &Path, cancel: &CancellationToken) -> Result<BuildReport> {
        let rendered = self.render_command(source, output);
        log::debug!("Running toolchain: {}", rendered);

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&rendered);
        if let Some(dir) = source.parent() {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own group, so the compiler `sh` starts goes down with it
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd
            .spawn()
            .map_err(|e| OuroborosError::Toolchain(format!("failed to start toolchain: {}", e)))?;
        let group = ProcessGroupGuard::new(child.id());

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OuroborosError::Cancelled),
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(output) => output.map_err(|e| OuroborosError::Toolchain(format!("toolchain did not complete: {}", e)))?,
                Err(_) => {
                    return Ok(BuildReport::failed(format!(
                        "build timed out after {}ms",
                        self.timeout.as_millis()
                    )));
                }
            },
        };
        group.disarm();

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut diagnostics = stderr.trim().to_string();
        if !stdout.trim().is_empty() {
            if !diagnostics.is_empty() {
                diagnostics.push('\n');
            }
            diagnostics.push_str(stdout.trim());
        }

        match output.status.code() {
            Some(0) => Ok(BuildReport::passed(diagnostics)),
            Some(code @ (SHELL_NOT_EXECUTABLE | SHELL_NOT_FOUND)) => Err(OuroborosError::Toolchain(format!(
                "toolchain command unavailable (exit {}): {}",
                code, diagnostics
            ))),
            code => {
                if diagnostics.is_empty() {
                    diagnostics = format!("toolchain exited with status {:?}", code);
                }
                Ok(BuildReport::failed(diagnostics))
            }
        }
    }

    fn description(&self) -> &str {
        &self.command
    }
}
