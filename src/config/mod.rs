//! Configuration system for Ouroboros.
//!
//! Loaded once from YAML and then shared read-only (`Arc<Config>`) by every
//! pipeline stage. Search order:
//! 1. Explicit path if provided
//! 2. ~/.config/ouroboros/ouroboros.yml
//! 3. ./ouroboros.yml
//! 4. Defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OuroborosError, Result};

mod sections;

pub use sections::{
    DEFAULT_MODEL, DEFAULT_TOOLCHAIN_COMMAND, DetectionConfig, LlmConfig, RuleSpec, SafetyConfig, SynthesisConfig,
    ToolchainConfig, ToolsConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub safety: SafetyConfig,
    pub toolchain: ToolchainConfig,
    pub llm: LlmConfig,
    pub detection: DetectionConfig,
    pub synthesis: SynthesisConfig,
}

impl Config {
    /// Defaults rooted at the given tools directory
    pub fn with_tools_dir(dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.tools.dir = dir.into();
        config
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Parse configuration from a YAML string and validate it
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            OuroborosError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.tools.dir.as_os_str().is_empty() {
            return Err(OuroborosError::Config("tools.dir must not be empty".to_string()));
        }
        if self.tools.source_extension.is_empty() || self.tools.artifact_extension.is_empty() {
            return Err(OuroborosError::Config("tools extensions must not be empty".to_string()));
        }
        if !self.toolchain.command.contains("{source}") {
            return Err(OuroborosError::Config(
                "toolchain.command must reference {source}".to_string(),
            ));
        }
        if self.toolchain.timeout_ms == 0 || self.llm.timeout_ms == 0 {
            return Err(OuroborosError::Config("timeouts must be > 0".to_string()));
        }
        if self.synthesis.max_attempts == 0 {
            return Err(OuroborosError::Config("synthesis.max-attempts must be > 0".to_string()));
        }
        for (key, value) in [
            ("detection.fallback-confidence", self.detection.fallback_confidence),
            ("detection.fallback-priority", self.detection.fallback_priority),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(OuroborosError::Config(format!("{} must be within [0, 1]", key)));
            }
        }
        Ok(())
    }

    /// Staging area for in-flight builds, inside the tools directory so renames stay atomic
    pub fn staging_dir(&self) -> PathBuf {
        self.tools.dir.join(".staging")
    }
}
