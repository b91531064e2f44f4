//! Configuration sections.
//!
//! Each section deserializes with `#[serde(default)]` so a partial YAML file
//! only overrides the keys it names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default model for refinement and synthesis calls.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default build command; `{source}` and `{output}` are substituted per build.
pub const DEFAULT_TOOLCHAIN_COMMAND: &str = "rustc --edition 2021 --crate-type cdylib -O -o {output} {source}";

/// Where generated tools land and how they are named on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolsConfig {
    /// Output directory for sources, artifacts and manifests.
    pub dir: PathBuf,

    /// Dry-run default used when a caller does not specify one.
    pub dry_run: bool,

    /// Extension given to persisted source units.
    pub source_extension: String,

    /// Extension given to build artifacts.
    pub artifact_extension: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ouroboros")
                .join("tools"),
            dry_run: false,
            source_extension: "rs".to_string(),
            artifact_extension: std::env::consts::DLL_EXTENSION.to_string(),
        }
    }
}

/// A user-supplied denylist entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleSpec {
    pub id: String,
    pub pattern: String,
    #[serde(default)]
    pub description: String,
}

/// Safety rule overrides. The unsafe-memory baseline cannot be disabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SafetyConfig {
    /// Ids of default rules to turn off (e.g. `network-access`).
    pub disabled_rules: Vec<String>,

    /// Additional rules appended after the built-in ones.
    pub extra_rules: Vec<RuleSpec>,

    /// Candidates larger than this are rejected outright.
    pub max_source_bytes: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            disabled_rules: Vec::new(),
            extra_rules: Vec::new(),
            max_source_bytes: 256 * 1024,
        }
    }
}

/// External build toolchain invocation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ToolchainConfig {
    /// Shell command template.
    pub command: String,

    /// Wall-clock limit per build in milliseconds.
    pub timeout_ms: u64,

    /// Extra environment for the build.
    pub env: HashMap<String, String>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_TOOLCHAIN_COMMAND.to_string(),
            timeout_ms: 120_000,
            env: HashMap::new(),
        }
    }
}

/// LLM completion settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: u32,
    /// Timeout per completion call in milliseconds.
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            timeout_ms: 60_000,
        }
    }
}

/// Constants for the heuristic fallback need.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DetectionConfig {
    pub fallback_confidence: f64,
    pub fallback_priority: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fallback_confidence: 0.4,
            fallback_priority: 0.5,
        }
    }
}

/// Code synthesis retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SynthesisConfig {
    /// Generation attempts per need, including the first.
    pub max_attempts: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}
