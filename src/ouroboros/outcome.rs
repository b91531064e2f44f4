//! Request, outcome and metadata types of a generation call

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::ToolNeed;
use crate::safety::SafetyViolation;

/// Message prefix of a candidate rejected before compilation
pub const SAFETY_FAILURE_PREFIX: &str = "safety check failed: ";

/// Message prefix of a candidate that did not build
pub const COMPILATION_FAILURE_PREFIX: &str = "compilation failed: ";

/// Candidate source plus the need it answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub name: String,
    pub purpose: String,
    pub source_code: String,
    pub priority: f64,
    pub confidence: f64,
    /// `None` uses the configured default
    pub dry_run: Option<bool>,
}

impl GenerationRequest {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            source_code: source_code.into(),
            priority: 0.5,
            confidence: 0.5,
            dry_run: None,
        }
    }

    /// Request carrying the name and scores of a detected need
    pub fn from_need(need: &ToolNeed, source_code: impl Into<String>) -> Self {
        Self::new(need.name.clone(), need.purpose.clone(), source_code)
            .with_priority(need.priority)
            .with_confidence(need.confidence)
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }
}

/// Which stage rejected a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Safety,
    Compilation,
    /// Toolchain unavailable or tools directory unusable; counted as a compilation failure
    Infrastructure,
}

/// Registration record of a generated tool, persisted as `<name>.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub purpose: String,
    pub priority: f64,
    pub confidence: f64,
    /// Hex SHA-256 of the candidate source
    pub source_sha256: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
}

impl ToolMetadata {
    pub fn new(
        name: impl Into<String>,
        purpose: impl Into<String>,
        priority: f64,
        confidence: f64,
        source_sha256: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            priority,
            confidence,
            source_sha256: source_sha256.into(),
            source_path: None,
            artifact_path: None,
            created_at: Utc::now(),
            dry_run: false,
        }
    }
}

/// Definitive accept/reject result of one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub success: bool,
    pub artifact_path: Option<PathBuf>,
    pub metadata: Option<ToolMetadata>,
    /// Empty on success; otherwise prefixed by the failing stage
    pub error_message: String,
    pub failure: Option<FailureKind>,
}

impl GenerationOutcome {
    pub fn registered(metadata: ToolMetadata) -> Self {
        Self {
            success: true,
            artifact_path: metadata.artifact_path.clone(),
            metadata: Some(metadata),
            error_message: String::new(),
            failure: None,
        }
    }

    pub fn rejected_unsafe(violation: &SafetyViolation) -> Self {
        Self::failed(FailureKind::Safety, format!("{}{}", SAFETY_FAILURE_PREFIX, violation))
    }

    pub fn compile_failed(kind: FailureKind, diagnostics: impl AsRef<str>) -> Self {
        Self::failed(kind, format!("{}{}", COMPILATION_FAILURE_PREFIX, diagnostics.as_ref()))
    }

    fn failed(kind: FailureKind, error_message: String) -> Self {
        Self {
            success: false,
            artifact_path: None,
            metadata: None,
            error_message,
            failure: Some(kind),
        }
    }

    pub fn is_safety_failure(&self) -> bool {
        self.error_message.starts_with(SAFETY_FAILURE_PREFIX)
    }

    pub fn is_compilation_failure(&self) -> bool {
        self.error_message.starts_with(COMPILATION_FAILURE_PREFIX)
    }

    /// Failure text without the stage prefix
    pub fn diagnostics(&self) -> &str {
        self.error_message
            .strip_prefix(COMPILATION_FAILURE_PREFIX)
            .or_else(|| self.error_message.strip_prefix(SAFETY_FAILURE_PREFIX))
            .unwrap_or(&self.error_message)
    }
}
