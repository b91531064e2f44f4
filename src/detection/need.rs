//! ToolNeed - a detected capability gap

use serde::{Deserialize, Serialize};

use super::category::ToolCategory;

/// Synthetic trigger appended when the caller reports a failed prior attempt
pub const PREVIOUS_ATTEMPT_FAILED: &str = "previous_attempt_failed";

/// How a need was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedOrigin {
    /// Refined by the language model
    Model,
    /// Built from pattern matches alone
    Heuristic,
}

/// A structured record of a missing tool, with provenance and scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolNeed {
    pub name: String,
    pub purpose: String,
    pub input_type: String,
    pub output_type: String,
    /// Detection rules that fired, in firing order
    pub triggers: Vec<String>,
    pub priority: f64,
    pub confidence: f64,
    pub reasoning: String,
    pub category: ToolCategory,
    pub origin: NeedOrigin,
}

impl ToolNeed {
    /// Low-confidence need built from pattern matches when refinement is unavailable
    pub fn heuristic(
        input: &str,
        category: ToolCategory,
        triggers: Vec<String>,
        confidence: f64,
        priority: f64,
    ) -> Self {
        Self {
            name: category.fallback_tool_name(),
            purpose: input.to_string(),
            input_type: "string".to_string(),
            output_type: "string".to_string(),
            triggers,
            priority,
            confidence,
            reasoning: format!("heuristic fallback: matched {} patterns", category),
            category,
            origin: NeedOrigin::Heuristic,
        }
    }

    pub fn is_heuristic(&self) -> bool {
        self.origin == NeedOrigin::Heuristic
    }
}

/// Clamp a model-supplied score into [0, 1], using `fallback` for non-finite values
pub fn clamp_score(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { fallback }
}

/// Normalize a proposed tool name into an identifier safe for file names.
///
/// Lower-cases, maps every other character to `_`, collapses runs of `_` and
/// prefixes a leading digit. Returns `None` when nothing usable remains.
pub fn normalize_tool_name(raw: &str) -> Option<String> {
    let mut name = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let ch = if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '_' };
        if ch == '_' && name.ends_with('_') {
            continue;
        }
        name.push(ch);
    }
    let name = name.trim_matches('_');
    if name.is_empty() {
        return None;
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        Some(format!("tool_{}", name))
    } else {
        Some(name.to_string())
    }
}
