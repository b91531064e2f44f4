//! Safety Validator - static inspection of untrusted candidate source.
//!
//! Runs on the raw text before anything is written to disk or handed to the
//! toolchain. Rules are evaluated in order (baseline, default, custom) and the
//! first hit rejects the candidate.

use std::fmt;

use crate::config::SafetyConfig;
use crate::error::{OuroborosError, Result};

use super::rules::{BASELINE_RULES, DEFAULT_RULES, SafetyRule};

/// Rule id reported for oversized candidates
pub const SOURCE_TOO_LARGE: &str = "source-too-large";

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyViolation {
    pub rule_id: String,
    pub description: String,
    /// 1-based line of the first match (0 when the rule is not positional)
    pub line: usize,
}

impl fmt::Display for SafetyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "{} ({}, line {})", self.description, self.rule_id, self.line)
        } else {
            write!(f, "{} ({})", self.description, self.rule_id)
        }
    }
}

/// Checks candidate source against the configured denylist
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    rules: Vec<SafetyRule>,
    max_source_bytes: usize,
}

impl Default for SafetyValidator {
    fn default() -> Self {
        Self {
            rules: BASELINE_RULES.iter().chain(DEFAULT_RULES.iter()).cloned().collect(),
            max_source_bytes: SafetyConfig::default().max_source_bytes,
        }
    }
}

impl SafetyValidator {
    /// Build the rule set: baseline rules always, default rules minus disabled ids, then custom rules
    pub fn from_config(config: &SafetyConfig) -> Result<Self> {
        for id in &config.disabled_rules {
            if BASELINE_RULES.iter().any(|r| &r.id == id) {
                return Err(OuroborosError::Config(format!(
                    "safety rule '{}' guards memory safety and cannot be disabled",
                    id
                )));
            }
            if !DEFAULT_RULES.iter().any(|r| &r.id == id) {
                log::warn!("Ignoring unknown safety rule in disabled-rules: {}", id);
            }
        }

        let mut rules: Vec<SafetyRule> = BASELINE_RULES.iter().cloned().collect();
        rules.extend(
            DEFAULT_RULES
                .iter()
                .filter(|r| !config.disabled_rules.contains(&r.id))
                .cloned(),
        );
        for spec in &config.extra_rules {
            rules.push(SafetyRule::from_spec(spec)?);
        }

        Ok(Self {
            rules,
            max_source_bytes: config.max_source_bytes,
        })
    }

    /// Reject the candidate on the first rule it violates
    pub fn check(&self, source: &str) -> std::result::Result<(), SafetyViolation> {
        if source.len() > self.max_source_bytes {
            return Err(SafetyViolation {
                rule_id: SOURCE_TOO_LARGE.to_string(),
                description: format!(
                    "source is {} bytes, limit is {}",
                    source.len(),
                    self.max_source_bytes
                ),
                line: 0,
            });
        }

        for rule in &self.rules {
            if let Some(offset) = rule.find(source) {
                let line = source[..offset].matches('\n').count() + 1;
                log::debug!("Safety rule {} matched at line {}", rule.id, line);
                return Err(SafetyViolation {
                    rule_id: rule.id.clone(),
                    description: rule.description.clone(),
                    line,
                });
            }
        }

        Ok(())
    }

    pub fn is_safe(&self, source: &str) -> bool {
        self.check(source).is_ok()
    }

    /// Ids of the active rules, in evaluation order
    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id.as_str()).collect()
    }
}
