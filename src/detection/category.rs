//! Tool categories recognized by the pattern matcher

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of tool categories.
///
/// Matching walks [`ToolCategory::ORDERED`] front to back, so the position in
/// that list is the tie-breaker when several categories match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    Validator,
    Converter,
    Parser,
    Analyzer,
    Formatter,
    Calculator,
    Generator,
    Generic,
}

impl ToolCategory {
    /// Categories with match rules, in evaluation order. `Generic` is the fallback.
    pub const ORDERED: [ToolCategory; 7] = [
        ToolCategory::Validator,
        ToolCategory::Converter,
        ToolCategory::Parser,
        ToolCategory::Analyzer,
        ToolCategory::Formatter,
        ToolCategory::Calculator,
        ToolCategory::Generator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Validator => "validator",
            ToolCategory::Converter => "converter",
            ToolCategory::Parser => "parser",
            ToolCategory::Analyzer => "analyzer",
            ToolCategory::Formatter => "formatter",
            ToolCategory::Calculator => "calculator",
            ToolCategory::Generator => "generator",
            ToolCategory::Generic => "generic",
        }
    }

    /// Name given to a heuristic need of this category
    pub fn fallback_tool_name(&self) -> String {
        format!("{}_tool", self.as_str())
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_excludes_generic() {
        assert!(!ToolCategory::ORDERED.contains(&ToolCategory::Generic));
        assert_eq!(ToolCategory::ORDERED[0], ToolCategory::Validator);
    }

    #[test]
    fn test_evaluation_order() {
        let names: Vec<&str> = ToolCategory::ORDERED.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            ["validator", "converter", "parser", "analyzer", "formatter", "calculator", "generator"]
        );
    }

    #[test]
    fn test_display_and_serde_agree() {
        for category in ToolCategory::ORDERED.iter().chain([ToolCategory::Generic].iter()) {
            let json = serde_json::to_string(category).unwrap();
            assert_eq!(json, format!("\"{}\"", category));
        }
    }

    #[test]
    fn test_fallback_tool_name() {
        assert_eq!(ToolCategory::Validator.fallback_tool_name(), "validator_tool");
        assert_eq!(ToolCategory::Generic.fallback_tool_name(), "generic_tool");
    }
}
