//! Pattern Matcher - regex classification of natural-language input.
//!
//! Answers two independent questions about lower-cased text: does it read
//! like a request for a capability the agent lacks, and which tool category
//! fits best. Both are pure functions of the input.

use std::sync::LazyLock;

use regex::Regex;

use super::category::ToolCategory;

/// A named need-detection rule
struct NeedRule {
    id: &'static str,
    regex: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern compiles")
}

static NEED_RULES: LazyLock<Vec<NeedRule>> = LazyLock::new(|| {
    [
        (
            "need_tool",
            r"\b(?:i|we)\s+(?:need|want|require)\s+(?:a|an|some)\s+(?:new\s+)?(?:tool|function|utility|way|script)\b",
        ),
        ("no_tool_for", r"\bno\s+(?:tool|function|way|utility)\s+(?:to|for|that)\b"),
        ("cannot", r"\b(?:can't|cannot|can not|unable to|not able to)\b"),
        (
            "missing_capability",
            r"\b(?:missing|lacks?|lacking)\s+(?:a\s+|the\s+)?(?:tool|capability|function|feature)\b",
        ),
        ("wish", r"\bi\s+wish\s+(?:i|you|we)\s+(?:could|had)\b"),
        ("is_there_a_tool", r"\bis\s+there\s+(?:a|an|any)\s+(?:tool|way|function)\b"),
        (
            "create_tool",
            r"\b(?:create|build|make|write)\s+(?:me\s+)?(?:a|an)\s+(?:new\s+)?(?:tool|utility|function)\b",
        ),
        ("not_supported", r"\b(?:not|isn't|is not)\s+supported\b|\bno\s+support\s+for\b"),
    ]
    .into_iter()
    .map(|(id, pattern)| NeedRule {
        id,
        regex: compile(pattern),
    })
    .collect()
});

static CATEGORY_RULES: LazyLock<Vec<(ToolCategory, Vec<Regex>)>> = LazyLock::new(|| {
    ToolCategory::ORDERED
        .iter()
        .map(|category| {
            let patterns: &[&str] = match category {
                ToolCategory::Validator => &[
                    r"\bvalidat(?:e|es|ing|ion|or)\b",
                    r"\bverif(?:y|ies|ying|ication)\b",
                    r"\bcheck(?:s|ing)?\s+(?:if|whether|that)\b",
                    r"\blint(?:s|ing|er)?\b",
                ],
                ToolCategory::Converter => &[
                    r"\bconver(?:t|ts|ting|sion|ter)\b",
                    r"\btransform(?:s|ing|ation)?\b",
                    r"\b(?:from|into)\s+(?:json|yaml|csv|xml|toml|markdown|html)\b",
                ],
                ToolCategory::Parser => &[
                    r"\bpars(?:e|es|ing|er)\b",
                    r"\bextract(?:s|ing|ion)?\b",
                    r"\btokeni[sz](?:e|es|ing|er)\b",
                ],
                ToolCategory::Analyzer => &[
                    r"\banaly[sz](?:e|es|is|ing|er)\b",
                    r"\binspect(?:s|ing|ion)?\b",
                    r"\bstatistics?\b",
                    r"\bsummari[sz](?:e|es|ing)\b",
                ],
                ToolCategory::Formatter => &[
                    r"\bformat(?:s|ting|ter)?\b",
                    r"\bpretty[- ]?print(?:ing)?\b",
                    r"\bbeautif(?:y|ies|ying|ier)\b",
                ],
                ToolCategory::Calculator => &[
                    r"\bcalculat(?:e|es|ing|ion|or)\b",
                    r"\bcompute(?:s)?\b",
                    r"\b(?:sum|average|mean|median)\s+of\b",
                ],
                ToolCategory::Generator => &[r"\bgenerat(?:e|es|ing|or)\b", r"\brandom\b", r"\buuids?\b"],
                ToolCategory::Generic => &[],
            };
            (*category, patterns.iter().map(|p| compile(p)).collect())
        })
        .collect()
});

/// Stateless matcher over lower-cased input
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Ids of every need rule that fires, in rule order
    pub fn triggers(&self, text: &str) -> Vec<&'static str> {
        let text = text.to_lowercase();
        let fired: Vec<&'static str> = NEED_RULES
            .iter()
            .filter(|rule| rule.regex.is_match(&text))
            .map(|rule| rule.id)
            .collect();
        log::trace!("need rules fired: {:?}", fired);
        fired
    }

    /// Whether any "missing capability" phrasing is present
    pub fn detects_need(&self, text: &str) -> bool {
        !self.triggers(text).is_empty()
    }

    /// First category, in enumeration order, whose rules match; `Generic` otherwise
    pub fn category(&self, text: &str) -> ToolCategory {
        let text = text.to_lowercase();
        let category = CATEGORY_RULES
            .iter()
            .find(|(_, rules)| rules.iter().any(|r| r.is_match(&text)))
            .map(|(category, _)| *category)
            .unwrap_or(ToolCategory::Generic);
        log::trace!("category for input: {}", category);
        category
    }
}
