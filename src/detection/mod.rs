//! Need detection
//!
//! - PatternMatcher: regex classification of missing-capability phrasing and tool category
//! - NeedDetector: LLM refinement of pattern matches into a scored ToolNeed,
//!   with a heuristic fallback when the model is unavailable

pub mod category;
pub mod json;
pub mod need;
pub mod patterns;
pub mod refiner;

pub use category::ToolCategory;
pub use json::extract_json_object;
pub use need::{NeedOrigin, PREVIOUS_ATTEMPT_FAILED, ToolNeed, clamp_score, normalize_tool_name};
pub use patterns::PatternMatcher;
pub use refiner::{NeedDetector, RefinementResponse};
