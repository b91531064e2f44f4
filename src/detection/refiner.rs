//! Need Refiner - turns pattern matches into a scored ToolNeed.
//!
//! The model is asked to confirm and characterize the gap. Its unreliability
//! is kept internal: a failed call, a timeout or unparseable output all
//! degrade to a heuristic need, so callers only ever see `Some(need)` or
//! `None`.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, DetectionConfig};
use crate::error::{OuroborosError, Result};
use crate::llm::{CompletionRequest, LlmClient, complete_with_deadline};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{NEED_REFINEMENT, NEED_REFINEMENT_SYSTEM};
use crate::registry::ToolRegistry;

use super::category::ToolCategory;
use super::json::extract_json_object;
use super::need::{NeedOrigin, PREVIOUS_ATTEMPT_FAILED, ToolNeed, clamp_score, normalize_tool_name};
use super::patterns::PatternMatcher;

/// JSON object the model is asked to return
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RefinementResponse {
    /// Absent means the model gave no verdict; only an explicit `false` declines
    pub needs_new_tool: Option<bool>,
    pub tool_name: String,
    pub purpose: String,
    pub input_type: String,
    pub output_type: String,
    pub priority: Option<f64>,
    pub confidence: Option<f64>,
    pub reasoning: String,
}

/// Outcome of asking the model; failure is one of the success variants
#[derive(Debug)]
enum Refinement {
    /// The model confirmed a need
    Refined(RefinementResponse),
    /// The model judged that no new tool is needed
    Declined(String),
    /// The model could not be used; heuristics decide
    Fallback(String),
}

#[derive(Serialize)]
struct RefinementContext<'a> {
    input: &'a str,
    prior_failure: &'a str,
    category: &'a str,
    triggers: &'a [String],
    existing_tools: Vec<String>,
}

/// Detects tool needs from user input and an optional failed prior attempt
pub struct NeedDetector<L, R>
where
    L: LlmClient,
    R: ToolRegistry,
{
    llm: Arc<L>,
    registry: Arc<R>,
    matcher: PatternMatcher,
    renderer: PromptRenderer,
    detection: DetectionConfig,
    max_tokens: u32,
    timeout: Duration,
}

impl<L, R> NeedDetector<L, R>
where
    L: LlmClient,
    R: ToolRegistry,
{
    pub fn new(config: &Config, llm: Arc<L>, registry: Arc<R>) -> Result<Self> {
        Ok(Self {
            llm,
            registry,
            matcher: PatternMatcher::new(),
            renderer: PromptRenderer::with_builtin_templates()?,
            detection: config.detection.clone(),
            max_tokens: config.llm.max_tokens,
            timeout: Duration::from_millis(config.llm.timeout_ms),
        })
    }

    /// Detect whether `input` (and an optional failed prior attempt) reveals a missing tool.
    ///
    /// Returns `Ok(None)` when nothing fired or when the model declines. The
    /// only error is `Cancelled`, raised when `cancel` fires during the model call.
    pub async fn detect(
        &self,
        input: &str,
        prior_failed_attempt: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ToolNeed>> {
        let lowered = input.to_lowercase();
        let mut triggers: Vec<String> = self.matcher.triggers(&lowered).into_iter().map(String::from).collect();

        let prior_failed = !prior_failed_attempt.trim().is_empty();
        if prior_failed {
            triggers.push(PREVIOUS_ATTEMPT_FAILED.to_string());
        }

        if triggers.is_empty() {
            log::debug!("No tool need detected");
            return Ok(None);
        }

        let category = self.matcher.category(&lowered);
        log::info!("Tool need detected: category={}, triggers={:?}", category, triggers);

        let refinement = self.refine(input, prior_failed_attempt, category, &triggers, cancel).await?;

        let need = match refinement {
            Refinement::Refined(response) => self.need_from_response(response, input, category, triggers),
            Refinement::Declined(reasoning) => {
                log::info!("Model declined new tool: {}", reasoning);
                return Ok(None);
            }
            Refinement::Fallback(reason) => {
                log::warn!("Need refinement unavailable, using heuristic: {}", reason);
                ToolNeed::heuristic(
                    input,
                    category,
                    triggers,
                    self.detection.fallback_confidence,
                    self.detection.fallback_priority,
                )
            }
        };

        Ok(Some(need))
    }

    async fn refine(
        &self,
        input: &str,
        prior_failure: &str,
        category: ToolCategory,
        triggers: &[String],
        cancel: &CancellationToken,
    ) -> Result<Refinement> {
        let context = RefinementContext {
            input,
            prior_failure,
            category: category.as_str(),
            triggers,
            existing_tools: self.registry.tool_names(),
        };
        let prompt = match self.renderer.render_named(NEED_REFINEMENT, &context) {
            Ok(prompt) => prompt,
            Err(e) => return Ok(Refinement::Fallback(e.to_string())),
        };

        let request = CompletionRequest::new(NEED_REFINEMENT_SYSTEM)
            .with_user_message(prompt)
            .with_max_tokens(self.max_tokens);

        let response = match complete_with_deadline(self.llm.as_ref(), request, self.timeout, cancel).await {
            Ok(response) => response,
            Err(OuroborosError::Cancelled) => return Err(OuroborosError::Cancelled),
            Err(e) => return Ok(Refinement::Fallback(e.to_string())),
        };

        Ok(parse_refinement(&response.content))
    }

    fn need_from_response(
        &self,
        response: RefinementResponse,
        input: &str,
        category: ToolCategory,
        triggers: Vec<String>,
    ) -> ToolNeed {
        let name = normalize_tool_name(&response.tool_name).unwrap_or_else(|| category.fallback_tool_name());
        let purpose = non_empty_or(response.purpose, input);
        ToolNeed {
            name,
            purpose,
            input_type: non_empty_or(response.input_type, "string"),
            output_type: non_empty_or(response.output_type, "string"),
            triggers,
            priority: response
                .priority
                .map_or(self.detection.fallback_priority, |p| clamp_score(p, self.detection.fallback_priority)),
            confidence: response
                .confidence
                .map_or(self.detection.fallback_confidence, |c| clamp_score(c, self.detection.fallback_confidence)),
            reasoning: response.reasoning,
            category,
            origin: NeedOrigin::Model,
        }
    }
}

fn parse_refinement(text: &str) -> Refinement {
    let Some(value) = extract_json_object(text) else {
        return Refinement::Fallback("no JSON object in model response".to_string());
    };
    match serde_json::from_value::<RefinementResponse>(value) {
        Ok(response) => match response.needs_new_tool {
            Some(true) => Refinement::Refined(response),
            Some(false) => Refinement::Declined(response.reasoning),
            None => Refinement::Fallback("refinement has no needs_new_tool verdict".to_string()),
        },
        Err(e) => Refinement::Fallback(format!("malformed refinement: {}", e)),
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.trim().is_empty() { default.to_string() } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::registry::StaticRegistry;

    fn detector(llm: MockLlmClient) -> (NeedDetector<MockLlmClient, StaticRegistry>, Arc<MockLlmClient>) {
        let llm = Arc::new(llm);
        let registry = Arc::new(StaticRegistry::new(["csv_parser", "yaml_formatter"]));
        let detector = NeedDetector::new(&Config::default(), llm.clone(), registry).unwrap();
        (detector, llm)
    }

    const REFINED: &str = r#"I think a new tool is warranted.
{"needs_new_tool": true, "tool_name": "JSON Validator", "purpose": "Validate JSON documents",
 "input_type": "json_text", "output_type": "validation_report", "priority": 0.8,
 "confidence": 0.9, "reasoning": "no existing tool validates JSON"}"#;

    #[tokio::test]
    async fn test_no_trigger_no_failure_returns_none() {
        let (detector, llm) = detector(MockLlmClient::default().with_text(REFINED));
        let need = detector
            .detect("what time is it in tokyo", "", &CancellationToken::new())
            .await
            .unwrap();
        assert!(need.is_none());
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_refined_need_from_model() {
        let (detector, llm) = detector(MockLlmClient::default().with_text(REFINED));
        let need = detector
            .detect("I need a tool to validate JSON", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(need.name, "json_validator");
        assert_eq!(need.purpose, "Validate JSON documents");
        assert_eq!(need.input_type, "json_text");
        assert_eq!(need.output_type, "validation_report");
        assert_eq!(need.priority, 0.8);
        assert_eq!(need.confidence, 0.9);
        assert_eq!(need.triggers, vec!["need_tool"]);
        assert_eq!(need.category, ToolCategory::Validator);
        assert_eq!(need.origin, NeedOrigin::Model);

        let prompt = llm.requests()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("I need a tool to validate JSON"));
        assert!(prompt.contains("validator"));
        assert!(prompt.contains("- need_tool"));
        assert!(prompt.contains("- csv_parser"));
        assert!(prompt.contains("- yaml_formatter"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back_to_heuristic() {
        let (detector, _) = detector(MockLlmClient::failing());
        let need = detector
            .detect("I need a tool to validate JSON", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(need.name, "validator_tool");
        assert_eq!(need.purpose, "I need a tool to validate JSON");
        assert_eq!(need.category, ToolCategory::Validator);
        assert_eq!(need.confidence, 0.4);
        assert_eq!(need.priority, 0.5);
        assert_eq!(need.input_type, "string");
        assert!(need.is_heuristic());
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back() {
        let (detector, _) = detector(MockLlmClient::default().with_text("I'm not sure, maybe?"));
        let need = detector
            .detect("we need a tool to convert xml", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(need.name, "converter_tool");
        assert!(need.is_heuristic());
    }

    #[tokio::test]
    async fn test_wrongly_typed_fields_fall_back() {
        let (detector, _) = detector(MockLlmClient::default().with_text(r#"{"needs_new_tool": "yes", "priority": "high"}"#));
        let need = detector
            .detect("i need a tool to parse logs", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(need.name, "parser_tool");
        assert!(need.is_heuristic());
    }

    #[tokio::test]
    async fn test_model_declines() {
        let declined = r#"{"needs_new_tool": false, "reasoning": "csv_parser already does this"}"#;
        let (detector, _) = detector(MockLlmClient::default().with_text(declined));
        let need = detector
            .detect("i need a tool to parse csv", "", &CancellationToken::new())
            .await
            .unwrap();
        assert!(need.is_none());
    }

    #[tokio::test]
    async fn test_missing_verdict_falls_back() {
        let reply = r#"{"tool_name": "json_validator", "purpose": "Validate JSON", "confidence": 0.9}"#;
        let (detector, _) = detector(MockLlmClient::default().with_text(reply));
        let need = detector
            .detect("I need a tool to validate JSON", "", &CancellationToken::new())
            .await
            .unwrap()
            .expect("a fired trigger yields a need");
        assert!(need.is_heuristic());
        assert_eq!(need.category, ToolCategory::Validator);
        assert_eq!(need.confidence, 0.4);
    }

    #[tokio::test]
    async fn test_prior_failure_forces_detection() {
        let (detector, llm) = detector(MockLlmClient::failing());
        let need = detector
            .detect("run the usual report", "tool 'report' not found", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(need.triggers, vec![PREVIOUS_ATTEMPT_FAILED]);
        assert_eq!(need.category, ToolCategory::Generic);
        assert!(need.is_heuristic());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prior_failure_appended_after_pattern_triggers() {
        let (detector, llm) = detector(MockLlmClient::failing());
        let need = detector
            .detect("i can't validate this", "validation tool crashed", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(need.triggers, vec!["cannot", PREVIOUS_ATTEMPT_FAILED]);

        let prompt = llm.requests()[0].last_user_message().unwrap().to_string();
        assert!(prompt.contains("validation tool crashed"));
    }

    #[tokio::test]
    async fn test_whitespace_prior_failure_ignored() {
        let (detector, _) = detector(MockLlmClient::failing());
        let need = detector
            .detect("hello there", "   ", &CancellationToken::new())
            .await
            .unwrap();
        assert!(need.is_none());
    }

    #[tokio::test]
    async fn test_scores_clamped_and_name_defaulted() {
        let response = r#"{"needs_new_tool": true, "tool_name": "", "priority": 3.5, "confidence": -1}"#;
        let (detector, _) = detector(MockLlmClient::default().with_text(response));
        let need = detector
            .detect("i need a tool to format sql", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(need.name, "formatter_tool");
        assert_eq!(need.purpose, "i need a tool to format sql");
        assert_eq!(need.priority, 1.0);
        assert_eq!(need.confidence, 0.0);
        assert_eq!(need.origin, NeedOrigin::Model);
    }

    #[tokio::test]
    async fn test_missing_scores_use_fallback_values() {
        let response = r#"{"needs_new_tool": true, "tool_name": "sql_formatter"}"#;
        let (detector, _) = detector(MockLlmClient::default().with_text(response));
        let need = detector
            .detect("i need a tool to format sql", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(need.name, "sql_formatter");
        assert_eq!(need.priority, 0.5);
        assert_eq!(need.confidence, 0.4);
    }

    #[tokio::test]
    async fn test_slow_model_falls_back_on_timeout() {
        let llm = Arc::new(MockLlmClient::default().with_text(REFINED).with_delay(Duration::from_secs(5)));
        let mut config = Config::default();
        config.llm.timeout_ms = 20;
        let detector = NeedDetector::new(&config, llm, Arc::new(StaticRegistry::default())).unwrap();

        let need = detector
            .detect("i need a tool to validate json", "", &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert!(need.is_heuristic());
    }

    #[tokio::test]
    async fn test_cancellation_is_reported() {
        let (detector, _) = detector(MockLlmClient::default().with_text(REFINED).with_delay(Duration::from_secs(5)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = detector.detect("i need a tool to validate json", "", &cancel).await;
        assert!(matches!(result, Err(OuroborosError::Cancelled)));
    }

    #[test]
    fn test_parse_refinement_variants() {
        assert!(matches!(parse_refinement(REFINED), Refinement::Refined(_)));
        assert!(matches!(
            parse_refinement(r#"{"needs_new_tool": false}"#),
            Refinement::Declined(_)
        ));
        assert!(matches!(parse_refinement("nothing"), Refinement::Fallback(_)));
        assert!(matches!(
            parse_refinement(r#"{"tool_name": "x"}"#),
            Refinement::Fallback(_)
        ));
    }
}
