//! ToolSynthesizer - asks the model for source implementing a need and feeds
//! it through the loop, re-prompting with compiler diagnostics on failure.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::compiler::Toolchain;
use crate::detection::ToolNeed;
use crate::error::Result;
use crate::llm::{CompletionRequest, LlmClient, complete_with_deadline};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{TOOL_SYNTHESIS, TOOL_SYNTHESIS_SYSTEM};

use super::outcome::{FailureKind, GenerationOutcome, GenerationRequest};
use super::pipeline::Ouroboros;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\r?\n(.*?)```").expect("fenced block regex compiles"));

/// Source from the first fenced code block, or the whole reply when there is none
pub fn extract_source(text: &str) -> String {
    FENCED_BLOCK
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str())
        .trim()
        .to_string()
}

/// Language name shown to the model for a source extension
fn language_for(extension: &str) -> &str {
    match extension {
        "rs" => "rust",
        "go" => "go",
        "c" => "c",
        other => other,
    }
}

#[derive(Serialize)]
struct SynthesisContext<'a> {
    name: &'a str,
    purpose: &'a str,
    input_type: &'a str,
    output_type: &'a str,
    reasoning: &'a str,
    language: &'a str,
    previous_source: Option<&'a str>,
    diagnostics: Option<&'a str>,
}

pub struct ToolSynthesizer<L: LlmClient, T: Toolchain> {
    llm: Arc<L>,
    ouroboros: Arc<Ouroboros<T>>,
    renderer: PromptRenderer,
    max_attempts: u32,
    max_tokens: u32,
    timeout: Duration,
    dry_run: Option<bool>,
}

impl<L: LlmClient, T: Toolchain> ToolSynthesizer<L, T> {
    pub fn new(llm: Arc<L>, ouroboros: Arc<Ouroboros<T>>) -> Result<Self> {
        let config = ouroboros.config();
        Ok(Self {
            max_attempts: config.synthesis.max_attempts,
            max_tokens: config.llm.max_tokens,
            timeout: Duration::from_millis(config.llm.timeout_ms),
            renderer: PromptRenderer::with_builtin_templates()?,
            dry_run: None,
            llm,
            ouroboros,
        })
    }

    /// Override the configured dry-run default for every submitted candidate
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    pub fn ouroboros(&self) -> &Ouroboros<T> {
        &self.ouroboros
    }

    /// Generate, validate and compile a tool for `need`.
    ///
    /// Only compilation failures are retried; a safety rejection or an
    /// infrastructure failure ends the run. Model errors surface as `Err`
    /// and, because no candidate reached the loop, leave the stats alone.
    pub async fn synthesize(&self, need: &ToolNeed, cancel: &CancellationToken) -> Result<GenerationOutcome> {
        let language = language_for(&self.ouroboros.config().tools.source_extension);
        let mut previous: Option<(String, String)> = None;
        let mut attempt = 1;

        loop {
            log::info!("Synthesizing {} (attempt {}/{})", need.name, attempt, self.max_attempts);
            let context = SynthesisContext {
                name: &need.name,
                purpose: &need.purpose,
                input_type: &need.input_type,
                output_type: &need.output_type,
                reasoning: &need.reasoning,
                language,
                previous_source: previous.as_ref().map(|(source, _)| source.as_str()),
                diagnostics: previous.as_ref().map(|(_, diagnostics)| diagnostics.as_str()),
            };
            let prompt = self.renderer.render_named(TOOL_SYNTHESIS, &context)?;
            let request = CompletionRequest::new(TOOL_SYNTHESIS_SYSTEM)
                .with_user_message(prompt)
                .with_max_tokens(self.max_tokens);

            let response = complete_with_deadline(self.llm.as_ref(), request, self.timeout, cancel).await?;
            let source = extract_source(&response.content);

            let mut request = GenerationRequest::from_need(need, source.clone());
            request.dry_run = self.dry_run;
            let outcome = self.ouroboros.generate_tool_from_code(request, cancel).await?;

            let retryable = outcome.failure == Some(FailureKind::Compilation);
            if !retryable || attempt >= self.max_attempts {
                if !outcome.success {
                    log::warn!("Synthesis of {} stopped after {} attempt(s): {}", need.name, attempt, outcome.error_message);
                }
                return Ok(outcome);
            }

            previous = Some((source, outcome.diagnostics().to_string()));
            attempt += 1;
        }
    }
}
