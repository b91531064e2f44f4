//! Completion capability consumed by need refinement and code synthesis

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{OuroborosError, Result};
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// Stateless LLM client - each call is independent (fresh context)
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Model identifier used for requests
    fn model(&self) -> &str;
}

#[async_trait]
impl<L: LlmClient + ?Sized> LlmClient for Arc<L> {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        (**self).complete(request).await
    }

    fn model(&self) -> &str {
        (**self).model()
    }
}

/// Client used when no model is configured; every call fails.
///
/// Need detection degrades to heuristics against it.
#[derive(Debug, Clone)]
pub struct UnavailableClient {
    reason: String,
}

impl UnavailableClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl LlmClient for UnavailableClient {
    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(OuroborosError::Llm(format!("language model unavailable: {}", self.reason)))
    }

    fn model(&self) -> &str {
        "unavailable"
    }
}

/// Run a completion bounded by a deadline and the caller's cancellation token.
///
/// Cancellation wins over both completion and timeout; a timeout surfaces as
/// an `Llm` error so callers can treat it like any other call failure.
pub async fn complete_with_deadline<L: LlmClient + ?Sized>(
    llm: &L,
    request: CompletionRequest,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<CompletionResponse> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OuroborosError::Cancelled),
        result = tokio::time::timeout(timeout, llm.complete(request)) => match result {
            Ok(response) => response,
            Err(_) => Err(OuroborosError::Llm(format!(
                "completion timed out after {}ms",
                timeout.as_millis()
            ))),
        },
    }
}
