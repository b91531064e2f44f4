//! Scripted LLM client for tests and offline runs

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{OuroborosError, Result};
use crate::llm::client::LlmClient;
use crate::llm::types::{CompletionRequest, CompletionResponse};

/// One scripted reply
#[derive(Debug, Clone)]
enum Scripted {
    Reply(CompletionResponse),
    Fail(String),
}

/// Mock client that replays queued responses in order and records every request.
///
/// When the queue is exhausted, calls fail with an `Llm` error.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    queue: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl MockLlmClient {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self {
            queue: Mutex::new(responses.into_iter().map(Scripted::Reply).collect()),
            ..Default::default()
        }
    }

    /// Client whose every call fails
    pub fn failing() -> Self {
        Self::default()
    }

    /// Queue a text reply
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Reply(CompletionResponse::text(text)));
        self
    }

    /// Queue an error reply
    pub fn with_error(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Fail(message.into()));
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push(&self, item: Scripted) {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).push_back(item);
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(Scripted::Reply(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(OuroborosError::Llm(message)),
            None => Err(OuroborosError::Llm("mock: no scripted response".to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
