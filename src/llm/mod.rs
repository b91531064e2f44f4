//! LLM Client Layer
//!
//! This module provides:
//! - Message types for LLM communication
//! - LlmClient trait for API abstraction
//! - AnthropicClient implementation
//! - UnavailableClient for offline runs
//! - MockLlmClient for tests

pub mod anthropic;
pub mod client;
pub mod mock;
pub mod types;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use client::{LlmClient, UnavailableClient, complete_with_deadline};
pub use mock::MockLlmClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, Usage};
