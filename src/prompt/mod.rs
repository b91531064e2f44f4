//! Prompt System - Handlebars rendering of the built-in prompts

mod render;
pub mod templates;

pub use render::PromptRenderer;
