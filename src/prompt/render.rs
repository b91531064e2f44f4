//! Prompt Renderer - Render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;

use crate::error::{OuroborosError, Result};

use super::templates::{NEED_REFINEMENT, NEED_REFINEMENT_TEMPLATE, TOOL_SYNTHESIS, TOOL_SYNTHESIS_TEMPLATE};

/// Renders prompt templates using Handlebars templating
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Create a renderer without any registered templates
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text; never HTML-escape user input or source code
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Create a renderer with the built-in refinement and synthesis templates
    pub fn with_builtin_templates() -> Result<Self> {
        let mut renderer = Self::new();
        renderer.register_template(NEED_REFINEMENT, NEED_REFINEMENT_TEMPLATE)?;
        renderer.register_template(TOOL_SYNTHESIS, TOOL_SYNTHESIS_TEMPLATE)?;
        Ok(renderer)
    }

    /// Render a template string with any serializable context
    pub fn render_with<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| OuroborosError::Template(format!("Failed to render template: {}", e)))
    }

    /// Register a named template for later use
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| OuroborosError::Template(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a previously registered template
    pub fn render_named<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| OuroborosError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Check if a named template is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}
