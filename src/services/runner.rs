use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PromptError, PromptTemplates};
use crate::services::gemini::{
    CallContext, GenerationOptions, GenerationResult, GenerativeModel, Part,
};

/// Turns user input into a prompt and sends it to the model under a timeout.
pub struct Runner {
    client: Arc<dyn GenerativeModel>,
    templates: PromptTemplates,
    model_name: String,
    timeout: Duration,
}

impl Runner {
    pub fn new(
        client: Arc<dyn GenerativeModel>,
        templates: PromptTemplates,
        model_name: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            templates,
            model_name: model_name.into(),
            timeout,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Expands `input` through the template registered for `mode`.
    pub fn build_full_prompt(&self, input: &str, mode: &str) -> Result<String, PromptError> {
        self.templates.build(mode, input)
    }

    /// Builds the final prompt and returns the generated text.
    ///
    /// Without a mode the input is sent as-is.
    pub async fn run(&self, ctx: &CallContext, input: &str, mode: Option<&str>) -> Result<String> {
        let prompt = match mode.filter(|m| !m.is_empty()) {
            Some(mode) => {
                let prompt = self
                    .build_full_prompt(input, mode)
                    .with_context(|| format!("Failed to build prompt (mode: {mode})"))?;
                tracing::debug!(mode, "Built prompt from template");
                prompt
            }
            None => {
                tracing::debug!("Using raw input as prompt");
                input.to_string()
            }
        };

        tracing::info!(
            model = %self.model_name,
            mode = mode.unwrap_or("generic"),
            timeout_secs = self.timeout.as_secs(),
            "Sending generation request"
        );

        let call_ctx = ctx.child_with_timeout(self.timeout);
        let result = self
            .client
            .generate_content(&call_ctx, &prompt, &self.model_name)
            .await
            .context("Gemini request failed")?;

        Ok(result.text)
    }

    /// Sends `input` followed by `attachments` as one multimodal request.
    pub async fn run_with_parts(
        &self,
        ctx: &CallContext,
        input: &str,
        attachments: Vec<Part>,
        options: &GenerationOptions,
    ) -> Result<GenerationResult> {
        let mut parts = Vec::with_capacity(attachments.len() + 1);
        parts.push(Part::text(input));
        parts.extend(attachments);

        tracing::info!(
            model = %self.model_name,
            parts = parts.len(),
            timeout_secs = self.timeout.as_secs(),
            "Sending multimodal generation request"
        );

        let call_ctx = ctx.child_with_timeout(self.timeout);
        self.client
            .generate_with_parts(&call_ctx, &self.model_name, &parts, options)
            .await
            .context("Gemini request failed")
    }
}
