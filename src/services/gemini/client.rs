use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::context::CallContext;
use super::errors::{classify, GeminiError};
use super::extract::{extract_text, ExtractionMode};
use super::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, ImageConfig, Part,
    SafetySetting,
};
use super::offload::{CleanupGuard, OffloadConfig, Offloader};
use super::retry::{RetryHandler, RetryPolicy};
use super::transport::{GeminiTransport, HttpTransport, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::env::apis as env_vars;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TOP_P: f32 = 0.95;
pub const DEFAULT_CANDIDATE_COUNT: u32 = 1;

const MISSING_API_KEY: &str = "Gemini API key is required (set GEMINI_API_KEY or GOOGLE_API_KEY)";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    /// `None` uses the default of 3; `Some(0)` allows a single attempt only.
    pub max_retries: Option<u32>,
    pub initial_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub request_timeout: Duration,
    pub offload: OffloadConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: None,
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            offload: OffloadConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Builds a config from `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self, GeminiError> {
        let api_key = Self::api_key_from(|name| std::env::var(name).ok())
            .ok_or_else(|| GeminiError::configuration(MISSING_API_KEY))?;
        Ok(Self::new(api_key))
    }

    pub fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        [env_vars::GEMINI_API_KEY, env_vars::GOOGLE_API_KEY]
            .into_iter()
            .filter_map(|name| lookup(name))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_offload(mut self, offload: OffloadConfig) -> Self {
        self.offload = offload;
        self
    }

    pub fn validate(&self) -> Result<(), GeminiError> {
        if self.api_key.trim().is_empty() {
            return Err(GeminiError::configuration(MISSING_API_KEY));
        }

        if self.base_url.is_empty() {
            return Err(GeminiError::configuration("Base URL cannot be empty"));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(GeminiError::configuration(format!(
                    "Temperature must be between 0.0 and 1.0, got {temperature}"
                )));
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(max_retries) = self.max_retries {
            policy.max_retries = max_retries;
        }
        if let Some(delay) = self.initial_delay {
            policy.initial_interval = delay;
        }
        if let Some(delay) = self.max_delay {
            policy.max_interval = delay;
        }
        policy
    }
}

/// Per-call knobs for multimodal generation. Unset values use client defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub candidate_count: Option<u32>,
    pub seed: Option<i32>,
    pub aspect_ratio: Option<String>,
    pub safety_settings: Vec<SafetySetting>,
    pub system_prompt: Option<String>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_candidate_count(mut self, count: u32) -> Self {
        self.candidate_count = Some(count);
        self
    }

    pub fn with_seed(mut self, seed: i32) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_aspect_ratio(mut self, ratio: impl Into<String>) -> Self {
        self.aspect_ratio = Some(ratio.into());
        self
    }

    pub fn with_safety_setting(mut self, setting: SafetySetting) -> Self {
        self.safety_settings.push(setting);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn validate(&self) -> Result<(), GeminiError> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(GeminiError::invalid_input(format!(
                    "temperature must be between 0.0 and 1.0, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub raw_response: GenerateContentResponse,
}

/// Text generation capability consumed by the runner and the CLI.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(
        &self,
        ctx: &CallContext,
        prompt: &str,
        model: &str,
    ) -> Result<GenerationResult, GeminiError>;

    async fn generate_with_parts(
        &self,
        ctx: &CallContext,
        model: &str,
        parts: &[Part],
        options: &GenerationOptions,
    ) -> Result<GenerationResult, GeminiError>;
}

fn should_retry_call(err: &GeminiError) -> bool {
    !err.is_response_rejected() && classify(err).should_retry()
}

pub struct GeminiClient<T: GeminiTransport + ?Sized + 'static = HttpTransport> {
    transport: Arc<T>,
    temperature: f32,
    retry_policy: RetryPolicy,
    offloader: Offloader<T>,
}

impl<T: GeminiTransport + ?Sized + 'static> Clone for GeminiClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            temperature: self.temperature,
            retry_policy: self.retry_policy.clone(),
            offloader: self.offloader.clone(),
        }
    }
}

impl GeminiClient<HttpTransport> {
    pub fn new(config: ClientConfig) -> Result<Self, GeminiError> {
        config.validate()?;
        let transport = HttpTransport::new(
            config.api_key.clone(),
            config.base_url.clone(),
            config.request_timeout,
        )?;
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn from_env() -> Result<Self, GeminiError> {
        Self::new(ClientConfig::from_env()?)
    }
}

impl<T: GeminiTransport + ?Sized + 'static> GeminiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: Arc<T>) -> Result<Self, GeminiError> {
        config.validate()?;

        let retry_policy = config.retry_policy();
        let offloader = Offloader::new(Arc::clone(&transport), config.offload.clone());

        tracing::debug!(
            max_retries = retry_policy.max_retries,
            initial_delay_ms = retry_policy.initial_interval.as_millis() as u64,
            "Gemini client configured"
        );

        Ok(Self {
            transport,
            temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            retry_policy,
            offloader,
        })
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Sends a single text prompt and returns the first text part of the answer.
    pub async fn generate_content(
        &self,
        ctx: &CallContext,
        prompt: &str,
        model: &str,
    ) -> Result<GenerationResult, GeminiError> {
        if prompt.is_empty() {
            return Err(GeminiError::invalid_input("prompt must not be empty"));
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(self.temperature),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.call_with_retry(
            ctx,
            "generate_content",
            model,
            &request,
            ExtractionMode::TextOnly,
        )
        .await
    }

    /// Sends an ordered list of parts, offloading oversized inline payloads first.
    ///
    /// Files uploaded for this call are deleted before it returns.
    pub async fn generate_with_parts(
        &self,
        ctx: &CallContext,
        model: &str,
        parts: &[Part],
        options: &GenerationOptions,
    ) -> Result<GenerationResult, GeminiError> {
        if parts.is_empty() {
            return Err(GeminiError::invalid_input("parts must not be empty"));
        }
        options.validate()?;

        let guard = CleanupGuard::new(self.offloader.clone());

        let result = async {
            let parts = self.offloader.offload(ctx, parts, guard.ledger()).await?;
            let request = self.build_parts_request(parts, options);
            self.call_with_retry(
                ctx,
                "generate_with_parts",
                model,
                &request,
                ExtractionMode::Multimodal,
            )
            .await
        }
        .await;

        guard.finish().await;
        result
    }

    fn build_parts_request(
        &self,
        parts: Vec<Part>,
        options: &GenerationOptions,
    ) -> GenerateContentRequest {
        let image_config = options
            .aspect_ratio
            .as_deref()
            .filter(|ratio| !ratio.is_empty())
            .map(|ratio| ImageConfig {
                aspect_ratio: ratio.to_string(),
            });

        let system_instruction = options
            .system_prompt
            .as_deref()
            .filter(|prompt| !prompt.is_empty())
            .map(|prompt| Content {
                role: None,
                parts: vec![Part::text(prompt)],
            });

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: Some(options.temperature.unwrap_or(self.temperature)),
                top_p: Some(options.top_p.unwrap_or(DEFAULT_TOP_P)),
                candidate_count: Some(options.candidate_count.unwrap_or(DEFAULT_CANDIDATE_COUNT)),
                seed: options.seed,
                image_config,
            }),
            safety_settings: options.safety_settings.clone(),
        }
    }

    async fn call_with_retry(
        &self,
        ctx: &CallContext,
        operation: &'static str,
        model: &str,
        request: &GenerateContentRequest,
        mode: ExtractionMode,
    ) -> Result<GenerationResult, GeminiError> {
        let label = format!("Gemini API call to {model}");
        let started = Instant::now();
        let mut handler = RetryHandler::new(self.retry_policy.clone());
        let transport = self.transport.as_ref();

        let result = handler
            .retry(
                ctx,
                &label,
                move || async move {
                    let response = ctx.run(transport.generate_content(model, request)).await?;
                    let text = extract_text(&response, mode)?;
                    Ok(GenerationResult {
                        text,
                        raw_response: response,
                    })
                },
                should_retry_call,
            )
            .await;

        tracing::info!(
            operation,
            model,
            attempts = handler.attempts(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            success = result.is_ok(),
            "Gemini call finished"
        );

        result
    }
}

#[async_trait]
impl<T: GeminiTransport + ?Sized + 'static> GenerativeModel for GeminiClient<T> {
    async fn generate_content(
        &self,
        ctx: &CallContext,
        prompt: &str,
        model: &str,
    ) -> Result<GenerationResult, GeminiError> {
        GeminiClient::generate_content(self, ctx, prompt, model).await
    }

    async fn generate_with_parts(
        &self,
        ctx: &CallContext,
        model: &str,
        parts: &[Part],
        options: &GenerationOptions,
    ) -> Result<GenerationResult, GeminiError> {
        GeminiClient::generate_with_parts(self, ctx, model, parts, options).await
    }
}
