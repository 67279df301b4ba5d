//! The LLM client: prompt in, completion out.
//!
//! [`LlmClient`] is the only capability the pipeline needs from a model.
//! [`BackendClient`] is the stock implementation. It carries the HTTP
//! client, a provider [`Backend`], the model name, sampling config, transport
//! retry policy, cancellation flag and event handler, and is built once and
//! shared (behind an `Arc`) by every request.

use crate::backend::{self, Backend, BackoffConfig, LlmRequest, OllamaBackend};
#[cfg(feature = "openai")]
use crate::backend::OpenAiBackend;
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::parsing;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Sampling configuration for LLM requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Enable extended thinking mode (DeepSeek R1 style `<think>` tags).
    pub thinking: bool,

    /// Custom options merged into the Ollama options object.
    pub options: Option<Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            thinking: false,
            options: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.thinking = enabled;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Stateless prompt-to-completion capability.
///
/// Implementations own their transport concerns (auth, retry, rate limits).
/// They must be safe for concurrent use; the map phase calls `invoke` from
/// several futures at once. A failure should be reported as an error, never
/// as a placeholder completion.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one prompt and return the cleaned completion text.
    async fn invoke(&self, prompt: &str) -> Result<String>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// [`LlmClient`] backed by a provider [`Backend`].
///
/// # Example
///
/// ```
/// use doc_processor::client::BackendClient;
/// use doc_processor::backend::BackoffConfig;
///
/// let client = BackendClient::builder("http://localhost:11434")
///     .model("llama3.2:3b")
///     .backoff(BackoffConfig::interactive())
///     .build()
///     .unwrap();
/// ```
pub struct BackendClient {
    client: Client,
    base_url: String,
    backend: Arc<dyn Backend>,
    model: String,
    system_prompt: Option<String>,
    config: LlmConfig,
    backoff: BackoffConfig,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl BackendClient {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> BackendClientBuilder {
        BackendClientBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            model: None,
            system_prompt: None,
            config: LlmConfig::default(),
            backoff: None,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn build_request(&self, prompt: &str) -> LlmRequest {
        LlmRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            prompt: prompt.to_string(),
            config: self.config.clone(),
        }
    }
}

#[async_trait]
impl LlmClient for BackendClient {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let request = self.build_request(prompt);
        let name = self.backend.name().to_string();
        let event_handler = self.event_handler.clone();
        let mut on_retry = |attempt: u32, delay: Duration, reason: &str| {
            tracing::warn!(backend = %name, attempt, delay_ms = delay.as_millis() as u64, %reason, "retrying LLM call");
            emit(
                &event_handler,
                Event::TransportRetry {
                    name: name.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };

        let response = backend::with_backoff(
            &self.backend,
            &self.client,
            &self.base_url,
            &request,
            &self.backoff,
            self.cancellation.as_deref(),
            Some(&mut on_retry),
        )
        .await?;

        let (prompt_tokens, completion_tokens) = response.token_counts();
        tracing::debug!(
            backend = self.backend.name(),
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            completion_chars = response.text.chars().count(),
            prompt_tokens,
            completion_tokens,
            "LLM call complete"
        );

        parsing::clean_completion(&response.text).ok_or_else(|| PipelineError::Upstream {
            call: "invoke".into(),
            message: format!("model '{}' returned an empty completion", self.model),
        })
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("backoff", &self.backoff)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`BackendClient`].
pub struct BackendClientBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    model: Option<String>,
    system_prompt: Option<String>,
    config: LlmConfig,
    backoff: Option<BackoffConfig>,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl BackendClientBuilder {
    /// Set the HTTP client. If not set, one is built with the configured timeout.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the LLM backend. Default: [`OllamaBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use the OpenAI-compatible backend with bearer authentication.
    #[cfg(feature = "openai")]
    pub fn openai_with_key(mut self, api_key: impl Into<String>) -> Self {
        self.backend = Some(Arc::new(OpenAiBackend::new().with_api_key(api_key)));
        self
    }

    /// Model identifier. Default: `llama3.2:3b`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// System prompt sent with every call.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sampling configuration.
    pub fn config(mut self, config: LlmConfig) -> Self {
        self.config = config;
        self
    }

    /// Transport retry configuration. Default: [`BackoffConfig::none()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler used for transport retry events.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Request timeout for the built HTTP client. Default: 120 seconds.
    ///
    /// Ignored when a custom `Client` is supplied via [`client`](Self::client).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<BackendClient> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeout.unwrap_or(Duration::from_secs(120)))
                .build()?,
        };
        Ok(BackendClient {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(OllamaBackend)),
            model: self.model.unwrap_or_else(|| "llama3.2:3b".to_string()),
            system_prompt: self.system_prompt,
            config: self.config,
            backoff: self.backoff.unwrap_or_default(),
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        })
    }
}

/// Strip known provider path suffixes from a base URL, since backends
/// append their own paths.
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in ["/v1/chat/completions", "/v1", "/api/generate", "/api/chat", "/api"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    fn mock_client(mock: Arc<MockBackend>) -> BackendClient {
        BackendClient::builder("http://unused")
            .backend(mock)
            .build()
            .unwrap()
    }

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("https://api.openai.com/v1/"), "https://api.openai.com");
        assert_eq!(normalize_base_url("http://localhost:11434/api"), "http://localhost:11434");
        assert_eq!(
            normalize_base_url("https://api.openai.com/v1/chat/completions"),
            "https://api.openai.com"
        );
        assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_invoke_strips_thinking() {
        let mock = Arc::new(MockBackend::fixed("<think>hmm</think>\n  Réécrit.  "));
        let client = mock_client(mock.clone());
        let out = client.invoke("Rewrite: x").await.unwrap();
        assert_eq!(out, "Réécrit.");
        assert_eq!(mock.prompts(), vec!["Rewrite: x"]);
    }

    #[tokio::test]
    async fn test_invoke_rejects_empty_completion() {
        let client = mock_client(Arc::new(MockBackend::fixed("   ")));
        let err = client.invoke("anything").await.unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_invoke_propagates_transport_error() {
        let client = mock_client(Arc::new(MockBackend::fixed("x").failing_when(|_| true)));
        let err = client.invoke("anything").await.unwrap_err();
        assert!(matches!(err, PipelineError::HttpError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_invoke_honors_cancellation() {
        let mock = Arc::new(MockBackend::fixed("x"));
        let client = BackendClient::builder("http://unused")
            .backend(mock.clone())
            .cancellation(Some(Arc::new(AtomicBool::new(true))))
            .build()
            .unwrap();
        assert!(matches!(client.invoke("p").await, Err(PipelineError::Cancelled)));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_builder_defaults() {
        let client = BackendClient::builder("http://localhost:11434/api/")
            .build()
            .unwrap();
        assert_eq!(client.model(), "llama3.2:3b");
        assert_eq!(client.base_url(), "http://localhost:11434");
        assert_eq!(client.name(), "ollama");
    }
}
