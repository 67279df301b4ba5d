//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] answers from a script: canned responses in order, or a
//! function of the prompt. It records every prompt it receives, can inject
//! failures and latency, and tracks how many calls were in flight at once,
//! which is what the ordering and concurrency tests of the pipeline need.
//!
//! # Example
//!
//! ```
//! use doc_processor::backend::MockBackend;
//!
//! let mock = MockBackend::from_fn(|prompt| format!("seen {} chars", prompt.len()));
//! assert_eq!(mock.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

type Responder = Box<dyn Fn(&str) -> String + Send + Sync>;
type PromptPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Latency = Box<dyn Fn(&str) -> Duration + Send + Sync>;

enum Script {
    /// Canned responses, cycling from the beginning when exhausted.
    Cycle(Vec<String>, AtomicUsize),
    /// Response computed from the prompt.
    Func(Responder),
}

/// A test backend with scripted responses, failure injection and latency.
pub struct MockBackend {
    script: Script,
    fail_when: Option<PromptPredicate>,
    fail_first: Option<(usize, u16)>,
    latency: Option<Latency>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.call_count())
            .field("max_in_flight", &self.max_in_flight())
            .finish()
    }
}

impl MockBackend {
    fn with_script(script: Script) -> Self {
        Self {
            script,
            fail_when: None,
            fail_first: None,
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns `responses` in order, cycling when exhausted.
    pub fn new(responses: Vec<String>) -> Self {
        assert!(!responses.is_empty(), "MockBackend requires at least one response");
        Self::with_script(Script::Cycle(responses, AtomicUsize::new(0)))
    }

    /// Create a mock that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Create a mock whose response is computed from the prompt.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self::with_script(Script::Func(Box::new(f)))
    }

    /// Fail with HTTP 500 whenever `predicate(prompt)` holds.
    pub fn failing_when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Fail the first `n` calls with the given HTTP status, then answer normally.
    pub fn failing_with_status_first(mut self, n: usize, status: u16) -> Self {
        self.fail_first = Some((n, status));
        self
    }

    /// Sleep for `latency(prompt)` before answering.
    pub fn with_latency<L>(mut self, latency: L) -> Self
    where
        L: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    /// Total number of `complete` calls received, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every prompt received, in arrival order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn next_response(&self, prompt: &str) -> String {
        match &self.script {
            Script::Cycle(responses, index) => {
                let idx = index.fetch_add(1, Ordering::Relaxed) % responses.len();
                responses[idx].clone()
            }
            Script::Func(f) => f(prompt),
        }
    }

    async fn answer(&self, call_number: usize, prompt: &str) -> Result<String> {
        if let Some(ref latency) = self.latency {
            tokio::time::sleep(latency(prompt)).await;
        }

        if let Some((n, status)) = self.fail_first {
            if call_number < n {
                return Err(PipelineError::HttpError {
                    status,
                    body: format!("mock failure #{}", call_number + 1),
                    retry_after: None,
                });
            }
        }

        if self.fail_when.as_ref().is_some_and(|p| p(prompt)) {
            return Err(PipelineError::HttpError {
                status: 500,
                body: "mock failure".into(),
                retry_after: None,
            });
        }

        Ok(self.next_response(prompt))
    }
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let text = self.answer(call_number, &request.prompt).await?;
        Ok(LlmResponse {
            text,
            status: 200,
            metadata: None,
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
