//! Transport-level retry policy for the LLM client.
//!
//! Retrying is the client's job, never the pipeline's: a chunk call that
//! still fails after the policy below is exhausted aborts the whole request.
//! Local Ollama usually wants [`BackoffConfig::none()`]; hosted APIs with
//! rate limits want [`BackoffConfig::standard()`] or a tuned variant.

use std::time::Duration;

/// Exponential backoff with jitter for transient HTTP failures.
///
/// ```
/// use doc_processor::backend::BackoffConfig;
///
/// assert_eq!(BackoffConfig::none().max_retries, 0);
/// assert_eq!(BackoffConfig::standard().max_retries, 3);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of transport retries after the first attempt.
    pub max_retries: u32,

    /// Base delay before the first retry.
    pub initial_delay: Duration,

    /// Growth factor per retry: `initial * multiplier^n`.
    pub multiplier: f64,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// How the computed delay is randomized.
    pub jitter: JitterStrategy,

    /// HTTP status codes that trigger retry.
    pub retryable_statuses: Vec<u16>,

    /// Prefer the provider's `Retry-After` header over the computed delay.
    pub respect_retry_after: bool,
}

/// Jitter strategy, so concurrent map calls hitting the same rate limit do
/// not retry in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// Delay is exactly the computed value.
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// `delay/2` plus uniform in `[0, delay/2]`.
    Equal,
}

const DEFAULT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

impl BackoffConfig {
    /// No transport retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// Hosted API defaults: 3 retries, 1s initial, 2x growth, 60s cap, full jitter.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: JitterStrategy::Full,
            retryable_statuses: DEFAULT_STATUSES.to_vec(),
            respect_retry_after: true,
        }
    }

    /// Large batch documents: 5 retries starting at 500ms, 120s cap.
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(120),
            ..Self::standard()
        }
    }

    /// A user is waiting on the upload: 2 retries, 10s cap.
    pub fn interactive() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(10),
            ..Self::standard()
        }
    }

    /// Delay before retry number `attempt` (0-indexed), jitter applied.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        Duration::from_secs_f64(jittered)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}
