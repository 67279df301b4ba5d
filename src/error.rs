use std::time::Duration;
use thiserror::Error;

/// Errors produced by the document pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON encoding/decoding of a provider payload failed.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An LLM invocation failed or returned an unusable completion.
    ///
    /// `call` names the invocation, e.g. `"rewrite[3]"`, `"summary[0]"` or
    /// `"reduce"`. Never retried by the pipeline itself.
    #[error("LLM call '{call}' failed: {message}")]
    Upstream { call: String, message: String },

    /// The request was cancelled via the cancellation flag.
    #[error("Pipeline was cancelled")]
    Cancelled,

    /// Invalid pipeline parameters (e.g. a zero `max_chunk_size`).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP error with status code, response body, and optional Retry-After hint.
    ///
    /// Returned by [`Backend`](crate::backend::Backend) implementations when
    /// the provider returns a non-success status code. The `retry_after` field
    /// is populated from the `Retry-After` response header when present.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
        /// Parsed `Retry-After` header value, if present.
        retry_after: Option<Duration>,
    },

    /// The document reader or writer collaborator failed.
    #[error("Document codec failed: {0}")]
    Document(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Classify any error raised while talking to the model as
    /// [`PipelineError::Upstream`], labelled with the pipeline call that failed.
    ///
    /// Cancellations pass through untouched.
    pub fn upstream(call: impl Into<String>, err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => err,
            PipelineError::Upstream { message, .. } => PipelineError::Upstream {
                call: call.into(),
                message,
            },
            other => PipelineError::Upstream {
                call: call.into(),
                message: other.to_string(),
            },
        }
    }

    /// Whether this error came from the LLM collaborator.
    pub fn is_upstream(&self) -> bool {
        matches!(self, PipelineError::Upstream { .. })
    }

    /// Whether this error is a configuration problem (fatal, not retried).
    pub fn is_config(&self) -> bool {
        matches!(self, PipelineError::InvalidConfig(_))
    }
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
