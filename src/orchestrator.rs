//! Composition root: one document plus one instruction in, one document out.
//!
//! ```text
//! text ──► Chunker ──► select(instruction) ──► TaskStrategy::execute ──► result
//!                                                   │
//!                                             LlmClient::invoke (×N or ×N+1)
//! ```
//!
//! A request either completes with the full, ordered result or fails with a
//! classified [`PipelineError`]. There is no partial output.

use crate::chunker::Chunker;
use crate::client::LlmClient;
use crate::config::ProcessorConfig;
use crate::document::{DocumentReader, DocumentWriter};
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::selector::{select, TaskKind};
use crate::strategy::TaskStrategy;
use crate::PipelineError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessReport {
    /// The final result text.
    pub text: String,
    /// Strategy that produced it.
    pub kind: TaskKind,
    /// Number of chunks the document was split into.
    pub chunk_count: usize,
    /// Number of model calls actually made for this request.
    pub llm_calls: usize,
}

/// An encoded result document and the report behind it.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub bytes: Vec<u8>,
    pub report: ProcessReport,
}

/// Runs the chunk → select → execute pipeline.
///
/// Holds no per-request state; one processor can serve concurrent requests
/// as long as its [`LlmClient`] can.
///
/// # Example
///
/// ```no_run
/// use doc_processor::{BackendClient, DocumentProcessor};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let llm = Arc::new(BackendClient::builder("http://localhost:11434").build()?);
///     let processor = DocumentProcessor::new(llm);
///     let text = processor
///         .process("Para A.\n\nPara B.", "Translate to French", 4_000)
///         .await?;
///     println!("{}", text);
///     Ok(())
/// }
/// ```
pub struct DocumentProcessor {
    llm: Arc<dyn LlmClient>,
    config: ProcessorConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl DocumentProcessor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            config: ProcessorConfig::default(),
            event_handler: None,
        }
    }

    pub fn with_config(mut self, config: ProcessorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Transform `document_text` according to `instruction`, chunking at
    /// `max_chunk_size` characters.
    pub async fn process(
        &self,
        document_text: &str,
        instruction: &str,
        max_chunk_size: usize,
    ) -> Result<String> {
        let report = self
            .run_with(document_text, instruction, max_chunk_size)
            .await?;
        Ok(report.text)
    }

    /// Like [`process`](Self::process) with the configured chunk size,
    /// returning the full [`ProcessReport`].
    pub async fn run(&self, document_text: &str, instruction: &str) -> Result<ProcessReport> {
        self.run_with(document_text, instruction, self.config.max_chunk_size)
            .await
    }

    /// Decode an uploaded document, process it, and encode the result.
    pub async fn process_document(
        &self,
        reader: &dyn DocumentReader,
        bytes: &[u8],
        instruction: &str,
        writer: &dyn DocumentWriter,
    ) -> Result<ProcessedDocument> {
        let text = reader
            .read(bytes)
            .map_err(|e| PipelineError::Document(format!("{:#}", e)))?;
        tracing::info!(
            bytes = bytes.len(),
            chars = text.chars().count(),
            "document decoded"
        );

        let report = self.run(&text, instruction).await?;

        let bytes = writer
            .write(&report.text)
            .map_err(|e| PipelineError::Document(format!("{:#}", e)))?;
        tracing::info!(
            bytes = bytes.len(),
            extension = writer.extension(),
            "result document encoded"
        );
        Ok(ProcessedDocument { bytes, report })
    }

    async fn run_with(
        &self,
        document_text: &str,
        instruction: &str,
        max_chunk_size: usize,
    ) -> Result<ProcessReport> {
        let chunker = Chunker::new(max_chunk_size)?;
        self.config.validate_execution()?;

        tracing::info!(%instruction, "processing document");

        let chunks = chunker.split(document_text);
        tracing::info!(chunks = chunks.len(), max_chunk_size, "document chunked");
        emit(
            &self.event_handler,
            Event::Chunked {
                chunks: chunks.len(),
                max_chunk_size,
            },
        );

        let kind = self
            .config
            .force_strategy
            .unwrap_or_else(|| select(instruction));
        tracing::info!(strategy = %kind, "strategy selected");
        emit(&self.event_handler, Event::StrategySelected { kind });

        let counter = Arc::new(CountingClient::new(self.llm.clone()));
        let strategy = TaskStrategy::build(
            kind,
            counter.clone(),
            &self.config,
            self.event_handler.clone(),
        );

        let text = strategy
            .execute(&chunks, instruction)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, strategy = %kind, "document processing failed");
                e
            })?;

        let report = ProcessReport {
            llm_calls: counter.calls(),
            chunk_count: chunks.len(),
            kind,
            text,
        };
        tracing::info!(
            llm_calls = report.llm_calls,
            result_chars = report.text.chars().count(),
            "document processed"
        );
        Ok(report)
    }
}

/// Per-request wrapper that counts the calls going through it.
struct CountingClient {
    inner: Arc<dyn LlmClient>,
    calls: AtomicUsize,
}

impl CountingClient {
    fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for CountingClient {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.invoke(prompt).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("llm", &self.llm.name())
            .field("config", &self.config)
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}
