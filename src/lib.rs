//! # Document Processor
//!
//! Instruction-driven LLM processing for documents longer than a model's
//! context window.
//!
//! A document is split into ordered, size-bounded chunks, the instruction is
//! classified into one of two strategies, and the strategy drives the model:
//!
//! - **Local rewrite** (translate, change tone, fix grammar): every chunk is
//!   rewritten on its own and the results are joined in order.
//! - **Global synthesis** (summarize, analyze): every chunk is summarized on
//!   its own, then one final call combines the summaries under the
//!   instruction.
//!
//! Map-phase calls run concurrently up to a configured limit; output order
//! always follows chunk order.
//!
//! ## Core Concepts
//!
//! - **[`Chunker`]**: paragraph → sentence → hard-cut splitting, no chunk
//!   longer than the configured maximum (in characters).
//! - **[`select`]**: deterministic keyword classification of the
//!   instruction into a [`TaskKind`].
//! - **[`TaskStrategy`]**: the two strategies behind one closed enum.
//! - **[`LlmClient`]**: the one seam to the model. [`BackendClient`] talks to
//!   Ollama (or an OpenAI-compatible server with the `openai` feature);
//!   [`MockBackend`] scripts it for tests.
//! - **[`DocumentProcessor`]**: the composition root.
//!
//! ## Quick Start
//!
//! ```no_run
//! use doc_processor::{BackendClient, DocumentProcessor, ProcessorConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = Arc::new(
//!         BackendClient::builder("http://localhost:11434")
//!             .model("llama3.2:3b")
//!             .build()?,
//!     );
//!     let processor = DocumentProcessor::new(llm)
//!         .with_config(ProcessorConfig::default().with_map_concurrency(4));
//!
//!     let report = processor
//!         .run("First paragraph.\n\nSecond paragraph.", "Summarize this document")
//!         .await?;
//!     println!("[{}] {}", report.kind, report.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Testing without a model
//!
//! ```
//! use doc_processor::{BackendClient, DocumentProcessor, MockBackend};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let llm = Arc::new(
//!     BackendClient::builder("http://unused")
//!         .backend(Arc::new(MockBackend::fixed("Bonjour.")))
//!         .build()
//!         .unwrap(),
//! );
//! let processor = DocumentProcessor::new(llm);
//! let out = processor.process("Hello.", "Translate to French", 4_000).await.unwrap();
//! assert_eq!(out, "Bonjour.");
//! # });
//! ```

pub mod backend;
pub mod chunker;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod parsing;
pub mod prompt;
pub mod selector;
pub mod strategy;

pub use backend::{BackoffConfig, MockBackend, OllamaBackend};
#[cfg(feature = "openai")]
pub use backend::OpenAiBackend;
pub use chunker::{Chunk, Chunker};
pub use client::{BackendClient, BackendClientBuilder, LlmClient, LlmConfig};
pub use config::ProcessorConfig;
pub use document::{DocumentReader, DocumentWriter, PlainTextCodec};
pub use error::{PipelineError, Result};
pub use events::{Event, EventHandler, FnEventHandler};
pub use orchestrator::{DocumentProcessor, ProcessReport, ProcessedDocument};
pub use prompt::PromptTemplates;
pub use selector::{select, TaskKind};
pub use strategy::{GlobalSynthesisStrategy, LocalRewriteStrategy, TaskStrategy};
