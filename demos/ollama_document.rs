//! Demo: process a text file with a local Ollama model.
//!
//! Run with:
//! `cargo run --example ollama_document -- notes.txt "Translate to French"`
//!
//! Writes `result_notes.txt` next to the input. `OLLAMA_URL` and
//! `OLLAMA_MODEL` override the server and model; `DOCPROC_MAX_CHUNK_SIZE`
//! and `DOCPROC_MAP_CONCURRENCY` override the pipeline settings.

use anyhow::{bail, Context};
use doc_processor::document::result_file_name;
use doc_processor::{
    BackendClient, BackoffConfig, DocumentProcessor, DocumentWriter, PlainTextCodec,
    ProcessorConfig,
};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(path), Some(instruction)) = (args.next(), args.next()) else {
        bail!("usage: ollama_document <file> <instruction>");
    };

    let base_url =
        std::env::var("OLLAMA_URL").unwrap_or_else(|_| "http://localhost:11434".to_string());
    let model = std::env::var("OLLAMA_MODEL").unwrap_or_else(|_| "llama3.2:3b".to_string());

    let llm = Arc::new(
        BackendClient::builder(base_url)
            .model(model)
            .backoff(BackoffConfig::standard())
            .build()?,
    );
    let processor = DocumentProcessor::new(llm).with_config(ProcessorConfig::from_env()?);

    let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path))?;
    let processed = processor
        .process_document(&PlainTextCodec, &bytes, &instruction, &PlainTextCodec)
        .await?;

    let input = Path::new(&path);
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = input.with_file_name(result_file_name(&file_name, PlainTextCodec.extension()));
    std::fs::write(&output, &processed.bytes)
        .with_context(|| format!("writing {}", output.display()))?;

    println!(
        "{} ({} chunks, {} calls) -> {}",
        processed.report.kind,
        processed.report.chunk_count,
        processed.report.llm_calls,
        output.display()
    );
    Ok(())
}
