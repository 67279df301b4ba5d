//! Demo: process a document against a scripted backend, no model required.
//!
//! Run with: `RUST_LOG=doc_processor=debug cargo run --example mock_document`

use doc_processor::{
    BackendClient, DocumentProcessor, Event, FnEventHandler, MockBackend, ProcessorConfig,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DOCUMENT: &str = "\
The committee met on Tuesday to review the quarterly budget. Spending on \
infrastructure exceeded projections by twelve percent.

Several members raised concerns about the maintenance backlog. A proposal \
to defer two projects was discussed but not adopted.

The meeting closed with an agreement to revisit the figures next month.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Map calls echo the first sentence of their chunk; the reduce call is canned.
    let mock = MockBackend::from_fn(|prompt| {
        if prompt.contains("COMBINED SUMMARIES") {
            "Budget overran by 12%; project deferral rejected; review next month.".to_string()
        } else {
            let body = prompt
                .split("---\n")
                .last()
                .and_then(|s| s.strip_suffix("\n---"))
                .unwrap_or(prompt);
            body.split(". ").next().unwrap_or(body).trim().to_string()
        }
    });

    let llm = Arc::new(
        BackendClient::builder("http://unused")
            .backend(Arc::new(mock))
            .build()?,
    );

    let progress = Arc::new(FnEventHandler(|event: Event| match event {
        Event::Chunked { chunks, .. } => println!("[chunked] {} chunks", chunks),
        Event::StrategySelected { kind } => println!("[strategy] {}", kind),
        Event::MapEnd { index, ok } => println!("[map] chunk {} ok={}", index + 1, ok),
        Event::ReduceEnd { ok } => println!("[reduce] ok={}", ok),
        _ => {}
    }));

    let processor = DocumentProcessor::new(llm)
        .with_config(
            ProcessorConfig::default()
                .with_max_chunk_size(200)
                .with_map_concurrency(2),
        )
        .with_event_handler(progress);

    for instruction in ["Summarize the meeting", "Rewrite in a formal tone"] {
        let report = processor.run(DOCUMENT, instruction).await?;
        println!(
            "\n{} -> {} ({} chunks, {} calls)\n{}\n",
            instruction, report.kind, report.chunk_count, report.llm_calls, report.text
        );
    }

    Ok(())
}
