//! Processing strategies.
//!
//! A strategy turns an ordered chunk sequence plus an instruction into one
//! result string. The set is closed and small, so it is an enum rather than a
//! trait object:
//!
//! - [`LocalRewriteStrategy`] (map): one call per chunk, results joined in order.
//! - [`GlobalSynthesisStrategy`] (map-reduce): one summary per chunk, then a
//!   single synthesis call over all summaries.
//!
//! Both share the bounded, order-restoring map phase in [`map_chunks`].

mod rewrite;
mod synthesis;

pub use rewrite::LocalRewriteStrategy;
pub use synthesis::GlobalSynthesisStrategy;

use crate::client::LlmClient;
use crate::config::ProcessorConfig;
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::selector::TaskKind;
use crate::PipelineError;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;

/// Delimiter placed between per-chunk outputs: a blank line.
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

/// One of the two processing strategies.
pub enum TaskStrategy {
    LocalRewrite(LocalRewriteStrategy),
    GlobalSynthesis(GlobalSynthesisStrategy),
}

impl TaskStrategy {
    /// Build the strategy for `kind` from the processor configuration.
    pub fn build(
        kind: TaskKind,
        llm: Arc<dyn LlmClient>,
        config: &ProcessorConfig,
        event_handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        match kind {
            TaskKind::LocalRewrite => TaskStrategy::LocalRewrite(
                LocalRewriteStrategy::new(llm)
                    .with_prompts(config.prompts.clone())
                    .with_concurrency(config.map_concurrency)
                    .with_event_handler(event_handler),
            ),
            TaskKind::GlobalSynthesis => TaskStrategy::GlobalSynthesis(
                GlobalSynthesisStrategy::new(llm)
                    .with_prompts(config.prompts.clone())
                    .with_concurrency(config.map_concurrency)
                    .with_event_handler(event_handler),
            ),
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            TaskStrategy::LocalRewrite(_) => TaskKind::LocalRewrite,
            TaskStrategy::GlobalSynthesis(_) => TaskKind::GlobalSynthesis,
        }
    }

    /// Run the strategy. Zero chunks yield `""` without calling the model.
    pub async fn execute<C>(&self, chunks: &[C], instruction: &str) -> Result<String>
    where
        C: AsRef<str> + Sync,
    {
        match self {
            TaskStrategy::LocalRewrite(s) => s.execute(chunks, instruction).await,
            TaskStrategy::GlobalSynthesis(s) => s.execute(chunks, instruction).await,
        }
    }
}

impl std::fmt::Debug for TaskStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TaskStrategy").field(&self.kind()).finish()
    }
}

/// Invoke the model once per chunk with at most `limit` calls in flight.
///
/// Results come back index-aligned with `chunks` whatever order the calls
/// complete in. A blank completion counts as a failed call. The first
/// failure (in completion order) is returned as
/// [`PipelineError::Upstream`] labelled `"{label}[{index}]"`; the stream is
/// dropped at that point, which cancels every call still in flight.
pub(crate) async fn map_chunks<C, F>(
    llm: &dyn LlmClient,
    chunks: &[C],
    limit: usize,
    label: &'static str,
    event_handler: &Option<Arc<dyn EventHandler>>,
    build_prompt: F,
) -> Result<Vec<String>>
where
    C: AsRef<str> + Sync,
    F: Fn(&str) -> String + Sync,
{
    let total = chunks.len();
    let build_prompt = &build_prompt;

    let mut completed: Vec<(usize, String)> = stream::iter(chunks.iter().enumerate())
        .map(|(index, chunk)| {
            let prompt = build_prompt(chunk.as_ref());
            async move {
                emit(event_handler, Event::MapStart { index, total });
                tracing::debug!(phase = label, chunk = index + 1, total, "map call");

                let result = llm
                    .invoke(&prompt)
                    .await
                    .and_then(usable_completion)
                    .map_err(|e| PipelineError::upstream(format!("{}[{}]", label, index), e));

                emit(event_handler, Event::MapEnd { index, ok: result.is_ok() });
                result.map(|text| (index, text))
            }
        })
        .buffer_unordered(limit.max(1))
        .try_collect()
        .await?;

    completed.sort_unstable_by_key(|(index, _)| *index);
    Ok(completed.into_iter().map(|(_, text)| text).collect())
}

/// Reject completions with no text. A blank answer for a non-blank chunk
/// would silently drop that part of the document.
pub(crate) fn usable_completion(text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(PipelineError::Upstream {
            call: "invoke".to_string(),
            message: "model returned an empty completion".to_string(),
        });
    }
    Ok(text)
}
