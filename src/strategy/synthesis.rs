use super::{map_chunks, usable_completion, PARAGRAPH_DELIMITER};
use crate::client::LlmClient;
use crate::error::Result;
use crate::events::{emit, Event, EventHandler};
use crate::prompt::PromptTemplates;
use crate::PipelineError;
use std::sync::Arc;

/// Map-reduce strategy for tasks that need the whole document
/// (summarization, holistic analysis).
///
/// Map: each chunk is summarized on its own; the instruction is not sent.
/// Reduce: the summaries, joined by blank lines, go out in exactly one more
/// call together with the instruction. The reduce completion is the result.
pub struct GlobalSynthesisStrategy {
    llm: Arc<dyn LlmClient>,
    prompts: PromptTemplates,
    concurrency: usize,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl GlobalSynthesisStrategy {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: PromptTemplates::default(),
            concurrency: 1,
            event_handler: None,
        }
    }

    /// Map template (`{chunk}`) and reduce template (`{instruction}`, `{summaries}`).
    pub fn with_templates(mut self, map: impl Into<String>, reduce: impl Into<String>) -> Self {
        self.prompts.map_summary = map.into();
        self.prompts.reduce = reduce.into();
        self
    }

    /// Take the map and reduce templates from a full template set.
    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// Maximum number of map-phase calls in flight.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn with_event_handler(mut self, handler: Option<Arc<dyn EventHandler>>) -> Self {
        self.event_handler = handler;
        self
    }

    pub async fn execute<C>(&self, chunks: &[C], instruction: &str) -> Result<String>
    where
        C: AsRef<str> + Sync,
    {
        if chunks.is_empty() {
            return Ok(String::new());
        }
        tracing::info!(chunks = chunks.len(), "executing global synthesis (map-reduce)");

        let summaries = map_chunks(
            self.llm.as_ref(),
            chunks,
            self.concurrency,
            "summary",
            &self.event_handler,
            |chunk| self.prompts.map_summary_prompt(chunk),
        )
        .await?;

        let combined = summaries.join(PARAGRAPH_DELIMITER);

        tracing::info!(
            summaries = summaries.len(),
            combined_chars = combined.chars().count(),
            "reducing intermediate summaries"
        );
        emit(
            &self.event_handler,
            Event::ReduceStart {
                summaries: summaries.len(),
            },
        );

        let prompt = self.prompts.reduce_prompt(instruction, &combined);
        let result = self
            .llm
            .invoke(&prompt)
            .await
            .and_then(usable_completion)
            .map_err(|e| PipelineError::upstream("reduce", e));

        emit(&self.event_handler, Event::ReduceEnd { ok: result.is_ok() });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::strategy::test_support::{fenced, llm, ConstClient};
    use std::time::Duration;

    fn is_reduce(prompt: &str) -> bool {
        prompt.contains("COMBINED SUMMARIES")
    }

    /// Summaries are `sum(<chunk>)`; the reduce call answers `FINAL`.
    fn scripted() -> MockBackend {
        MockBackend::from_fn(|p| {
            if is_reduce(p) {
                "FINAL".to_string()
            } else {
                format!("sum({})", fenced(p))
            }
        })
    }

    #[tokio::test]
    async fn test_zero_chunks_skips_reduce() {
        let mock = Arc::new(scripted());
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));
        let empty: Vec<String> = Vec::new();

        let out = strategy.execute(&empty, "Summarize").await.unwrap();

        assert_eq!(out, "");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_two_chunks_three_calls() {
        let mock = Arc::new(scripted());
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));

        let out = strategy
            .execute(&["Para A.", "Para B.\n\nPara C."], "Summarize this document")
            .await
            .unwrap();

        assert_eq!(out, "FINAL");
        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 3);

        let reduce = &prompts[2];
        assert!(is_reduce(reduce));
        assert!(reduce.contains("'Summarize this document'"));
        assert_eq!(fenced(reduce), "sum(Para A.)\n\nsum(Para B.\n\nPara C.)");
    }

    #[tokio::test]
    async fn test_map_prompts_do_not_carry_instruction() {
        let mock = Arc::new(scripted());
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));

        strategy.execute(&["alpha", "beta"], "Give a zebra-themed recap").await.unwrap();

        let prompts = mock.prompts();
        let maps: Vec<&String> = prompts.iter().filter(|p| !is_reduce(p)).collect();
        assert_eq!(maps.len(), 2);
        assert!(maps.iter().all(|p| !p.contains("zebra")));
    }

    #[tokio::test]
    async fn test_reduce_issued_once_after_all_maps() {
        let mock = Arc::new(scripted().with_latency(|p| {
            if fenced(p) == "c0" {
                Duration::from_millis(40)
            } else {
                Duration::from_millis(2)
            }
        }));
        let strategy = GlobalSynthesisStrategy::new(llm(&mock)).with_concurrency(4);
        let chunks: Vec<String> = (0..6).map(|i| format!("c{}", i)).collect();

        let out = strategy.execute(&chunks, "Summarize").await.unwrap();

        assert_eq!(out, "FINAL");
        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 7);
        assert_eq!(prompts.iter().filter(|p| is_reduce(p)).count(), 1);
        let last = prompts.last().unwrap();
        assert!(is_reduce(last));
        let expected: Vec<String> = chunks.iter().map(|c| format!("sum({})", c)).collect();
        assert_eq!(fenced(last), expected.join("\n\n"));
    }

    #[tokio::test]
    async fn test_map_failure_skips_reduce() {
        let mock = Arc::new(scripted().failing_when(|p| fenced(p) == "broken"));
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));

        let err = strategy
            .execute(&["fine", "broken", "fine"], "Summarize")
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "summary[1]"));
        assert!(mock.prompts().iter().all(|p| !is_reduce(p)));
    }

    #[tokio::test]
    async fn test_reduce_failure_is_upstream() {
        let mock = Arc::new(scripted().failing_when(is_reduce));
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));

        let err = strategy.execute(&["a"], "Summarize").await.unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "reduce"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_blank_summaries_fail_instead_of_empty_result() {
        let client = ConstClient::new("");
        let strategy = GlobalSynthesisStrategy::new(client.clone());

        let err = strategy.execute(&["Para A."], "Summarize").await.unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "summary[0]"));
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_blank_reduce_completion_is_upstream() {
        let mock = Arc::new(MockBackend::from_fn(|p| {
            if is_reduce(p) {
                "<think>nothing to say</think>".to_string()
            } else {
                "sum".to_string()
            }
        }));
        let strategy = GlobalSynthesisStrategy::new(llm(&mock));

        let err = strategy.execute(&["a", "b"], "Summarize").await.unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "reduce"));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_custom_prompts_are_used() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let prompts = PromptTemplates::default()
            .with_map_summary("S: {chunk}")
            .with_reduce("R[{instruction}]: {summaries}");
        let strategy = GlobalSynthesisStrategy::new(llm(&mock)).with_prompts(prompts);

        strategy.execute(&["x"], "Recap").await.unwrap();

        assert_eq!(mock.prompts(), vec!["S: x", "R[Recap]: ok"]);
    }

    #[tokio::test]
    async fn test_reduce_events() {
        use crate::events::FnEventHandler;
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn EventHandler> = Arc::new(FnEventHandler(move |e: Event| match e {
            Event::ReduceStart { summaries } => sink.lock().unwrap().push(format!("start:{}", summaries)),
            Event::ReduceEnd { ok } => sink.lock().unwrap().push(format!("end:{}", ok)),
            _ => {}
        }));
        let mock = Arc::new(scripted());
        let strategy = GlobalSynthesisStrategy::new(llm(&mock)).with_event_handler(Some(handler));

        strategy.execute(&["a", "b"], "Summarize").await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["start:2", "end:true"]);
    }
}
