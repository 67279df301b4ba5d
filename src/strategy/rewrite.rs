use super::{map_chunks, PARAGRAPH_DELIMITER};
use crate::client::LlmClient;
use crate::error::Result;
use crate::events::EventHandler;
use crate::prompt::PromptTemplates;
use std::sync::Arc;

/// Map-only strategy for tasks that need no cross-chunk context
/// (translation, tone, grammar).
///
/// Each chunk is sent with the instruction; the rewritten chunks are joined
/// with a blank line, in original order.
pub struct LocalRewriteStrategy {
    llm: Arc<dyn LlmClient>,
    prompts: PromptTemplates,
    concurrency: usize,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl LocalRewriteStrategy {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            prompts: PromptTemplates::default(),
            concurrency: 1,
            event_handler: None,
        }
    }

    /// Prompt template with `{instruction}` and `{chunk}` placeholders.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompts.rewrite = template.into();
        self
    }

    /// Take the rewrite template from a full template set.
    pub fn with_prompts(mut self, prompts: PromptTemplates) -> Self {
        self.prompts = prompts;
        self
    }

    /// Maximum number of chunk calls in flight.
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
        tracing::info!(chunks = chunks.len(), "executing local rewrite (map)");

        let rewritten = map_chunks(
            self.llm.as_ref(),
            chunks,
            self.concurrency,
            "rewrite",
            &self.event_handler,
            |chunk| self.prompts.rewrite_prompt(instruction, chunk),
        )
        .await?;

        Ok(rewritten.join(PARAGRAPH_DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::strategy::test_support::{fenced, llm, ConstClient};
    use crate::PipelineError;
    use std::time::Duration;

    #[tokio::test]
    async fn test_zero_chunks_is_noop() {
        let mock = Arc::new(MockBackend::fixed("never"));
        let strategy = LocalRewriteStrategy::new(llm(&mock));
        let empty: [&str; 0] = [];

        let out = strategy.execute(&empty, "Translate to French").await.unwrap();

        assert_eq!(out, "");
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_single_chunk_single_call() {
        let mock = Arc::new(MockBackend::fixed("Para A réécrit."));
        let strategy = LocalRewriteStrategy::new(llm(&mock));

        let out = strategy
            .execute(&["Para A.\n\nPara B.\n\nPara C."], "Translate to French")
            .await
            .unwrap();

        assert_eq!(out, "Para A réécrit.");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_prompt_embeds_instruction_and_chunk() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let strategy = LocalRewriteStrategy::new(llm(&mock));
        let instruction = "Make it {formal}, 'please'";

        strategy.execute(&["Hello there."], instruction).await.unwrap();

        let prompts = mock.prompts();
        assert!(prompts[0].contains(instruction));
        assert_eq!(fenced(&prompts[0]), "Hello there.");
    }

    #[tokio::test]
    async fn test_outputs_joined_in_chunk_order() {
        let mock = Arc::new(
            MockBackend::from_fn(|p| fenced(p).to_uppercase()).with_latency(|p| {
                // first chunk is the slowest
                if fenced(p) == "one" {
                    Duration::from_millis(40)
                } else {
                    Duration::from_millis(5)
                }
            }),
        );
        let strategy = LocalRewriteStrategy::new(llm(&mock)).with_concurrency(3);

        let out = strategy.execute(&["one", "two", "three"], "Shout").await.unwrap();

        assert_eq!(out, "ONE\n\nTWO\n\nTHREE");
    }

    #[tokio::test]
    async fn test_failure_propagates_without_partial_result() {
        let mock = Arc::new(
            MockBackend::from_fn(|p| fenced(p).to_string()).failing_when(|p| fenced(p) == "bad"),
        );
        let strategy = LocalRewriteStrategy::new(llm(&mock));

        let result = strategy.execute(&["good", "bad", "never"], "Rewrite").await;

        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "rewrite[1]"));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_custom_template() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let strategy = LocalRewriteStrategy::new(llm(&mock)).with_template("[{instruction}] {chunk}");

        strategy.execute(&["text"], "Shorten").await.unwrap();

        assert_eq!(mock.prompts(), vec!["[Shorten] text"]);
    }

    #[tokio::test]
    async fn test_blank_rewrite_is_upstream_not_dropped() {
        let client = ConstClient::new(" \n ");
        let strategy = LocalRewriteStrategy::new(client.clone());

        let err = strategy.execute(&["Para A.", "Para B."], "Shorten").await.unwrap_err();

        assert!(matches!(err, PipelineError::Upstream { ref call, .. } if call == "rewrite[0]"));
        assert_eq!(client.calls(), 1);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn run<F: std::future::Future>(future: F) -> F::Output {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap()
                .block_on(future)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(48))]

            /// Whatever order the calls finish in, segment i is chunk i's answer.
            #[test]
            fn prop_output_follows_chunk_order(
                latencies in prop::collection::vec(0u64..25, 1..10),
                concurrency in 1usize..6,
            ) {
                let delays = latencies.clone();
                let mock = Arc::new(
                    MockBackend::from_fn(|p| format!("out-{}", fenced(p))).with_latency(move |p| {
                        let index: usize = fenced(p).trim_start_matches('c').parse().unwrap_or(0);
                        Duration::from_millis(delays[index])
                    }),
                );
                let strategy = LocalRewriteStrategy::new(llm(&mock)).with_concurrency(concurrency);
                let chunks: Vec<String> = (0..latencies.len()).map(|i| format!("c{}", i)).collect();

                let out = run(strategy.execute(&chunks, "Rewrite")).unwrap();

                let expected: Vec<String> = chunks.iter().map(|c| format!("out-{}", c)).collect();
                prop_assert_eq!(out, expected.join("\n\n"));
                prop_assert_eq!(mock.call_count(), chunks.len());
                prop_assert!(mock.max_in_flight() <= concurrency);
            }
        }
    }
}
