//! Prompt templates and rendering.
//!
//! Templates use `{key}` placeholders. Rendering is a single left-to-right
//! pass: substituted values are copied verbatim and never re-scanned, so a
//! chunk that happens to contain `{instruction}` stays literal text.

use crate::error::Result;
use crate::PipelineError;
use serde::{Deserialize, Serialize};

/// Default prompt for the per-chunk rewrite (map-only) strategy.
pub const REWRITE_TEMPLATE: &str = "You are an expert editor. Your overall goal for the entire document is to '{instruction}'.\n\n\
Now, apply this goal to the following specific text chunk. Preserve the original meaning but modify the style, tone, or wording as requested. \
Output ONLY the rewritten text for this chunk.\n\n\
TEXT CHUNK:\n---\n{chunk}\n---";

/// Default prompt for the map phase of global synthesis. Instruction-agnostic.
pub const MAP_SUMMARY_TEMPLATE: &str = "You are part of a multi-step document processing pipeline. Your current task is to summarize the following text chunk.\n\n\
Create a concise and accurate summary of the key points and information contained in this text. \
This summary will be combined with others to generate a final summary of a much larger document.\n\n\
TEXT CHUNK:\n---\n{chunk}\n---";

/// Default prompt for the single reduce call of global synthesis.
pub const REDUCE_TEMPLATE: &str = "You are an expert analyst. Your task is to fulfill the user's final request: '{instruction}'.\n\n\
The following text is a collection of summaries from different parts of a very large document. \
Your job is to synthesize these summaries into a single, final, and coherent output that accurately reflects the entire document and satisfies the user's request.\n\n\
COMBINED SUMMARIES:\n---\n{summaries}\n---";

/// Render `template`, replacing each `{key}` with the matching value from `vars`.
///
/// Use `{{` to insert a literal `{` and `}}` to insert a literal `}`.
/// Unknown placeholders are left as-is.
///
/// # Example
///
/// ```
/// use doc_processor::prompt::render;
///
/// let out = render("Goal: {instruction} {{json}}", &[("instruction", "be brief")]);
/// assert_eq!(out, "Goal: be brief {json}");
/// ```
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            let substituted = tail[1..].find('}').and_then(|end| {
                let key = &tail[1..1 + end];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, end + 2))
            });
            match substituted {
                Some((value, consumed)) => {
                    out.push_str(value);
                    rest = &tail[consumed..];
                }
                None => {
                    out.push('{');
                    rest = &tail[1..];
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

/// Whether `template` contains the placeholder `{key}`.
pub fn has_placeholder(template: &str, key: &str) -> bool {
    template.contains(&format!("{{{}}}", key))
}

/// The three prompts used by the strategies.
///
/// | template      | placeholders                    |
/// |---------------|---------------------------------|
/// | `rewrite`     | `{instruction}`, `{chunk}`      |
/// | `map_summary` | `{chunk}`                       |
/// | `reduce`      | `{instruction}`, `{summaries}`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplates {
    pub rewrite: String,
    pub map_summary: String,
    pub reduce: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            rewrite: REWRITE_TEMPLATE.to_string(),
            map_summary: MAP_SUMMARY_TEMPLATE.to_string(),
            reduce: REDUCE_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Override the rewrite template.
    pub fn with_rewrite(mut self, template: impl Into<String>) -> Self {
        self.rewrite = template.into();
        self
    }

    /// Override the map-phase summary template.
    pub fn with_map_summary(mut self, template: impl Into<String>) -> Self {
        self.map_summary = template.into();
        self
    }

    /// Override the reduce template.
    pub fn with_reduce(mut self, template: impl Into<String>) -> Self {
        self.reduce = template.into();
        self
    }

    /// Check that every template carries the placeholders its strategy fills.
    pub fn validate(&self) -> Result<()> {
        let required: [(&str, &str, &[&str]); 3] = [
            ("rewrite", &self.rewrite, &["instruction", "chunk"]),
            ("map_summary", &self.map_summary, &["chunk"]),
            ("reduce", &self.reduce, &["instruction", "summaries"]),
        ];
        for (name, template, keys) in required {
            for key in keys {
                if !has_placeholder(template, key) {
                    return Err(PipelineError::InvalidConfig(format!(
                        "prompt template '{}' is missing the {{{}}} placeholder",
                        name, key
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn rewrite_prompt(&self, instruction: &str, chunk: &str) -> String {
        render(&self.rewrite, &[("instruction", instruction), ("chunk", chunk)])
    }

    pub fn map_summary_prompt(&self, chunk: &str) -> String {
        render(&self.map_summary, &[("chunk", chunk)])
    }

    pub fn reduce_prompt(&self, instruction: &str, summaries: &str) -> String {
        render(
            &self.reduce,
            &[("instruction", instruction), ("summaries", summaries)],
        )
    }
}
