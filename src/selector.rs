//! Instruction classification.
//!
//! [`select`] decides whether an instruction needs only local context (each
//! chunk can be rewritten on its own) or global context (the whole document
//! must be condensed and synthesized). It is a pure function of the
//! instruction text and never fails: anything unrecognized is a local rewrite.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of processing strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Map only: every chunk is rewritten independently.
    #[default]
    LocalRewrite,
    /// Map-reduce: chunks are summarized, then synthesized in one call.
    GlobalSynthesis,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::LocalRewrite => "local_rewrite",
            TaskKind::GlobalSynthesis => "global_synthesis",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local_rewrite" | "local" | "rewrite" | "map" => Ok(TaskKind::LocalRewrite),
            "global_synthesis" | "global" | "summarize" | "synthesis" | "map_reduce" => {
                Ok(TaskKind::GlobalSynthesis)
            }
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown task kind '{}'",
                other
            ))),
        }
    }
}

/// Word prefixes that mark a global task ("summarize", "summary", "synthesise", ...).
const GLOBAL_STEMS: &[&str] = &["summar", "synthes", "recap"];

/// Whole words or phrases that mark a global task.
const GLOBAL_PHRASES: &[&str] = &[
    "tl dr",
    "tldr",
    "overview",
    "gist",
    "outline",
    "key points",
    "main points",
    "main ideas",
    "key takeaways",
    "takeaways",
    "analyze",
    "analyse",
    "analysis",
    "condense",
];

/// Lowercase, map punctuation to spaces, collapse whitespace, pad with spaces.
fn normalize(text: &str) -> String {
    let lowered: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = lowered.split_whitespace().collect();
    format!(" {} ", words.join(" "))
}

/// Classify an instruction.
///
/// ```
/// use doc_processor::selector::{select, TaskKind};
///
/// assert_eq!(select("Summarize this document"), TaskKind::GlobalSynthesis);
/// assert_eq!(select("Translate to French"), TaskKind::LocalRewrite);
/// assert_eq!(select(""), TaskKind::LocalRewrite);
/// ```
pub fn select(instruction: &str) -> TaskKind {
    let normalized = normalize(instruction);

    let stem_hit = GLOBAL_STEMS
        .iter()
        .any(|stem| normalized.contains(&format!(" {}", stem)));
    let phrase_hit = GLOBAL_PHRASES
        .iter()
        .any(|phrase| normalized.contains(&format!(" {} ", phrase)));

    if stem_hit || phrase_hit {
        TaskKind::GlobalSynthesis
    } else {
        TaskKind::LocalRewrite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_variants_are_global() {
        for instruction in [
            "Summarize this document",
            "please SUMMARISE it",
            "Give me a summary in 5 bullets",
            "Write an executive summary.",
            "Synthesize the main arguments",
            "TL;DR please",
            "What are the key points?",
            "Provide an overview for the board",
            "Analyze the author's argument",
        ] {
            assert_eq!(select(instruction), TaskKind::GlobalSynthesis, "{instruction}");
        }
    }

    #[test]
    fn test_local_tasks() {
        for instruction in [
            "Translate to French",
            "Make the tone more formal",
            "Fix grammar and spelling",
            "Rewrite for a 10 year old",
            "Convert to passive voice",
        ] {
            assert_eq!(select(instruction), TaskKind::LocalRewrite, "{instruction}");
        }
    }

    #[test]
    fn test_markers_match_whole_words_only() {
        assert_eq!(select("Rewrite the logistics section"), TaskKind::LocalRewrite);
        assert_eq!(select("Translate the pseudosummary label"), TaskKind::LocalRewrite);
    }

    #[test]
    fn test_unrecognized_and_empty_fall_back_to_local() {
        assert_eq!(select(""), TaskKind::LocalRewrite);
        assert_eq!(select("   \n"), TaskKind::LocalRewrite);
        assert_eq!(select("¿¿??!!"), TaskKind::LocalRewrite);
        assert_eq!(select("do the thing"), TaskKind::default());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let instruction = "Summarize, then list the key points";
        let first = select(instruction);
        for _ in 0..10 {
            assert_eq!(select(instruction), first);
        }
    }

    #[test]
    fn test_task_kind_parse_and_display() {
        assert_eq!("global".parse::<TaskKind>().unwrap(), TaskKind::GlobalSynthesis);
        assert_eq!(" Rewrite ".parse::<TaskKind>().unwrap(), TaskKind::LocalRewrite);
        assert!("banana".parse::<TaskKind>().unwrap_err().is_config());
        assert_eq!(TaskKind::GlobalSynthesis.to_string(), "global_synthesis");
    }

    #[test]
    fn test_task_kind_serde() {
        let json = serde_json::to_string(&TaskKind::LocalRewrite).unwrap();
        assert_eq!(json, "\"local_rewrite\"");
        let back: TaskKind = serde_json::from_str("\"global_synthesis\"").unwrap();
        assert_eq!(back, TaskKind::GlobalSynthesis);
    }
}
