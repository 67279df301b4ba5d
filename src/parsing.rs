//! Cleanup of raw model completions.
//!
//! Reasoning models (DeepSeek R1 style) wrap their scratchpad in
//! `<think>...</think>`. That text must never leak into a rewritten chunk or
//! an intermediate summary, so every completion passes through
//! [`clean_completion`] before the pipeline sees it.

/// Extract `<think>...</think>` blocks from a response.
///
/// Returns `(thinking_content, cleaned_text)` where `cleaned_text` has every
/// thinking block removed. An unterminated `<think>` is treated as plain text.
pub fn extract_thinking(text: &str) -> (Option<String>, String) {
    const THINK_START: &str = "<think>";
    const THINK_END: &str = "</think>";

    let mut thinking = Vec::new();
    let mut cleaned = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start_idx) = rest.find(THINK_START) {
        let after_start = &rest[start_idx + THINK_START.len()..];
        let Some(end_idx) = after_start.find(THINK_END) else {
            break;
        };
        cleaned.push_str(&rest[..start_idx]);
        let block = after_start[..end_idx].trim();
        if !block.is_empty() {
            thinking.push(block.to_string());
        }
        rest = &after_start[end_idx + THINK_END.len()..];
    }
    cleaned.push_str(rest);

    let thinking = if thinking.is_empty() {
        None
    } else {
        Some(thinking.join("\n\n"))
    };
    (thinking, cleaned)
}

/// Strip thinking blocks and surrounding whitespace from a completion.
///
/// Returns `None` when nothing usable is left.
pub fn clean_completion(raw: &str) -> Option<String> {
    let (_, cleaned) = extract_thinking(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_thinking_present() {
        let (thinking, cleaned) = extract_thinking("<think>plan it</think>\nLe texte.");
        assert_eq!(thinking.as_deref(), Some("plan it"));
        assert_eq!(cleaned.trim(), "Le texte.");
    }

    #[test]
    fn test_extract_thinking_absent() {
        let (thinking, cleaned) = extract_thinking("plain answer");
        assert!(thinking.is_none());
        assert_eq!(cleaned, "plain answer");
    }

    #[test]
    fn test_extract_thinking_multiple_blocks() {
        let (thinking, cleaned) = extract_thinking("<think>a</think>one <think>b</think>two");
        assert_eq!(thinking.as_deref(), Some("a\n\nb"));
        assert_eq!(cleaned, "one two");
    }

    #[test]
    fn test_unterminated_think_is_kept() {
        let (thinking, cleaned) = extract_thinking("<think>never closed");
        assert!(thinking.is_none());
        assert_eq!(cleaned, "<think>never closed");
    }

    #[test]
    fn test_clean_completion_trims() {
        assert_eq!(clean_completion("  \nSummary.\n\n").as_deref(), Some("Summary."));
    }

    #[test]
    fn test_clean_completion_rejects_empty() {
        assert!(clean_completion("   ").is_none());
        assert!(clean_completion("<think>only thoughts</think>\n").is_none());
    }
}
