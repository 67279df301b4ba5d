//! Boundary-aware document chunking.
//!
//! The chunker cuts document text into ordered chunks of at most
//! `max_chunk_size` characters (Unicode scalar values). It prefers to cut
//! between paragraphs, falls back to sentence boundaries for a paragraph that
//! is too long on its own, and hard-cuts a sentence that still does not fit.
//!
//! ```text
//! document ──► paragraphs (newline runs)
//!                 └─ too long? ──► sentences (. ! ? + whitespace)
//!                                     └─ too long? ──► max_chunk_size slices
//!          ──► greedy packing of units, in order ──► chunks
//! ```
//!
//! Every chunk records its byte `span` in the source. Chunk text is the
//! source slice with edge whitespace trimmed, and everything between two
//! consecutive spans is separator whitespace, so [`reassemble`] rebuilds the
//! document content exactly.

use crate::error::Result;
use crate::PipelineError;
use std::ops::Range;

/// One bounded, non-empty piece of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position in reading order.
    pub index: usize,
    /// Chunk text; equal to `source[span]`.
    pub text: String,
    /// Byte range of `text` within the source document.
    pub span: Range<usize>,
}

impl Chunk {
    /// Length in characters, the unit `max_chunk_size` is measured in.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

impl AsRef<str> for Chunk {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// Splits documents into chunks of at most `max_chunk_size` characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chunk_size: usize,
}

impl Chunker {
    /// Create a chunker. Fails with [`PipelineError::InvalidConfig`] when
    /// `max_chunk_size` is zero.
    pub fn new(max_chunk_size: usize) -> Result<Self> {
        if max_chunk_size == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chunk_size })
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size
    }

    /// Split `text` into ordered chunks.
    ///
    /// An empty or whitespace-only document yields no chunks. A document no
    /// longer than `max_chunk_size` yields exactly one.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        let max = self.max_chunk_size;
        let mut spans: Vec<Range<usize>> = Vec::new();
        let mut current: Option<(Range<usize>, usize)> = None;

        for unit in semantic_units(text, max) {
            let unit_len = char_len(text, &unit);
            current = match current.take() {
                None => Some((unit, unit_len)),
                Some((cur, cur_len)) => {
                    let merged = cur_len + char_len(text, &(cur.end..unit.start)) + unit_len;
                    if merged <= max {
                        Some((cur.start..unit.end, merged))
                    } else {
                        spans.push(cur);
                        Some((unit, unit_len))
                    }
                }
            };
        }
        if let Some((cur, _)) = current {
            spans.push(cur);
        }

        spans
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                index,
                text: text[span.clone()].to_string(),
                span,
            })
            .collect()
    }
}

/// Split `text` into chunks of at most `max_chunk_size` characters.
///
/// ```
/// use doc_processor::chunker::split;
///
/// let chunks = split("Para A.\n\nPara B.\n\nPara C.", 16).unwrap();
/// let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, vec!["Para A.\n\nPara B.", "Para C."]);
/// ```
pub fn split(text: &str, max_chunk_size: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_chunk_size)?.split(text))
}

/// Rebuild the document content from its chunks, restoring the original
/// separators between them. The result equals `source.trim()`.
pub fn reassemble(source: &str, chunks: &[Chunk]) -> String {
    let mut out = String::with_capacity(source.len());
    let mut prev_end: Option<usize> = None;
    for chunk in chunks {
        if let Some(end) = prev_end {
            out.push_str(&source[end..chunk.span.start]);
        }
        out.push_str(&chunk.text);
        prev_end = Some(chunk.span.end);
    }
    out
}

fn char_len(text: &str, span: &Range<usize>) -> usize {
    text[span.clone()].chars().count()
}

/// Narrow `span` to exclude leading/trailing whitespace. `None` if nothing is left.
fn trim_span(text: &str, span: Range<usize>) -> Option<Range<usize>> {
    let s = &text[span.clone()];
    let trimmed_start = s.trim_start();
    if trimmed_start.is_empty() {
        return None;
    }
    let start = span.start + (s.len() - trimmed_start.len());
    let end = span.end - (s.len() - s.trim_end().len());
    Some(start..end)
}

/// Units in reading order, each at most `max` characters long.
fn semantic_units(text: &str, max: usize) -> Vec<Range<usize>> {
    let mut units = Vec::new();
    for para in paragraph_spans(text) {
        if char_len(text, &para) <= max {
            units.push(para);
            continue;
        }
        for sentence in sentence_spans(text, para) {
            if char_len(text, &sentence) <= max {
                units.push(sentence);
            } else {
                units.extend(hard_cut(text, sentence, max));
            }
        }
    }
    units
}

/// Non-empty lines; the document reader emits one paragraph per line.
fn paragraph_spans(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in text.split('\n') {
        let end = start + line.len();
        spans.extend(trim_span(text, start..end));
        start = end + 1;
    }
    spans
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}') || is_terminator(c)
}

/// Sentences within `para`: a terminator, optional closing quotes/brackets,
/// then whitespace.
fn sentence_spans(text: &str, para: Range<usize>) -> Vec<Range<usize>> {
    let s = &text[para.clone()];
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = s.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_closer(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        if chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
            spans.extend(trim_span(text, para.start + start..para.start + end));
            start = end;
        }
    }
    spans.extend(trim_span(text, para.start + start..para.end));
    spans
}

/// Slice `span` every `max` characters.
fn hard_cut(text: &str, span: Range<usize>, max: usize) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut piece_start = span.start;
    let mut count = 0;
    for (i, _) in text[span.clone()].char_indices() {
        if count == max {
            pieces.extend(trim_span(text, piece_start..span.start + i));
            piece_start = span.start + i;
            count = 0;
        }
        count += 1;
    }
    pieces.extend(trim_span(text, piece_start..span.end));
    pieces
}
