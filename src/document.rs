//! Document codec collaborators.
//!
//! The pipeline works on plain text. A [`DocumentReader`] turns an uploaded
//! file into text with one paragraph per line; a [`DocumentWriter`] turns
//! the final text back into a file, one paragraph per line. Binary formats
//! (e.g. `.docx`) plug in through these traits. [`PlainTextCodec`] is the
//! built-in UTF-8 implementation.

use anyhow::{bail, Context};

/// Extracts text from an encoded document.
pub trait DocumentReader: Send + Sync {
    /// Decode `bytes` into text. Paragraph breaks must be newline characters.
    fn read(&self, bytes: &[u8]) -> anyhow::Result<String>;
}

/// Encodes text into a document.
pub trait DocumentWriter: Send + Sync {
    /// Encode `text`, one paragraph per newline-delimited segment.
    fn write(&self, text: &str) -> anyhow::Result<Vec<u8>>;

    /// File extension of the produced format, without the dot.
    fn extension(&self) -> &str;
}

/// UTF-8 text files.
///
/// Reading normalizes `\r\n` and lone `\r` to `\n` and strips a BOM.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl DocumentReader for PlainTextCodec {
    fn read(&self, bytes: &[u8]) -> anyhow::Result<String> {
        let text = std::str::from_utf8(bytes).context("document is not valid UTF-8")?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.contains('\0') {
            bail!("document contains NUL bytes; not a text file");
        }
        Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
    }
}

impl DocumentWriter for PlainTextCodec {
    fn write(&self, text: &str) -> anyhow::Result<Vec<u8>> {
        let mut out = paragraphs(text).join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    fn extension(&self) -> &str {
        "txt"
    }
}

/// Newline-delimited segments of `text`, the way a writer lays them out as
/// paragraphs. Trailing whitespace on each line is dropped, as are blank
/// lines at either end.
pub fn paragraphs(text: &str) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    let first = lines.iter().position(|l| !l.is_empty());
    let last = lines.iter().rposition(|l| !l.is_empty());
    match (first, last) {
        (Some(first), Some(last)) => lines[first..=last].to_vec(),
        _ => Vec::new(),
    }
}

/// Output file name for a processed upload: `result_<stem>.<extension>`.
///
/// ```
/// use doc_processor::document::result_file_name;
///
/// assert_eq!(result_file_name("report.docx", "docx"), "result_report.docx");
/// assert_eq!(result_file_name("notes", "txt"), "result_notes.txt");
/// ```
pub fn result_file_name(original: &str, extension: &str) -> String {
    let name = original.rsplit(['/', '\\']).next().unwrap_or(original);
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    };
    let stem = if stem.is_empty() { "document" } else { stem };
    format!("result_{}.{}", stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_normalizes_newlines_and_bom() {
        let text = PlainTextCodec.read("\u{feff}Para A.\r\n\r\nPara B.\rPara C.".as_bytes()).unwrap();
        assert_eq!(text, "Para A.\n\nPara B.\nPara C.");
    }

    #[test]
    fn test_read_rejects_binary() {
        assert!(PlainTextCodec.read(&[0xff, 0xfe, 0x00]).is_err());
        assert!(PlainTextCodec.read(b"PK\0\x03\x04").is_err());
    }

    #[test]
    fn test_write_one_paragraph_per_line() {
        let bytes = PlainTextCodec.write("\n\nFirst.  \n\nSecond.\n\n").unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "First.\n\nSecond.\n");
    }

    #[test]
    fn test_write_empty() {
        assert!(PlainTextCodec.write("").unwrap().is_empty());
        assert!(PlainTextCodec.write(" \n \n").unwrap().is_empty());
    }

    #[test]
    fn test_paragraphs_keeps_inner_blank_lines() {
        assert_eq!(paragraphs("a\n\nb\nc"), vec!["a", "", "b", "c"]);
        assert!(paragraphs("").is_empty());
    }

    #[test]
    fn test_result_file_name() {
        assert_eq!(result_file_name("dir/sub/My Report.docx", "docx"), "result_My Report.docx");
        assert_eq!(result_file_name(".hidden", "txt"), "result_.hidden.txt");
        assert_eq!(result_file_name("", "txt"), "result_document.txt");
        assert_eq!(result_file_name("C:\\Users\\a\\draft.v2.txt", "txt"), "result_draft.v2.txt");
    }
}
