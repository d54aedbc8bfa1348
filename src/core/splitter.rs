//! Batch splitting: input bytes → lines → batch header → document groups.

use std::borrow::Cow;

use super::error::ConvertError;
use super::layout::LayoutConfig;
use super::tags::{BATCH_MARKER, DOCUMENT_START};
use super::types::SourceLine;

/// The lines of one document, in file order.
pub type DocumentGroup = Vec<SourceLine>;

/// A split batch whose header count has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Count declared by the batch header.
    pub declared: usize,
    /// One group per document.
    pub documents: Vec<DocumentGroup>,
}

/// Decode the input, normalize line endings and drop blank lines.
///
/// UTF-8 is tried first; anything else is decoded as Windows-1252, the
/// encoding legacy emitters write. Line numbers refer to the source, so
/// dropped blank lines still count.
pub fn split_lines(bytes: &[u8]) -> Vec<SourceLine> {
    let text = decode(bytes);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    text.split('\n')
        .enumerate()
        .filter_map(|(i, line)| {
            let line = line.trim();
            (!line.is_empty()).then(|| SourceLine::new(i + 1, line))
        })
        .collect()
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text)),
        Err(_) => {
            tracing::debug!("input is not valid UTF-8, decoding as Windows-1252");
            encoding_rs::WINDOWS_1252.decode(bytes).0
        }
    }
}

/// Parse `NOTAFISCAL|<n>|` and return the declared document count.
pub fn parse_batch_header(line: &str, layout: &LayoutConfig) -> Result<usize, ConvertError> {
    let delimiter = layout.delimiter();
    let line = line.trim();
    let body = line.strip_suffix(delimiter).unwrap_or(line);
    let mut parts = body.split(delimiter);

    let marker = parts.next().unwrap_or_default();
    if marker != BATCH_MARKER {
        return Err(ConvertError::BatchHeader(format!(
            "expected '{BATCH_MARKER}' marker, found '{marker}'"
        )));
    }

    let count = parts.next().map(str::trim).unwrap_or_default();
    if count.is_empty() {
        return Err(ConvertError::BatchHeader("missing document count".into()));
    }
    if parts.any(|extra| !extra.trim().is_empty()) {
        return Err(ConvertError::BatchHeader(format!(
            "unexpected content after document count in '{line}'"
        )));
    }

    let not_a_count =
        || ConvertError::BatchHeader(format!("document count '{count}' is not a positive integer"));
    // `usize::from_str` would accept a leading '+'
    if !count.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_count());
    }
    let declared: usize = count.parse().map_err(|_| not_a_count())?;
    if declared == 0 {
        return Err(ConvertError::BatchHeader(
            "document count must be greater than zero".into(),
        ));
    }
    Ok(declared)
}

/// Group lines into documents, opening a new group at every document-start
/// tag once the current group holds content.
///
/// Lines before the first start tag form a group of their own; it fails
/// validation for lacking a document start.
pub fn split_documents(
    lines: impl IntoIterator<Item = SourceLine>,
    layout: &LayoutConfig,
) -> Vec<DocumentGroup> {
    let delimiter = layout.delimiter();
    let mut groups = Vec::new();
    let mut current = DocumentGroup::new();

    for line in lines {
        if line.tag(delimiter) == DOCUMENT_START && !current.is_empty() {
            groups.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Split a whole input into documents and check the header count.
pub fn split_batch(bytes: &[u8], layout: &LayoutConfig) -> Result<Batch, ConvertError> {
    let mut lines = split_lines(bytes).into_iter();
    let header = lines.next().ok_or(ConvertError::EmptyInput)?;
    let declared = parse_batch_header(&header.text, layout)?;
    let documents = split_documents(lines, layout);

    if documents.len() != declared {
        return Err(ConvertError::CountMismatch {
            declared,
            found: documents.len(),
        });
    }

    tracing::debug!(documents = declared, "batch split");
    Ok(Batch {
        declared,
        documents,
    })
}
