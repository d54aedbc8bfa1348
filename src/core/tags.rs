//! Tag roles shared by the splitter, validator and parser.

/// Literal marker of the batch header line.
pub const BATCH_MARKER: &str = "NOTAFISCAL";

/// Tag that opens every document.
pub const DOCUMENT_START: &str = "A";
/// Identification (`ide`).
pub const IDENTIFICATION: &str = "B";
/// Issuer (`emit`).
pub const ISSUER: &str = "C";
/// Product line (`prod`).
pub const ITEM: &str = "I";

/// Tags every document must contain, with the section each one introduces.
pub const REQUIRED_TAGS: [(&str, &str); 4] = [
    (DOCUMENT_START, "document start"),
    (IDENTIFICATION, "identification"),
    (ISSUER, "issuer"),
    (ITEM, "line item"),
];

/// `(earlier, later)`: the first `later` must not come before the first `earlier`.
pub const TAG_ORDER: [(&str, &str); 3] = [
    (DOCUMENT_START, IDENTIFICATION),
    (IDENTIFICATION, ISSUER),
    (ISSUER, ITEM),
];

/// Section name for a role tag.
pub fn section_name(tag: &str) -> &'static str {
    REQUIRED_TAGS
        .iter()
        .find(|(t, _)| *t == tag)
        .map_or("section", |(_, name)| *name)
}

/// Required tags for which `seen` returns false, in declaration order.
pub fn missing_required(seen: impl Fn(&str) -> bool) -> impl Iterator<Item = &'static str> {
    REQUIRED_TAGS
        .into_iter()
        .map(|(tag, _)| tag)
        .filter(move |tag| !seen(*tag))
}

/// A line split into its tag and positional values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LineParts<'a> {
    pub tag: &'a str,
    pub values: Vec<&'a str>,
}

/// Split a terminated line. Returns `None` when the closing delimiter is missing.
pub(crate) fn split_line(text: &str, delimiter: char) -> Option<LineParts<'_>> {
    let body = text.strip_suffix(delimiter)?;
    let mut parts = body.split(delimiter);
    let tag = parts.next().unwrap_or_default();
    Some(LineParts {
        tag,
        values: parts.collect(),
    })
}
