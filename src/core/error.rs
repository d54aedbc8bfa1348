use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading layouts or converting a batch.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// Layout definition is missing, unknown, or malformed.
    #[error("layout error: {0}")]
    Layout(String),

    /// The input contained no non-blank lines.
    #[error("empty input: no lines to convert")]
    EmptyInput,

    /// The first line is not a valid `NOTAFISCAL|<n>|` batch header.
    #[error("invalid batch header: {0}")]
    BatchHeader(String),

    /// The batch header count does not match the number of documents found.
    #[error("document count mismatch: header declares {declared}, found {found}")]
    CountMismatch { declared: usize, found: usize },

    /// Structural defect found by the fail-fast parser.
    #[error("line {line} [{tag}]: {message}")]
    Parse {
        line: usize,
        tag: String,
        message: String,
    },

    /// A document failed validation; carries the rendered findings.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The document builder rejected a parsed record.
    #[error("build error: {0}")]
    Build(String),

    /// XML writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Every document in the batch failed.
    #[error("all conversions failed: {}", .0.join("; "))]
    AllFailed(Vec<String>),
}

impl ConvertError {
    pub(crate) fn parse(line: usize, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// A single validation finding with its position in the input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// 1-based line number within the whole file; 0 for file- or document-level findings.
    pub line: usize,
    /// Tag of the offending line (or the tag a document-level rule is about).
    pub tag: String,
    /// Field name, when the finding concerns a single field.
    pub field: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "line {} [{}.{}]: {}", self.line, self.tag, field, self.message)
        } else {
            write!(f, "line {} [{}]: {}", self.line, self.tag, self.message)
        }
    }
}

impl Finding {
    /// Create a finding that concerns the whole line (or document).
    pub fn new(line: usize, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            line,
            tag: tag.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Create a finding about one named field.
    pub fn with_field(
        line: usize,
        tag: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            line,
            tag: tag.into(),
            field: Some(field.into()),
            message: message.into(),
        }
    }
}
