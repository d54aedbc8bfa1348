use std::fmt;

use serde::{Deserialize, Serialize};

use super::builder::{BuiltDocument, DocumentBuilder, emit_record};
use super::config::ConvertConfig;
use crate::core::tags::BATCH_MARKER;
use crate::core::*;

/// Outcome of converting a batch in which at least one document succeeded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    /// XML of each converted document, in batch order.
    pub outputs: Vec<Vec<u8>>,
    /// Number of converted documents (`outputs.len()`).
    pub successes: usize,
    /// Builder remarks, prefixed with the document position.
    pub warnings: Vec<String>,
    /// One entry per failed document, prefixed with its position.
    pub errors: Vec<String>,
}

/// Findings for one document of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    /// 1-based position of the document in the batch.
    pub position: usize,
    pub findings: Vec<Finding>,
}

/// Result of a validate-only pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// File-level defects (empty input, bad header, count mismatch).
    /// When present, no document was validated.
    pub file: Vec<Finding>,
    pub documents: Vec<DocumentReport>,
}

impl ValidationReport {
    /// True when neither the file nor any document has findings.
    pub fn is_valid(&self) -> bool {
        self.file.is_empty() && self.documents.iter().all(|d| d.findings.is_empty())
    }

    /// Every finding, file-level first.
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.file
            .iter()
            .chain(self.documents.iter().flat_map(|d| d.findings.iter()))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.file {
            writeln!(f, "file: {finding}")?;
        }
        for doc in &self.documents {
            for finding in &doc.findings {
                writeln!(f, "document {}: {finding}", doc.position)?;
            }
        }
        Ok(())
    }
}

/// Split, validate and parse batches, handing each record to a fresh builder.
///
/// # Example
///
/// ```
/// use notafiscal::convert::{BuiltDocument, Converter, DocumentBuilder};
/// use notafiscal::core::*;
///
/// #[derive(Default)]
/// struct Summary(String);
///
/// impl DocumentBuilder for Summary {
///     fn header(&mut self, h: &Header) -> Result<(), ConvertError> {
///         self.0.push_str(h.version.as_deref().unwrap_or("?"));
///         Ok(())
///     }
///     fn identification(&mut self, _: &FieldMap) -> Result<(), ConvertError> { Ok(()) }
///     fn issuer(&mut self, _: &Party) -> Result<(), ConvertError> { Ok(()) }
///     fn recipient(&mut self, _: &Party) -> Result<(), ConvertError> { Ok(()) }
///     fn item(&mut self, i: &LineItem) -> Result<(), ConvertError> {
///         self.0.push_str(&format!(" item{}", i.index));
///         Ok(())
///     }
///     fn finish(self) -> Result<BuiltDocument, ConvertError> {
///         Ok(BuiltDocument { xml: self.0.into_bytes(), warnings: vec![] })
///     }
/// }
///
/// let layout = LayoutConfigBuilder::new("mini", "4.00")
///     .tag("A", &["versao", "Id"])
///     .tag("B", &["natOp"])
///     .tag("C", &["xNome"])
///     .tag("I", &["xProd"])
///     .build()
///     .unwrap();
/// let converter = Converter::new(layout, Summary::default);
/// let result = converter
///     .convert(b"NOTAFISCAL|1|\nA|4.00||\nB|Venda|\nC|Loja|\nI|Caneta|\n")
///     .unwrap();
/// assert_eq!(result.outputs, [b"4.00 item1".to_vec()]);
/// ```
pub struct Converter<F> {
    layout: LayoutConfig,
    config: ConvertConfig,
    factory: F,
}

impl<F, B> Converter<F>
where
    F: Fn() -> B + Sync,
    B: DocumentBuilder,
{
    /// Create a converter; `factory` is called once per document.
    pub fn new(layout: LayoutConfig, factory: F) -> Self {
        Self {
            layout,
            config: ConvertConfig::default(),
            factory,
        }
    }

    pub fn with_config(mut self, config: ConvertConfig) -> Self {
        self.config = config;
        self
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Convert every document of a batch.
    ///
    /// File-level defects fail the whole call. Per-document failures
    /// (validation, parsing, building) are collected into
    /// [`BatchResult::errors`]; the call itself only fails with
    /// [`ConvertError::AllFailed`] when no document succeeded.
    pub fn convert(&self, input: &[u8]) -> Result<BatchResult, ConvertError> {
        let batch = split_batch(input, &self.layout)?;
        tracing::debug!(
            layout = self.layout.name(),
            documents = batch.documents.len(),
            "converting batch"
        );

        let outcomes = self.run_documents(&batch.documents, |group| self.convert_document(group));

        let mut result = BatchResult::default();
        for (i, outcome) in outcomes.into_iter().enumerate() {
            let position = i + 1;
            match outcome {
                Ok(built) => {
                    result.warnings.extend(
                        built
                            .warnings
                            .into_iter()
                            .map(|w| format!("document {position}: {w}")),
                    );
                    result.outputs.push(built.xml);
                    result.successes += 1;
                }
                Err(e) => {
                    tracing::warn!(document = position, error = %e, "document conversion failed");
                    result.errors.push(format!("document {position}: {e}"));
                }
            }
        }

        if result.successes == 0 {
            return Err(ConvertError::AllFailed(result.errors));
        }
        tracing::debug!(
            successes = result.successes,
            failures = result.errors.len(),
            "batch converted"
        );
        Ok(result)
    }

    /// Split and validate without parsing or building.
    pub fn validate_only(&self, input: &[u8]) -> ValidationReport {
        match split_batch(input, &self.layout) {
            Ok(batch) => {
                let findings =
                    self.run_documents(&batch.documents, |group| validate_document(group, &self.layout));
                ValidationReport {
                    file: Vec::new(),
                    documents: number_reports(findings),
                }
            }
            Err(e) => file_report(e),
        }
    }

    fn convert_document(&self, group: &[SourceLine]) -> Result<BuiltDocument, ConvertError> {
        let findings = validate_document(group, &self.layout);
        if !findings.is_empty() {
            return Err(ConvertError::Validation(render_findings(&findings)));
        }

        let record = Parser::new(&self.layout)
            .first_item_index(self.config.first_item_index)
            .parse(group)?;

        let mut builder = (self.factory)();
        emit_record(&record, &mut builder)?;
        builder.finish()
    }

    #[cfg(feature = "parallel")]
    fn run_documents<T, G>(&self, documents: &[DocumentGroup], f: G) -> Vec<T>
    where
        T: Send,
        G: Fn(&[SourceLine]) -> T + Sync + Send,
    {
        use rayon::prelude::*;

        if self.config.parallel {
            documents.par_iter().map(|group| f(group.as_slice())).collect()
        } else {
            documents.iter().map(|group| f(group.as_slice())).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn run_documents<T, G>(&self, documents: &[DocumentGroup], f: G) -> Vec<T>
    where
        G: Fn(&[SourceLine]) -> T,
    {
        documents.iter().map(|group| f(group.as_slice())).collect()
    }
}

/// Split and validate a batch without a converter.
pub fn validate_only(input: &[u8], layout: &LayoutConfig) -> ValidationReport {
    match split_batch(input, layout) {
        Ok(batch) => ValidationReport {
            file: Vec::new(),
            documents: number_reports(
                batch
                    .documents
                    .iter()
                    .map(|group| validate_document(group, layout))
                    .collect(),
            ),
        },
        Err(e) => file_report(e),
    }
}

fn number_reports(findings: Vec<Vec<Finding>>) -> Vec<DocumentReport> {
    findings
        .into_iter()
        .enumerate()
        .map(|(i, findings)| DocumentReport {
            position: i + 1,
            findings,
        })
        .collect()
}

fn file_report(error: ConvertError) -> ValidationReport {
    ValidationReport {
        file: vec![Finding::new(0, BATCH_MARKER, error.to_string())],
        documents: Vec::new(),
    }
}
