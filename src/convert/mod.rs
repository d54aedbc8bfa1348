//! Batch conversion: split → validate → parse → builder hand-off.
//!
//! The engine never writes XML itself. Each parsed record is delivered to a
//! [`DocumentBuilder`], one call per section; the `xml` feature provides a
//! ready-made builder in [`crate::xml`].
//!
//! Documents are independent once the batch header count has been checked:
//! a document that fails validation is skipped and reported, its siblings
//! still convert. With the `parallel` feature the documents are spread over
//! the rayon pool and collected back in batch order.

mod batch;
mod builder;
mod config;

pub use batch::{BatchResult, Converter, DocumentReport, ValidationReport, validate_only};
pub use builder::{BuiltDocument, DocumentBuilder, emit_record};
pub use config::{ConvertConfig, ConvertConfigBuilder};
