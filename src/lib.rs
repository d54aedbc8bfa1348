//! # notafiscal
//!
//! Conversion engine for the Brazilian NF-e/NFC-e "TXT layout": a
//! pipe-delimited, tag-per-line flat file carrying one or more fiscal
//! documents, turned into validated records and handed to an XML builder.
//!
//! The pipeline is split → validate → parse → build. Layout dialects are
//! data ([`LayoutConfig`](crate::core::LayoutConfig)); nothing in the engine
//! branches on a dialect name.
//!
//! ## Quick Start
//!
//! ```rust
//! use notafiscal::convert::validate_only;
//! use notafiscal::core::*;
//!
//! let layout = LayoutConfig::load("local_v400").unwrap();
//! let input = b"NOTAFISCAL|1|\nA|4.00|||\nB|35|\nC|Loja Exemplo|\n";
//! let report = validate_only(input, &layout);
//!
//! assert!(!report.is_valid());
//! let finding = report.findings().next().unwrap();
//! assert_eq!(finding.tag, "B");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Layouts, splitter, validator, parser, batch converter |
//! | `xml` | Reference `NFe` XML builder (`quick-xml`, `rust_decimal`) |
//! | `parallel` | Convert the documents of a batch on the `rayon` pool |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod convert;

#[cfg(feature = "xml")]
pub mod xml;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
