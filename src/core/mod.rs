//! Layouts, batch splitting, validation and parsing.
//!
//! This module turns TXT layout input into [`NfeRecord`]s. It never emits
//! XML; see [`crate::convert`] for the builder hand-off.

mod error;
mod layout;
mod parser;
pub mod rules;
mod splitter;
pub mod tags;
mod types;
mod validation;

pub use error::*;
pub use layout::*;
pub use parser::*;
pub use splitter::*;
pub use types::*;
pub use validation::*;

pub(crate) use validation::render_findings;
