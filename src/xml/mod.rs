//! `NFe` XML output (feature `xml`).
//!
//! [`XmlDocumentBuilder`] is a [`DocumentBuilder`](crate::convert::DocumentBuilder)
//! that writes the parsed record as an unsigned `NFe` document in the
//! portal namespace. It does not validate against the XSD.

mod nfe;
mod writer;

pub use nfe::{NFE_NAMESPACE, XmlDocumentBuilder, access_key, check_digit, xml_converter};
pub use writer::{XmlWriter, format_amount, is_monetary};
