use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::{Decimal, RoundingStrategy};
use std::io::Cursor;
use std::str::FromStr;

use crate::core::{ConvertError, FieldMap};

fn xml_io(e: std::io::Error) -> ConvertError {
    ConvertError::Xml(format!("XML write error: {e}"))
}

/// Thin event writer over `quick_xml`, unindented as signed documents require.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, ConvertError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, ConvertError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ConvertError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, ConvertError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, ConvertError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write the present fields among `names`, in that order.
    ///
    /// Monetary values are normalized to two decimals.
    pub fn fields(&mut self, fields: &FieldMap, names: &[&str]) -> Result<&mut Self, ConvertError> {
        for name in names {
            if let Some(value) = fields.get(name) {
                self.field(name, value)?;
            }
        }
        Ok(self)
    }

    /// Write fields not listed in any of `known`, in name order.
    pub fn remaining_fields(
        &mut self,
        fields: &FieldMap,
        known: &[&[&str]],
    ) -> Result<&mut Self, ConvertError> {
        for (name, value) in fields.iter() {
            if !known.iter().any(|list| list.contains(&name)) {
                self.field(name, value)?;
            }
        }
        Ok(self)
    }

    fn field(&mut self, name: &str, value: &str) -> Result<&mut Self, ConvertError> {
        if is_monetary(name) {
            let amount = format_amount(name, value)?;
            self.text_element(name, &amount)
        } else {
            self.text_element(name, value)
        }
    }
}

/// Fields holding currency amounts (`vProd`, `vNF`, …). Unit values keep
/// their full precision.
pub fn is_monetary(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('v')
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && !matches!(name, "vUnCom" | "vUnTrib")
}

/// Format an amount with exactly two decimals (half-up).
pub fn format_amount(name: &str, value: &str) -> Result<String, ConvertError> {
    let amount = Decimal::from_str(value)
        .map_err(|_| ConvertError::Build(format!("{name}: '{value}' is not a decimal amount")))?;
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Ok(format!("{rounded:.2}"))
}
