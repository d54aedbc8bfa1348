use crate::core::*;

/// Output of a [`DocumentBuilder`] for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltDocument {
    /// Serialized XML.
    pub xml: Vec<u8>,
    /// Non-fatal remarks about the document.
    pub warnings: Vec<String>,
}

/// Receiver of a parsed record, one call per section.
///
/// Implementations own everything schema-specific: element order, number and
/// date formatting, derived fields such as check digits. A fresh builder is
/// created for every document. Errors returned here become that document's
/// error in the batch result.
pub trait DocumentBuilder {
    fn header(&mut self, header: &Header) -> Result<(), ConvertError>;

    fn identification(&mut self, identification: &FieldMap) -> Result<(), ConvertError>;

    fn issuer(&mut self, issuer: &Party) -> Result<(), ConvertError>;

    /// Called only when the document has a recipient.
    fn recipient(&mut self, recipient: &Party) -> Result<(), ConvertError>;

    /// Called once per item, in item order.
    fn item(&mut self, item: &LineItem) -> Result<(), ConvertError>;

    fn references(&mut self, _references: &[Reference]) -> Result<(), ConvertError> {
        Ok(())
    }

    fn totals(&mut self, _totals: &FieldMap) -> Result<(), ConvertError> {
        Ok(())
    }

    fn transport(&mut self, _transport: &Transport) -> Result<(), ConvertError> {
        Ok(())
    }

    fn billing(&mut self, _billing: &Billing) -> Result<(), ConvertError> {
        Ok(())
    }

    fn payments(&mut self, _payments: &[FieldMap]) -> Result<(), ConvertError> {
        Ok(())
    }

    fn notes(&mut self, _notes: &Notes) -> Result<(), ConvertError> {
        Ok(())
    }

    /// Produce the document once every section has been delivered.
    fn finish(self) -> Result<BuiltDocument, ConvertError>
    where
        Self: Sized;
}

/// Deliver a record to a builder, section by section.
///
/// Optional sections are skipped when absent or empty.
pub fn emit_record<B: DocumentBuilder + ?Sized>(
    record: &NfeRecord,
    builder: &mut B,
) -> Result<(), ConvertError> {
    let missing = |section: &str| ConvertError::Build(format!("record has no {section}"));

    builder.header(record.header.as_ref().ok_or_else(|| missing("header"))?)?;
    builder.identification(
        record
            .identification
            .as_ref()
            .ok_or_else(|| missing("identification"))?,
    )?;
    if !record.references.is_empty() {
        builder.references(&record.references)?;
    }
    builder.issuer(record.issuer.as_ref().ok_or_else(|| missing("issuer"))?)?;
    if let Some(recipient) = &record.recipient {
        builder.recipient(recipient)?;
    }
    for item in &record.items {
        builder.item(item)?;
    }
    if let Some(totals) = &record.totals {
        builder.totals(totals)?;
    }
    if let Some(transport) = &record.transport {
        builder.transport(transport)?;
    }
    if let Some(billing) = &record.billing {
        builder.billing(billing)?;
    }
    if !record.payments.is_empty() {
        builder.payments(&record.payments)?;
    }
    if let Some(notes) = &record.notes {
        builder.notes(notes)?;
    }
    Ok(())
}
