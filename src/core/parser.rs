//! Fail-fast extraction of an [`NfeRecord`] from one document group.
//!
//! Parsing assumes the group already passed validation: the first structural
//! defect aborts the document. Every call builds its record in a fresh
//! [`ParseState`], so one [`Parser`] can serve any number of threads.

use std::collections::HashSet;

use super::error::ConvertError;
use super::layout::LayoutConfig;
use super::tags::{missing_required, section_name, split_line};
use super::types::*;

/// Handler for one tag: folds the line's fields into the record under construction.
type Handler = fn(&mut ParseState, &str, FieldMap) -> Result<(), String>;

/// Tag → handler table. Tags known to the layout but missing here are ignored.
const HANDLERS: &[(&str, Handler)] = &[
    ("A", header),
    ("B", identification),
    ("BA02", reference),
    ("BA03", reference),
    ("BA10", reference),
    ("BA19", reference),
    ("BA20", reference),
    ("BA13", reference_party),
    ("BA14", reference_party),
    ("C", issuer),
    ("C02", issuer),
    ("C02a", issuer),
    ("C05", issuer_address),
    ("E", recipient),
    ("E02", recipient),
    ("E03", recipient),
    ("E03a", recipient),
    ("E05", recipient_address),
    ("H", item_header),
    ("I", item),
    ("I05A", item_detail),
    ("I05C", item_detail),
    ("M", item_detail),
    ("N02", item_detail),
    ("N03", item_detail),
    ("N06", item_detail),
    ("N10c", item_detail),
    ("N10d", item_detail),
    ("N10h", item_detail),
    ("O", item_detail),
    ("O07", item_detail),
    ("O08", item_detail),
    ("O10", item_detail),
    ("Q02", item_detail),
    ("Q04", item_detail),
    ("Q05", item_detail),
    ("S02", item_detail),
    ("S04", item_detail),
    ("S05", item_detail),
    ("W02", totals),
    ("X", transport),
    ("X03", carrier),
    ("X04", carrier),
    ("X05", carrier),
    ("X18", vehicle),
    ("X26", volume),
    ("Y02", billing_invoice),
    ("Y07", installment),
    ("YA", payment),
    ("Z", notes),
    ("Z04", taxpayer_observation),
    ("Z07", fiscal_observation),
    ("Z10", process_reference),
];

fn handler_for(tag: &str) -> Option<Handler> {
    HANDLERS.iter().find(|(t, _)| *t == tag).map(|(_, h)| *h)
}

/// Per-call accumulator.
struct ParseState {
    record: NfeRecord,
    next_index: u32,
    pending_info: Option<String>,
}

impl ParseState {
    fn new(first_item_index: u32) -> Self {
        Self {
            record: NfeRecord::default(),
            next_index: first_item_index,
            pending_info: None,
        }
    }
}

/// Parser bound to one layout.
#[derive(Debug, Clone, Copy)]
pub struct Parser<'a> {
    layout: &'a LayoutConfig,
    first_item_index: u32,
}

impl<'a> Parser<'a> {
    pub fn new(layout: &'a LayoutConfig) -> Self {
        Self {
            layout,
            first_item_index: 1,
        }
    }

    /// Index given to the first item when no item header sets one.
    pub fn first_item_index(mut self, index: u32) -> Self {
        self.first_item_index = index;
        self
    }

    /// Parse one document group into a fresh record.
    pub fn parse(&self, group: &[SourceLine]) -> Result<NfeRecord, ConvertError> {
        let delimiter = self.layout.delimiter();
        let mut state = ParseState::new(self.first_item_index);
        let mut seen: HashSet<&str> = HashSet::new();

        for line in group {
            let parts = split_line(&line.text, delimiter).ok_or_else(|| {
                ConvertError::parse(
                    line.number,
                    line.tag(delimiter),
                    format!("line must end with '{delimiter}'"),
                )
            })?;
            let tag = parts.tag;

            let names = self.layout.fields(tag).ok_or_else(|| {
                ConvertError::parse(
                    line.number,
                    tag,
                    format!("unknown tag '{tag}' in layout '{}'", self.layout.name()),
                )
            })?;

            if parts.values.len() != names.len() {
                return Err(ConvertError::parse(
                    line.number,
                    tag,
                    format!(
                        "field count mismatch for tag '{tag}': expected {}, found {}",
                        names.len(),
                        parts.values.len()
                    ),
                ));
            }

            let fields = FieldMap::from_positional(names, &parts.values);
            seen.insert(tag);

            match handler_for(tag) {
                Some(handler) => handler(&mut state, tag, fields)
                    .map_err(|message| ConvertError::parse(line.number, tag, message))?,
                None => tracing::trace!(tag, line = line.number, "tag has no handler, ignored"),
            }
        }

        if let Some(tag) = missing_required(|t| seen.contains(t)).next() {
            return Err(ConvertError::parse(
                0,
                tag,
                format!("missing required section: {} (tag '{tag}')", section_name(tag)),
            ));
        }

        Ok(state.record)
    }
}

/// Parse one document group with default settings.
pub fn parse_document(
    group: &[SourceLine],
    layout: &LayoutConfig,
) -> Result<NfeRecord, ConvertError> {
    Parser::new(layout).parse(group)
}

// --- Handlers ---

fn header(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state.record.header = Some(Header {
        version: fields.get("versao").map(String::from),
        id: fields.get("Id").map(String::from),
    });
    Ok(())
}

fn identification(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .identification
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn issuer(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .issuer
        .get_or_insert_with(Party::default)
        .fields
        .merge(fields);
    Ok(())
}

fn issuer_address(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .issuer
        .get_or_insert_with(Party::default)
        .address
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn recipient(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .recipient
        .get_or_insert_with(Party::default)
        .fields
        .merge(fields);
    Ok(())
}

fn recipient_address(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .recipient
        .get_or_insert_with(Party::default)
        .address
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn reference(state: &mut ParseState, tag: &str, fields: FieldMap) -> Result<(), String> {
    let kind = ReferenceKind::from_tag(tag).ok_or_else(|| format!("'{tag}' is not a reference tag"))?;
    state.record.references.push(Reference { kind, fields });
    Ok(())
}

/// Producer CNPJ/CPF of the preceding rural producer reference.
fn reference_party(state: &mut ParseState, tag: &str, fields: FieldMap) -> Result<(), String> {
    match state.record.references.last_mut() {
        Some(last) => last.fields.merge(fields),
        None => tracing::trace!(tag, "producer id without a referenced document, ignored"),
    }
    Ok(())
}

fn item_header(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    if let Some(item) = fields.get("item") {
        state.next_index = item
            .parse()
            .map_err(|_| format!("item number '{item}' is not a positive integer"))?;
    }
    state.pending_info = fields.get("infAdProd").map(String::from);
    Ok(())
}

fn item(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state.record.items.push(LineItem {
        index: state.next_index,
        product: fields,
        additional_info: state.pending_info.take(),
        details: Vec::new(),
    });
    state.next_index = state.next_index.saturating_add(1);
    Ok(())
}

/// Tax and product sub-groups belong to the most recent item.
fn item_detail(state: &mut ParseState, tag: &str, fields: FieldMap) -> Result<(), String> {
    match state.record.items.last_mut() {
        Some(item) => item.details.push(ItemDetail {
            tag: tag.to_string(),
            fields,
        }),
        None => tracing::trace!(tag, "item detail before any item, ignored"),
    }
    Ok(())
}

fn totals(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .totals
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn transport(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .transport
        .get_or_insert_with(Transport::default)
        .fields
        .merge(fields);
    Ok(())
}

fn carrier(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .transport
        .get_or_insert_with(Transport::default)
        .carrier
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn vehicle(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .transport
        .get_or_insert_with(Transport::default)
        .vehicle
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn volume(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .transport
        .get_or_insert_with(Transport::default)
        .volumes
        .push(fields);
    Ok(())
}

fn billing_invoice(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .billing
        .get_or_insert_with(Billing::default)
        .invoice
        .get_or_insert_with(FieldMap::new)
        .merge(fields);
    Ok(())
}

fn installment(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .billing
        .get_or_insert_with(Billing::default)
        .installments
        .push(fields);
    Ok(())
}

fn payment(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state.record.payments.push(fields);
    Ok(())
}

fn notes(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .notes
        .get_or_insert_with(Notes::default)
        .fields
        .merge(fields);
    Ok(())
}

fn taxpayer_observation(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .notes
        .get_or_insert_with(Notes::default)
        .taxpayer_observations
        .push(fields);
    Ok(())
}

fn fiscal_observation(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .notes
        .get_or_insert_with(Notes::default)
        .fiscal_observations
        .push(fields);
    Ok(())
}

fn process_reference(state: &mut ParseState, _tag: &str, fields: FieldMap) -> Result<(), String> {
    state
        .record
        .notes
        .get_or_insert_with(Notes::default)
        .processes
        .push(fields);
    Ok(())
}
