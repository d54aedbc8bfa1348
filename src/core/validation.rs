use std::collections::HashMap;

use super::error::Finding;
use super::layout::LayoutConfig;
use super::rules::{check_field, prohibited_char};
use super::tags::{TAG_ORDER, missing_required, section_name, split_line};
use super::types::SourceLine;

/// Validate one document group against a layout.
///
/// Returns every finding (not just the first); the document is valid iff the
/// result is empty.
pub fn validate_document(group: &[SourceLine], layout: &LayoutConfig) -> Vec<Finding> {
    let mut findings = Vec::new();

    for line in group {
        validate_line(line, layout, &mut findings);
    }

    validate_required_tags(group, layout.delimiter(), &mut findings);
    validate_tag_order(group, layout.delimiter(), &mut findings);

    findings
}

fn validate_line(line: &SourceLine, layout: &LayoutConfig, findings: &mut Vec<Finding>) {
    let delimiter = layout.delimiter();

    // A line without its terminator cannot be split reliably.
    let Some(parts) = split_line(&line.text, delimiter) else {
        findings.push(Finding::new(
            line.number,
            line.tag(delimiter),
            format!("line must end with '{delimiter}'"),
        ));
        return;
    };
    let tag = parts.tag;

    let Some(names) = layout.fields(tag) else {
        findings.push(Finding::new(
            line.number,
            tag,
            format!("unknown tag '{tag}' in layout '{}'", layout.name()),
        ));
        return;
    };

    if parts.values.len() != names.len() {
        findings.push(Finding::new(
            line.number,
            tag,
            format!(
                "field count mismatch for tag '{tag}': expected {}, found {}",
                names.len(),
                parts.values.len()
            ),
        ));
    }

    for (name, raw) in names.iter().zip(&parts.values) {
        if let Some(c) = prohibited_char(raw) {
            findings.push(Finding::with_field(
                line.number,
                tag,
                name.as_str(),
                format!("prohibited character {c:?}"),
            ));
        }

        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if let Some(message) = check_field(tag, name, value) {
            findings.push(Finding::with_field(line.number, tag, name.as_str(), message));
        }
    }
}

fn validate_required_tags(group: &[SourceLine], delimiter: char, findings: &mut Vec<Finding>) {
    for tag in missing_required(|t| group.iter().any(|l| l.tag(delimiter) == t)) {
        findings.push(Finding::new(
            0,
            tag,
            format!("missing required tag '{tag}' ({})", section_name(tag)),
        ));
    }
}

fn validate_tag_order(group: &[SourceLine], delimiter: char, findings: &mut Vec<Finding>) {
    // First occurrence of each ordering-relevant tag: (position, line number).
    let mut first_seen: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, line) in group.iter().enumerate() {
        let tag = line.tag(delimiter);
        if TAG_ORDER.iter().any(|(a, b)| *a == tag || *b == tag) {
            first_seen.entry(tag).or_insert((pos, line.number));
        }
    }

    for (earlier, later) in TAG_ORDER {
        if let (Some(&(earlier_pos, _)), Some(&(later_pos, later_line))) =
            (first_seen.get(earlier), first_seen.get(later))
        {
            if later_pos < earlier_pos {
                findings.push(Finding::new(
                    later_line,
                    later,
                    format!(
                        "tag '{later}' ({}) must not precede tag '{earlier}' ({})",
                        section_name(later),
                        section_name(earlier)
                    ),
                ));
            }
        }
    }
}

/// Join findings into a single per-document error string.
pub(crate) fn render_findings(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
