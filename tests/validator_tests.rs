use notafiscal::convert::{ValidationReport, validate_only};
use notafiscal::core::*;

fn v400() -> LayoutConfig {
    LayoutConfig::load("local_v400").unwrap()
}

fn mini() -> LayoutConfig {
    LayoutConfigBuilder::new("mini", "4.00")
        .tag("A", &["versao", "Id"])
        .tag("B", &["cUF", "mod"])
        .tag("C", &["xNome", "CNPJ"])
        .tag("I", &["xProd", "CFOP"])
        .build()
        .unwrap()
}

fn group(layout: &LayoutConfig, text: &str) -> Vec<SourceLine> {
    split_documents(split_lines(text.as_bytes()), layout)
        .into_iter()
        .next()
        .unwrap()
}

fn messages(findings: &[Finding]) -> Vec<String> {
    findings.iter().map(ToString::to_string).collect()
}

// --- Fixtures ---

#[test]
fn fixture_batches_are_valid() {
    let report = validate_only(include_bytes!("fixtures/lote_v400.txt"), &v400());
    assert!(report.is_valid(), "{report}");
    assert_eq!(report.documents.len(), 2);

    let v310 = LayoutConfig::load("local_v310").unwrap();
    let report = validate_only(include_bytes!("fixtures/lote_v310.txt"), &v310);
    assert!(report.is_valid(), "{report}");
}

#[test]
fn fixture_against_wrong_dialect_fails() {
    let v310 = LayoutConfig::load("local_v310").unwrap();
    let report = validate_only(include_bytes!("fixtures/lote_v400.txt"), &v310);
    assert!(!report.is_valid());
    assert!(
        report
            .findings()
            .any(|f| f.tag == "I" && f.message.contains("expected 22, found 23"))
    );
}

// --- Line checks ---

#[test]
fn missing_terminator_stops_line() {
    let findings = validate_document(
        &group(&mini(), "A|4.00||\nB|35|55\nC|Loja|\nI|x|5102|"),
        &mini(),
    );
    assert_eq!(
        messages(&findings),
        [
            "line 2 [B]: line must end with '|'",
            "line 3 [C]: field count mismatch for tag 'C': expected 2, found 1",
        ]
    );
}

#[test]
fn unknown_tag_reported_once() {
    let findings = validate_document(
        &group(&mini(), "A|4.00||\nB|35|55|\nQQ|<x>|\nC|Loja||\nI|x|5102|"),
        &mini(),
    );
    assert_eq!(
        messages(&findings),
        ["line 3 [QQ]: unknown tag 'QQ' in layout 'mini'"]
    );
}

#[test]
fn count_mismatch_still_checks_overlap() {
    let findings = validate_document(
        &group(&mini(), "A|4.00||\nB|99|\nC|Loja||\nI|x|5102|"),
        &mini(),
    );
    assert_eq!(
        messages(&findings),
        [
            "line 2 [B]: field count mismatch for tag 'B': expected 2, found 1",
            "line 2 [B.cUF]: '99' is not an IBGE state code (11-53)",
        ]
    );
}

#[test]
fn prohibited_characters() {
    for bad in ["<", ">", "\"", "'", "\u{1}"] {
        let text = format!("A|4.00||\nB|35|55|\nC|Loja {bad}||\nI|x|5102|");
        let findings = validate_document(&group(&mini(), &text), &mini());
        assert_eq!(findings.len(), 1, "{bad:?}");
        assert_eq!(findings[0].field.as_deref(), Some("xNome"));
    }
}

#[test]
fn empty_values_skip_field_rules() {
    let findings = validate_document(
        &group(&mini(), "A|4.00||\nB|35|   |\nC|Loja||\nI|x||"),
        &mini(),
    );
    assert!(findings.is_empty(), "{findings:?}");
}

#[test]
fn field_rules_on_full_layout() {
    let layout = v400();
    let text = include_str!("fixtures/lote_v400.txt")
        .replace("C02|11222333000181|", "C02|11111111111111|")
        .replace("|01001000|", "|0100100|")
        .replace("|5102|", "|51020|");
    let report = validate_only(text.as_bytes(), &layout);
    let fields: Vec<(&str, Option<&str>)> = report.documents[0]
        .findings
        .iter()
        .map(|f| (f.tag.as_str(), f.field.as_deref()))
        .collect();
    assert_eq!(
        fields,
        [
            ("C02", Some("CNPJ")),
            ("C05", Some("CEP")),
            ("I", Some("CFOP")),
            ("I", Some("CFOP")),
        ]
    );
}

// --- Document checks ---

#[test]
fn missing_required_tags_at_line_zero() {
    let findings = validate_document(&group(&mini(), "A|4.00||\nB|35|55|"), &mini());
    assert_eq!(
        messages(&findings),
        [
            "line 0 [C]: missing required tag 'C' (issuer)",
            "line 0 [I]: missing required tag 'I' (line item)",
        ]
    );
}

#[test]
fn tag_order_uses_first_occurrence() {
    let findings = validate_document(
        &group(&mini(), "A|4.00||\nC|Loja||\nB|35|55|\nI|x|5102|\nC|Outra||"),
        &mini(),
    );
    assert_eq!(
        messages(&findings),
        ["line 2 [C]: tag 'C' (issuer) must not precede tag 'B' (identification)"]
    );
}

#[test]
fn every_finding_is_reported() {
    let findings = validate_document(
        &group(&mini(), "A|9.99||\nB|00|77|\nI|x|5|"),
        &mini(),
    );
    assert_eq!(findings.len(), 5, "{findings:?}");
}

// --- Reports ---

#[test]
fn file_defects_become_file_findings() {
    let report = validate_only(b"NOTAFISCAL|2|\nA|4.00||\n", &mini());
    assert!(!report.is_valid());
    assert!(report.documents.is_empty());
    assert_eq!(
        report.file[0].to_string(),
        "line 0 [NOTAFISCAL]: document count mismatch: header declares 2, found 1"
    );

    let report = validate_only(b"", &mini());
    assert_eq!(report.file.len(), 1);
}

#[test]
fn report_serializes() {
    let report = validate_only(b"NOTAFISCAL|1|\nA|4.00||\nB|35|55|\n", &mini());
    let json = serde_json::to_string(&report).unwrap();
    let back: ValidationReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn report_display() {
    let input = "NOTAFISCAL|2|
A|4.00||
B|99|55|
C|Loja <Centro>|123|
I|Caneta|5102|
A|5.00||
I|Caneta|
B|35|55
";
    let report = validate_only(input.as_bytes(), &mini());
    insta::assert_snapshot!(report.to_string().trim_end(), @r"
    document 1: line 3 [B.cUF]: '99' is not an IBGE state code (11-53)
    document 1: line 4 [C.xNome]: prohibited character '<'
    document 1: line 4 [C.CNPJ]: CNPJ must have 14 digits, got '123'
    document 2: line 6 [A.versao]: version '5.00' is not supported (expected one of 3.10, 4.00)
    document 2: line 7 [I]: field count mismatch for tag 'I': expected 2, found 1
    document 2: line 8 [B]: line must end with '|'
    document 2: line 0 [C]: missing required tag 'C' (issuer)
    ");
}
