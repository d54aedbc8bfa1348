#![cfg(feature = "xml")]

use notafiscal::convert::ConvertConfigBuilder;
use notafiscal::core::*;
use notafiscal::xml::*;
use quick_xml::Reader;
use quick_xml::events::Event;

const FIXTURE: &str = include_str!("fixtures/lote_v400.txt");

fn v400() -> LayoutConfig {
    LayoutConfig::load("local_v400").unwrap()
}

fn convert(input: &str) -> (Vec<String>, Vec<String>) {
    let result = xml_converter(v400()).convert(input.as_bytes()).unwrap();
    let docs = result
        .outputs
        .into_iter()
        .map(|xml| String::from_utf8(xml).unwrap())
        .collect();
    (docs, result.warnings)
}

/// Text between `<tag>` and the matching `</tag>`, first occurrence.
fn element<'a>(xml: &'a str, tag: &str) -> &'a str {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open).unwrap_or_else(|| panic!("no <{tag}>")) + open.len();
    let end = start + xml[start..].find(&close).unwrap();
    &xml[start..end]
}

fn assert_well_formed(xml: &str) {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => panic!("malformed XML at {}: {e}", reader.buffer_position()),
        }
    }
}

// --- Document shape ---

#[test]
fn fixture_produces_well_formed_documents() {
    let (docs, warnings) = convert(FIXTURE);
    assert_eq!(docs.len(), 2);
    assert!(warnings.is_empty(), "{warnings:?}");
    for xml in &docs {
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<NFe xmlns="http://www.portalfiscal.inf.br/nfe">"#));
        assert!(xml.ends_with("</infNFe></NFe>"));
        assert_well_formed(xml);
    }
}

#[test]
fn header_id_becomes_infnfe_attribute() {
    let (docs, _) = convert(FIXTURE);
    assert!(docs[0].contains(
        r#"<infNFe versao="4.00" Id="NFe35240611222333000181550010000000011123456719">"#
    ));
}

#[test]
fn missing_id_is_derived() {
    let (docs, _) = convert(FIXTURE);
    assert!(docs[1].contains(
        r#"<infNFe versao="4.00" Id="NFe35240611222333000181650010000000021123456727">"#
    ));
    assert_eq!(element(&docs[1], "cDV"), "7");
}

#[test]
fn sections_in_schema_order() {
    let (docs, _) = convert(FIXTURE);
    let xml = &docs[0];
    let order = [
        "<ide>", "<NFref>", "</ide>", "<emit>", "<dest>", "<det nItem=\"1\">",
        "<det nItem=\"2\">", "<total>", "<transp>", "<cobr>", "<pag>", "<infAdic>",
    ];
    let positions: Vec<usize> = order
        .iter()
        .map(|tag| xml.find(tag).unwrap_or_else(|| panic!("missing {tag}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
}

#[test]
fn issuer_with_address() {
    let (docs, _) = convert(FIXTURE);
    assert_eq!(
        element(&docs[0], "emit"),
        "<CNPJ>11222333000181</CNPJ><xNome>Comercio Exemplo Ltda</xNome><xFant>Exemplo</xFant>\
         <enderEmit><xLgr>Rua das Flores</xLgr><nro>100</nro><xBairro>Centro</xBairro>\
         <cMun>3550308</cMun><xMun>Sao Paulo</xMun><UF>SP</UF><CEP>01001000</CEP>\
         <cPais>1058</cPais><xPais>Brasil</xPais></enderEmit><IE>123456789012</IE><CRT>3</CRT>"
    );
}

#[test]
fn item_taxes_grouped() {
    let (docs, _) = convert(FIXTURE);
    assert_eq!(
        element(&docs[0], "imposto"),
        "<vTotTrib>3.50</vTotTrib>\
         <ICMS><ICMS00><orig>0</orig><CST>00</CST><modBC>3</modBC><vBC>25.00</vBC>\
         <pICMS>18.00</pICMS><vICMS>4.50</vICMS></ICMS00></ICMS>\
         <PIS><PISAliq><CST>01</CST><vBC>25.00</vBC><pPIS>1.65</pPIS><vPIS>0.41</vPIS></PISAliq></PIS>\
         <COFINS><COFINSAliq><CST>01</CST><vBC>25.00</vBC><pCOFINS>7.60</pCOFINS>\
         <vCOFINS>1.90</vCOFINS></COFINSAliq></COFINS>"
    );
    assert!(docs[0].contains("</imposto><infAdProd>Lote 42</infAdProd></det>"));
}

#[test]
fn amounts_normalized_unit_values_kept() {
    let (docs, _) = convert(FIXTURE);
    let xml = &docs[0];
    assert!(xml.contains("<vProd>30.00</vProd>"));
    assert!(xml.contains("<vUnCom>2.5000000000</vUnCom>"));
    assert!(xml.contains("<qCom>10.0000</qCom>"));
    assert_eq!(
        element(xml, "ICMSTot"),
        "<vBC>55.00</vBC><vICMS>9.90</vICMS><vProd>55.00</vProd><vPIS>0.41</vPIS>\
         <vCOFINS>1.90</vCOFINS><vNF>55.00</vNF>"
    );
}

#[test]
fn trailing_groups() {
    let (docs, _) = convert(FIXTURE);
    let xml = &docs[0];
    assert_eq!(
        element(xml, "transporta"),
        "<CNPJ>77888999000155</CNPJ><xNome>Transportes Rapidos Ltda</xNome><IE>111222333444</IE>\
         <xEnder>Rodovia SP 330 km 12</xEnder><xMun>Campinas</xMun><UF>SP</UF>"
    );
    assert_eq!(
        element(xml, "cobr"),
        "<fat><nFat>1001</nFat><vOrig>55.00</vOrig><vLiq>55.00</vLiq></fat>\
         <dup><nDup>001</nDup><dVenc>2024-07-15</dVenc><vDup>55.00</vDup></dup>"
    );
    assert_eq!(
        element(xml, "pag"),
        "<detPag><indPag>0</indPag><tPag>01</tPag><vPag>55.00</vPag></detPag>"
    );
    assert_eq!(
        element(xml, "infAdic"),
        r#"<infCpl>Pedido 7788</infCpl><obsCont xCampo="Vendedor"><xTexto>Maria</xTexto></obsCont>"#
    );
}

#[test]
fn v310_payments_are_not_nested() {
    let layout = LayoutConfig::load("local_v310").unwrap();
    let result = xml_converter(layout)
        .convert(include_bytes!("fixtures/lote_v310.txt"))
        .unwrap();
    let xml = String::from_utf8(result.outputs[0].clone()).unwrap();
    assert!(xml.contains(r#"<infNFe versao="3.10""#));
    assert!(xml.contains("<pag><tPag>01</tPag><vPag>55.00</vPag></pag>"));
    assert!(!xml.contains("<detPag>"));
    assert_eq!(element(&xml, "indPag"), "0");
}

#[test]
fn text_is_escaped() {
    let input = FIXTURE.replace("|Exemplo|", "|Exemplo & Cia|");
    let (docs, _) = convert(&input);
    assert!(docs[0].contains("<xFant>Exemplo &amp; Cia</xFant>"));
    assert_well_formed(&docs[0]);
}

// --- Warnings and failures ---

#[test]
fn model_55_without_recipient_warns() {
    let input: String = FIXTURE
        .lines()
        .filter(|l| !l.starts_with('E'))
        .map(|l| format!("{l}\n"))
        .collect();
    let (docs, warnings) = convert(&input);
    assert_eq!(docs.len(), 2);
    assert!(!docs[0].contains("<dest>"));
    assert_eq!(
        warnings,
        ["document 1: model 55 document has no recipient (dest)"]
    );
}

#[test]
fn check_digit_mismatch_warns() {
    // cDV of the first document is 9; make it 3.
    let input = FIXTURE.replacen("|1|1|9|2|", "|1|1|3|2|", 1);
    let (_, warnings) = convert(&input);
    assert_eq!(
        warnings,
        ["document 1: cDV 3 does not match access key check digit 9"]
    );
}

#[test]
fn free_form_id_is_replaced_by_derived_key() {
    let input = FIXTURE.replacen(
        "A|4.00|NFe35240611222333000181550010000000011123456719||",
        "A|4.00|DOC123||",
        1,
    );
    let (docs, warnings) = convert(&input);
    assert!(docs[0].contains(
        r#"<infNFe versao="4.00" Id="NFe35240611222333000181550010000000011123456719">"#
    ));
    assert_eq!(
        warnings,
        ["document 1: Id 'DOC123' is not an access key, deriving one"]
    );
}

#[test]
fn underivable_key_warns() {
    // second document: no Id and no dhEmi
    let input = FIXTURE.replace("|2|2024-06-15T10:30:00-03:00|", "|2||");
    let (docs, warnings) = convert(&input);
    assert!(docs[1].contains(r#"<infNFe versao="4.00">"#));
    assert_eq!(
        warnings,
        ["document 2: access key not derived: missing or malformed dhEmi"]
    );
}

#[test]
fn non_numeric_amount_fails_document() {
    let input = FIXTURE.replacen("|55.00|9.90|", "|55.00|9,90|", 1);
    let result = xml_converter(v400()).convert(input.as_bytes()).unwrap();
    assert_eq!(result.successes, 1);
    assert_eq!(
        result.errors,
        ["document 1: build error: vICMS: '9,90' is not a decimal amount"]
    );
}

#[test]
fn sequential_config_same_output() {
    let parallel = xml_converter(v400()).convert(FIXTURE.as_bytes()).unwrap();
    let sequential = xml_converter(v400())
        .with_config(ConvertConfigBuilder::new().parallel(false).build())
        .convert(FIXTURE.as_bytes())
        .unwrap();
    assert_eq!(parallel, sequential);
}

// --- Access key ---

#[test]
fn access_key_matches_fixture_id() {
    let layout = v400();
    let batch = split_batch(FIXTURE.as_bytes(), &layout).unwrap();
    let record = parse_document(&batch.documents[0], &layout).unwrap();
    let key = access_key(
        record.identification.as_ref().unwrap(),
        record.issuer.as_ref().unwrap(),
    )
    .unwrap();
    assert_eq!(
        format!("NFe{key}"),
        record.header.unwrap().id.unwrap()
    );
}
