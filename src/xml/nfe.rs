use super::writer::XmlWriter;
use crate::convert::{BuiltDocument, Converter, DocumentBuilder};
use crate::core::*;

pub const NFE_NAMESPACE: &str = "http://www.portalfiscal.inf.br/nfe";

const KEY_PREFIX: &str = "NFe";
const KEY_LEN: usize = 44;
const DEFAULT_VERSION: &str = "4.00";

const IDE_FIELDS: &[&str] = &[
    "cUF", "cNF", "natOp", "indPag", "mod", "serie", "nNF", "dhEmi", "dhSaiEnt", "tpNF",
    "idDest", "cMunFG", "tpImp", "tpEmis", "cDV", "tpAmb", "finNFe", "indFinal", "indPres",
    "indIntermed", "procEmi", "verProc", "dhCont", "xJust",
];

const REFERENCE_FIELDS: &[&str] = &[
    "cUF", "AAMM", "CNPJ", "CPF", "IE", "mod", "serie", "nNF", "nECF", "nCOO",
];

// Party children before and after the address element.
const PARTY_HEAD: &[&str] = &["CNPJ", "CPF", "idEstrangeiro", "xNome", "xFant"];
const PARTY_TAIL: &[&str] = &["indIEDest", "IE", "IEST", "ISUF", "IM", "CNAE", "CRT", "email"];

const ADDRESS_FIELDS: &[&str] = &[
    "xLgr", "nro", "xCpl", "xBairro", "cMun", "xMun", "UF", "CEP", "cPais", "xPais", "fone",
];

const PRODUCT_FIELDS: &[&str] = &[
    "cProd", "cEAN", "xProd", "NCM", "NVE", "CEST", "indEscala", "CNPJFab", "cBenef", "EXTIPI",
    "CFOP", "uCom", "qCom", "vUnCom", "vProd", "cEANTrib", "uTrib", "qTrib", "vUnTrib",
    "vFrete", "vSeg", "vDesc", "vOutro", "indTot", "xPed", "nItemPed", "nFCI",
];

/// Detail tags merged into `prod` rather than `imposto`.
const PRODUCT_DETAIL_TAGS: &[&str] = &["I05A", "I05C"];

const TOTAL_FIELDS: &[&str] = &[
    "vBC", "vICMS", "vICMSDeson", "vFCP", "vBCST", "vST", "vFCPST", "vFCPSTRet", "vProd",
    "vFrete", "vSeg", "vDesc", "vII", "vIPI", "vIPIDevol", "vPIS", "vCOFINS", "vOutro", "vNF",
    "vTotTrib",
];

const CARRIER_FIELDS: &[&str] = &["CNPJ", "CPF", "xNome", "IE", "xEnder", "xMun", "UF"];
const VEHICLE_FIELDS: &[&str] = &["placa", "UF", "RNTC"];
const VOLUME_FIELDS: &[&str] = &["qVol", "esp", "marca", "nVol", "pesoL", "pesoB"];
const INVOICE_FIELDS: &[&str] = &["nFat", "vOrig", "vDesc", "vLiq"];
const INSTALLMENT_FIELDS: &[&str] = &["nDup", "dVenc", "vDup"];
const PAYMENT_FIELDS: &[&str] = &["indPag", "tPag", "xPag", "vPag"];
const CARD_FIELDS: &[&str] = &["tpIntegra", "CNPJ", "tBand", "cAut"];
const PROCESS_FIELDS: &[&str] = &["nProc", "indProc"];

/// Tax groups in `imposto` order.
const TAX_GROUPS: &[&str] = &["ICMS", "IPI", "PIS", "COFINS"];

/// Item detail tag → (tax group, variant element). `None` marks fields that
/// sit directly under the group element.
const TAX_DETAILS: &[(&str, &str, Option<&str>)] = &[
    ("N02", "ICMS", Some("ICMS00")),
    ("N03", "ICMS", Some("ICMS10")),
    ("N06", "ICMS", Some("ICMS40")),
    ("N10c", "ICMS", Some("ICMSSN101")),
    ("N10d", "ICMS", Some("ICMSSN102")),
    ("N10h", "ICMS", Some("ICMSSN900")),
    ("O", "IPI", None),
    ("O07", "IPI", Some("IPITrib")),
    ("O10", "IPI", Some("IPITrib")),
    ("O08", "IPI", Some("IPINT")),
    ("Q02", "PIS", Some("PISAliq")),
    ("Q04", "PIS", Some("PISNT")),
    ("Q05", "PIS", Some("PISOutr")),
    ("S02", "COFINS", Some("COFINSAliq")),
    ("S04", "COFINS", Some("COFINSNT")),
    ("S05", "COFINS", Some("COFINSOutr")),
];

const ICMS_FIELDS: &[&str] = &[
    "orig", "CST", "CSOSN", "modBC", "vBC", "pRedBC", "pICMS", "vICMS", "vBCFCP", "pFCP",
    "vFCP", "modBCST", "pMVAST", "pRedBCST", "vBCST", "pICMSST", "vICMSST", "vBCFCPST",
    "pFCPST", "vFCPST", "vICMSDeson", "motDesICMS", "pCredSN", "vCredICMSSN",
];
const IPI_HEAD_FIELDS: &[&str] = &["clEnq", "CNPJProd", "cSelo", "qSelo", "cEnq"];
const IPI_FIELDS: &[&str] = &["CST", "vBC", "pIPI", "vIPI"];
const PIS_FIELDS: &[&str] = &["CST", "vBC", "pPIS", "vPIS"];
const COFINS_FIELDS: &[&str] = &["CST", "vBC", "pCOFINS", "vCOFINS"];

fn variant_fields(group: &str) -> &'static [&'static str] {
    match group {
        "ICMS" => ICMS_FIELDS,
        "IPI" => IPI_FIELDS,
        "PIS" => PIS_FIELDS,
        _ => COFINS_FIELDS,
    }
}

/// [`DocumentBuilder`] writing an `NFe` document.
///
/// Sections are written as they arrive, so they must come in
/// [`emit_record`](crate::convert::emit_record) order. The `infNFe` element
/// is opened once the issuer is known; at that point the access key is taken
/// from the header `Id` when that holds one, or derived from the
/// identification and issuer fields.
///
/// Monetary values are normalized to two decimals; a value that is not a
/// decimal number fails the document.
#[derive(Default)]
pub struct XmlDocumentBuilder {
    writer: Option<XmlWriter>,
    header: Header,
    identification: FieldMap,
    references: Vec<Reference>,
    has_recipient: bool,
    warnings: Vec<String>,
}

impl XmlDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn version(&self) -> &str {
        self.header.version.as_deref().unwrap_or(DEFAULT_VERSION)
    }

    fn writer(&mut self) -> Result<&mut XmlWriter, ConvertError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ConvertError::Build("section delivered before the issuer".into()))
    }

    /// Open `NFe`/`infNFe` and write `ide`.
    fn open(&mut self, issuer: &Party) -> Result<(), ConvertError> {
        let given = self.header.id.as_deref().filter(|id| !id.is_empty());
        let key = match given.map(|id| id.strip_prefix(KEY_PREFIX).unwrap_or(id)) {
            Some(key) if is_access_key(key) => Some(key.to_string()),
            _ => {
                if let Some(id) = given {
                    self.warnings
                        .push(format!("Id '{id}' is not an access key, deriving one"));
                }
                match access_key(&self.identification, issuer) {
                    Ok(key) => Some(key),
                    Err(missing) => {
                        self.warnings.push(format!(
                            "access key not derived: missing or malformed {missing}"
                        ));
                        None
                    }
                }
            }
        };

        let mut ide = self.identification.clone();
        if let Some(dv) = key.as_deref().and_then(|k| k.chars().last()) {
            let dv = dv.to_string();
            match ide.get("cDV") {
                Some(given) if given != dv => {
                    self.warnings.push(format!(
                        "cDV {given} does not match access key check digit {dv}"
                    ));
                }
                Some(_) => {}
                None => ide.insert("cDV", &dv),
            }
        }

        let mut w = XmlWriter::new()?;
        w.start_element_with_attrs("NFe", &[("xmlns", NFE_NAMESPACE)])?;
        let version = self.version().to_string();
        match &key {
            Some(key) => {
                let id = format!("{KEY_PREFIX}{key}");
                w.start_element_with_attrs(
                    "infNFe",
                    &[("versao", version.as_str()), ("Id", id.as_str())],
                )?;
            }
            None => {
                w.start_element_with_attrs("infNFe", &[("versao", version.as_str())])?;
            }
        }

        w.start_element("ide")?;
        w.fields(&ide, IDE_FIELDS)?;
        w.remaining_fields(&ide, &[IDE_FIELDS])?;
        for reference in &self.references {
            write_reference(&mut w, reference)?;
        }
        w.end_element("ide")?;

        self.writer = Some(w);
        Ok(())
    }

    fn write_tax(&mut self, item: &LineItem) -> Result<(), ConvertError> {
        struct TaxGroup {
            name: &'static str,
            head: FieldMap,
            variant: Option<(&'static str, FieldMap)>,
        }

        let mut groups: Vec<TaxGroup> = Vec::new();
        for detail in &item.details {
            let Some(&(_, group, variant)) = TAX_DETAILS.iter().find(|(t, _, _)| *t == detail.tag)
            else {
                continue;
            };
            let idx = match groups.iter().position(|g| g.name == group) {
                Some(idx) => idx,
                None => {
                    groups.push(TaxGroup {
                        name: group,
                        head: FieldMap::new(),
                        variant: None,
                    });
                    groups.len() - 1
                }
            };
            let entry = &mut groups[idx];
            match (variant, &mut entry.variant) {
                (None, _) => entry.head.merge(detail.fields.clone()),
                (Some(name), None) => entry.variant = Some((name, detail.fields.clone())),
                (Some(name), Some((current, fields))) if *current == name => {
                    fields.merge(detail.fields.clone())
                }
                (Some(_), Some(_)) => self.warnings.push(format!(
                    "item {}: second {group} group ({}) ignored",
                    item.index, detail.tag
                )),
            }
        }
        groups.sort_by_key(|g| TAX_GROUPS.iter().position(|n| *n == g.name));

        let w = self.writer()?;
        w.start_element("imposto")?;
        if let Some(m) = item.detail("M") {
            w.fields(m, &["vTotTrib"])?;
        }
        for group in &groups {
            w.start_element(group.name)?;
            w.fields(&group.head, IPI_HEAD_FIELDS)?;
            if let Some((name, fields)) = &group.variant {
                w.start_element(name)?;
                w.fields(fields, variant_fields(group.name))?;
                w.end_element(name)?;
            }
            w.end_element(group.name)?;
        }
        w.end_element("imposto")?;
        Ok(())
    }
}

impl DocumentBuilder for XmlDocumentBuilder {
    fn header(&mut self, header: &Header) -> Result<(), ConvertError> {
        if header.version.is_none() {
            self.warnings
                .push(format!("no versao in header, assuming {DEFAULT_VERSION}"));
        }
        self.header = header.clone();
        Ok(())
    }

    fn identification(&mut self, identification: &FieldMap) -> Result<(), ConvertError> {
        self.identification = identification.clone();
        Ok(())
    }

    fn references(&mut self, references: &[Reference]) -> Result<(), ConvertError> {
        self.references = references.to_vec();
        Ok(())
    }

    fn issuer(&mut self, issuer: &Party) -> Result<(), ConvertError> {
        if self.writer.is_some() {
            return Err(ConvertError::Build("issuer delivered twice".into()));
        }
        self.open(issuer)?;
        write_party(self.writer()?, "emit", "enderEmit", issuer)
    }

    fn recipient(&mut self, recipient: &Party) -> Result<(), ConvertError> {
        self.has_recipient = true;
        write_party(self.writer()?, "dest", "enderDest", recipient)
    }

    fn item(&mut self, item: &LineItem) -> Result<(), ConvertError> {
        let mut product = item.product.clone();
        for tag in PRODUCT_DETAIL_TAGS {
            if let Some(fields) = item.detail(tag) {
                product.merge(fields.clone());
            }
        }

        let index = item.index.to_string();
        let w = self.writer()?;
        w.start_element_with_attrs("det", &[("nItem", index.as_str())])?;
        w.start_element("prod")?;
        w.fields(&product, PRODUCT_FIELDS)?;
        w.end_element("prod")?;
        self.write_tax(item)?;
        let w = self.writer()?;
        if let Some(info) = &item.additional_info {
            w.text_element("infAdProd", info)?;
        }
        w.end_element("det")?;
        Ok(())
    }

    fn totals(&mut self, totals: &FieldMap) -> Result<(), ConvertError> {
        let w = self.writer()?;
        w.start_element("total")?;
        w.start_element("ICMSTot")?;
        w.fields(totals, TOTAL_FIELDS)?;
        w.end_element("ICMSTot")?;
        w.end_element("total")?;
        Ok(())
    }

    fn transport(&mut self, transport: &Transport) -> Result<(), ConvertError> {
        let w = self.writer()?;
        w.start_element("transp")?;
        w.fields(&transport.fields, &["modFrete"])?;
        if let Some(carrier) = &transport.carrier {
            w.start_element("transporta")?;
            w.fields(carrier, CARRIER_FIELDS)?;
            w.end_element("transporta")?;
        }
        if let Some(vehicle) = &transport.vehicle {
            w.start_element("veicTransp")?;
            w.fields(vehicle, VEHICLE_FIELDS)?;
            w.end_element("veicTransp")?;
        }
        for volume in &transport.volumes {
            w.start_element("vol")?;
            w.fields(volume, VOLUME_FIELDS)?;
            w.end_element("vol")?;
        }
        w.end_element("transp")?;
        Ok(())
    }

    fn billing(&mut self, billing: &Billing) -> Result<(), ConvertError> {
        let w = self.writer()?;
        w.start_element("cobr")?;
        if let Some(invoice) = &billing.invoice {
            w.start_element("fat")?;
            w.fields(invoice, INVOICE_FIELDS)?;
            w.end_element("fat")?;
        }
        for installment in &billing.installments {
            w.start_element("dup")?;
            w.fields(installment, INSTALLMENT_FIELDS)?;
            w.end_element("dup")?;
        }
        w.end_element("cobr")?;
        Ok(())
    }

    fn payments(&mut self, payments: &[FieldMap]) -> Result<(), ConvertError> {
        // 3.10 repeats `pag` per payment; 4.00 nests `detPag` in one `pag`.
        let nested = self.version() != "3.10";
        let w = self.writer()?;
        if nested {
            w.start_element("pag")?;
        }
        let element = if nested { "detPag" } else { "pag" };
        for payment in payments {
            w.start_element(element)?;
            w.fields(payment, PAYMENT_FIELDS)?;
            if CARD_FIELDS.iter().any(|f| payment.contains(f)) {
                w.start_element("card")?;
                w.fields(payment, CARD_FIELDS)?;
                w.end_element("card")?;
            }
            w.end_element(element)?;
        }
        if nested {
            w.end_element("pag")?;
        }
        Ok(())
    }

    fn notes(&mut self, notes: &Notes) -> Result<(), ConvertError> {
        let w = self.writer()?;
        w.start_element("infAdic")?;
        w.fields(&notes.fields, &["infAdFisco", "infCpl"])?;
        for (element, entries) in [
            ("obsCont", &notes.taxpayer_observations),
            ("obsFisco", &notes.fiscal_observations),
        ] {
            for entry in entries {
                let field = entry.get("xCampo").unwrap_or_default();
                w.start_element_with_attrs(element, &[("xCampo", field)])?;
                w.fields(entry, &["xTexto"])?;
                w.end_element(element)?;
            }
        }
        for process in &notes.processes {
            w.start_element("procRef")?;
            w.fields(process, PROCESS_FIELDS)?;
            w.end_element("procRef")?;
        }
        w.end_element("infAdic")?;
        Ok(())
    }

    fn finish(mut self) -> Result<BuiltDocument, ConvertError> {
        if !self.has_recipient && self.identification.get("mod") == Some("55") {
            self.warnings
                .push("model 55 document has no recipient (dest)".to_string());
        }
        let mut w = self
            .writer
            .take()
            .ok_or_else(|| ConvertError::Build("document has no issuer".into()))?;
        w.end_element("infNFe")?;
        w.end_element("NFe")?;
        Ok(BuiltDocument {
            xml: w.into_bytes(),
            warnings: self.warnings,
        })
    }
}

fn write_reference(w: &mut XmlWriter, reference: &Reference) -> Result<(), ConvertError> {
    let element = reference.kind.element();
    w.start_element("NFref")?;
    match reference.kind {
        ReferenceKind::Nfe | ReferenceKind::Cte => {
            w.fields(&reference.fields, &[element])?;
        }
        ReferenceKind::Nf | ReferenceKind::Nfp | ReferenceKind::Ecf => {
            w.start_element(element)?;
            w.fields(&reference.fields, REFERENCE_FIELDS)?;
            w.end_element(element)?;
        }
    }
    w.end_element("NFref")?;
    Ok(())
}

fn write_party(
    w: &mut XmlWriter,
    element: &str,
    address_element: &str,
    party: &Party,
) -> Result<(), ConvertError> {
    w.start_element(element)?;
    w.fields(&party.fields, PARTY_HEAD)?;
    if let Some(address) = &party.address {
        w.start_element(address_element)?;
        w.fields(address, ADDRESS_FIELDS)?;
        w.end_element(address_element)?;
    }
    w.fields(&party.fields, PARTY_TAIL)?;
    w.end_element(element)?;
    Ok(())
}

/// Derive the 44-digit access key from identification and issuer fields.
///
/// Layout: `cUF`(2) `AAMM`(4) `CNPJ`(14) `mod`(2) `serie`(3) `nNF`(9)
/// `tpEmis`(1) `cNF`(8) `cDV`(1). A CPF issuer is left-padded to 14 digits.
/// Returns the name of the first missing or malformed component.
pub fn access_key(ide: &FieldMap, issuer: &Party) -> Result<String, &'static str> {
    fn digits(value: Option<&str>, width: usize, name: &'static str) -> Result<String, &'static str> {
        match value {
            Some(v) if !v.is_empty() && v.len() <= width && v.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(format!("{v:0>width$}"))
            }
            _ => Err(name),
        }
    }

    let year_month = ide
        .get("dhEmi")
        .and_then(|d| Some(format!("{}{}", d.get(2..4)?, d.get(5..7)?)))
        .filter(|ym| ym.bytes().all(|b| b.is_ascii_digit()))
        .ok_or("dhEmi")?;
    let taxpayer = issuer
        .fields
        .get("CNPJ")
        .or_else(|| issuer.fields.get("CPF"));

    let mut key = String::with_capacity(KEY_LEN);
    key.push_str(&digits(ide.get("cUF"), 2, "cUF")?);
    key.push_str(&year_month);
    key.push_str(&digits(taxpayer, 14, "CNPJ")?);
    key.push_str(&digits(ide.get("mod"), 2, "mod")?);
    key.push_str(&digits(ide.get("serie"), 3, "serie")?);
    key.push_str(&digits(ide.get("nNF"), 9, "nNF")?);
    key.push_str(&digits(ide.get("tpEmis"), 1, "tpEmis")?);
    key.push_str(&digits(ide.get("cNF"), 8, "cNF")?);
    key.push(check_digit(&key).ok_or("cDV")?);
    Ok(key)
}

fn is_access_key(value: &str) -> bool {
    value.len() == KEY_LEN && value.bytes().all(|b| b.is_ascii_digit())
}

/// Modulo-11 check digit over the 43 leading key digits, weights 2..=9
/// cycling from the right. `None` if `digits` holds anything but ASCII digits.
pub fn check_digit(digits: &str) -> Option<char> {
    let mut sum = 0u32;
    for (c, weight) in digits.chars().rev().zip((2..=9).cycle()) {
        sum += c.to_digit(10)? * weight;
    }
    let dv = match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    };
    char::from_digit(dv, 10)
}

/// A converter producing `NFe` XML for `layout`.
pub fn xml_converter(layout: LayoutConfig) -> Converter<fn() -> XmlDocumentBuilder> {
    Converter::new(layout, XmlDocumentBuilder::new as fn() -> XmlDocumentBuilder)
}
