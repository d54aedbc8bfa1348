use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One non-blank input line with its 1-based position in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    pub number: usize,
    pub text: String,
}

impl SourceLine {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }

    /// The leading tag token (everything before the first delimiter).
    pub fn tag(&self, delimiter: char) -> &str {
        self.text
            .split_once(delimiter)
            .map_or(self.text.as_str(), |(tag, _)| tag)
    }
}

/// Field name → present value for a single line.
///
/// Values are trimmed; empty values are never stored, so absence is the only
/// "no value" signal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(BTreeMap<String, String>);

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair names with positional values, dropping empty ones.
    ///
    /// Extra names or values beyond the shorter of the two are ignored.
    pub fn from_positional<N, V>(names: &[N], values: &[V]) -> Self
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = Self::new();
        for (name, value) in names.iter().zip(values) {
            map.insert(name.as_ref(), value.as_ref());
        }
        map
    }

    /// Insert a trimmed value; empty values are skipped.
    pub fn insert(&mut self, name: impl Into<String>, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.0.insert(name.into(), value.to_string());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Overwrite fields present in `other`; fields absent from `other` are kept.
    pub fn merge(&mut self, other: FieldMap) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The structured record extracted from one document group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NfeRecord {
    /// Tag `A`: schema version and document id.
    pub header: Option<Header>,
    /// Tag `B`: identification (`ide`).
    pub identification: Option<FieldMap>,
    /// Tags `C*`: issuer (`emit`).
    pub issuer: Option<Party>,
    /// Tags `E*`: recipient (`dest`); NFC-e documents may omit it.
    pub recipient: Option<Party>,
    /// Tags `H`/`I` and item detail groups.
    pub items: Vec<LineItem>,
    /// Tag `W02`: ICMS totals.
    pub totals: Option<FieldMap>,
    /// Tags `X*`: transport.
    pub transport: Option<Transport>,
    /// Tags `Y02`/`Y07`: billing.
    pub billing: Option<Billing>,
    /// Tag `YA`: payment details.
    pub payments: Vec<FieldMap>,
    /// Tags `Z*`: additional information.
    pub notes: Option<Notes>,
    /// Tags `BA*`: referenced documents.
    pub references: Vec<Reference>,
}

/// Document start (tag `A`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Schema version (`versao`), e.g. "4.00".
    pub version: Option<String>,
    /// Document identifier (`Id`), e.g. "NFe3519…".
    pub id: Option<String>,
}

/// Issuer or recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    /// Name, registrations and taxpayer id (`CNPJ`, `CPF` or `idEstrangeiro`).
    pub fields: FieldMap,
    pub address: Option<FieldMap>,
}

impl Party {
    /// The taxpayer identifier, whichever kind is present.
    pub fn taxpayer_id(&self) -> Option<&str> {
        ["CNPJ", "CPF", "idEstrangeiro"]
            .into_iter()
            .find_map(|k| self.fields.get(k))
    }
}

/// One product line (`det`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item number (`nItem`).
    pub index: u32,
    /// Product fields (tag `I`).
    pub product: FieldMap,
    /// `infAdProd` carried by the preceding item header.
    pub additional_info: Option<String>,
    /// Tax and product sub-groups, in file order.
    pub details: Vec<ItemDetail>,
}

impl LineItem {
    /// First detail group with the given tag.
    pub fn detail(&self, tag: &str) -> Option<&FieldMap> {
        self.details.iter().find(|d| d.tag == tag).map(|d| &d.fields)
    }
}

/// A tagged sub-group attached to a line item (`N02`, `Q02`, `M`, …).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub tag: String,
    pub fields: FieldMap,
}

/// Transport group (`transp`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    /// `modFrete`.
    pub fields: FieldMap,
    pub carrier: Option<FieldMap>,
    pub vehicle: Option<FieldMap>,
    pub volumes: Vec<FieldMap>,
}

/// Billing group (`cobr`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Billing {
    /// `fat`.
    pub invoice: Option<FieldMap>,
    /// `dup` entries.
    pub installments: Vec<FieldMap>,
}

/// Additional information (`infAdic`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    /// `infAdFisco` and `infCpl`.
    pub fields: FieldMap,
    /// `obsCont` entries.
    pub taxpayer_observations: Vec<FieldMap>,
    /// `obsFisco` entries.
    pub fiscal_observations: Vec<FieldMap>,
    /// `procRef` entries.
    pub processes: Vec<FieldMap>,
}

/// Kind of a referenced document (`NFref`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceKind {
    /// BA02: electronic invoice access key.
    Nfe,
    /// BA03: model 1/1A paper invoice.
    Nf,
    /// BA10: rural producer invoice.
    Nfp,
    /// BA19: transport document access key.
    Cte,
    /// BA20: fiscal coupon.
    Ecf,
}

impl ReferenceKind {
    /// XML element name of the reference.
    pub fn element(&self) -> &'static str {
        match self {
            Self::Nfe => "refNFe",
            Self::Nf => "refNF",
            Self::Nfp => "refNFP",
            Self::Cte => "refCTe",
            Self::Ecf => "refECF",
        }
    }

    /// Reference kind introduced by a tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "BA02" => Some(Self::Nfe),
            "BA03" => Some(Self::Nf),
            "BA10" => Some(Self::Nfp),
            "BA19" => Some(Self::Cte),
            "BA20" => Some(Self::Ecf),
            _ => None,
        }
    }
}

/// A referenced document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub fields: FieldMap,
}
