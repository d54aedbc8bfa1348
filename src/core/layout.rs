//! Layout (grammar) definitions for the TXT dialects.
//!
//! A layout maps each tag to the ordered field names of its lines. Templates
//! are written the way the lines themselves are written (`"C02|CNPJ|"`): the
//! leading slot repeats the tag and the trailing slot is the empty remainder
//! after the closing delimiter. Both are stripped when the layout is built.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ConvertError;

const LOCAL_V310: &str = include_str!("layouts/local_v310.json");
const LOCAL_V400: &str = include_str!("layouts/local_v400.json");
const SEBRAE_V400: &str = include_str!("layouts/sebrae_v400.json");

/// Default field delimiter (and line terminator) of every built-in dialect.
pub const DEFAULT_DELIMITER: char = '|';

/// Built-in TXT dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Layout for schema version 3.10.
    LocalV310,
    /// Layout for schema version 4.00.
    LocalV400,
    /// SEBRAE emitter variant of the 4.00 layout.
    SebraeV400,
}

impl Dialect {
    /// Every built-in dialect.
    pub const ALL: [Dialect; 3] = [Self::LocalV310, Self::LocalV400, Self::SebraeV400];

    /// Identifier accepted by [`LayoutConfig::load`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalV310 => "local_v310",
            Self::LocalV400 => "local_v400",
            Self::SebraeV400 => "sebrae_v400",
        }
    }

    fn definition(&self) -> &'static str {
        match self {
            Self::LocalV310 => LOCAL_V310,
            Self::LocalV400 => LOCAL_V400,
            Self::SebraeV400 => SEBRAE_V400,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConvertError::Layout(format!("unknown layout '{}'", s.trim())))
    }
}

/// On-disk shape of a layout definition.
#[derive(Debug, Deserialize)]
struct LayoutDefinition {
    name: String,
    version: String,
    #[serde(default = "default_delimiter")]
    delimiter: String,
    tags: BTreeMap<String, String>,
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// An immutable, versioned tag → field-name grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutConfig {
    name: String,
    version: String,
    delimiter: char,
    tags: BTreeMap<String, Vec<String>>,
}

impl LayoutConfig {
    /// Load a built-in dialect by identifier (e.g. `"local_v400"`).
    pub fn load(name: &str) -> Result<Self, ConvertError> {
        Self::dialect(name.parse()?)
    }

    /// Load a built-in dialect.
    pub fn dialect(dialect: Dialect) -> Result<Self, ConvertError> {
        Self::from_json(dialect.definition())
    }

    /// Read a layout definition from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::Layout(format!("cannot read layout '{}': {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    /// Decode a layout definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConvertError> {
        let def: LayoutDefinition = serde_json::from_str(json)
            .map_err(|e| ConvertError::Layout(format!("malformed layout definition: {e}")))?;

        let mut chars = def.delimiter.chars();
        let delimiter = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(ConvertError::Layout(format!(
                    "layout '{}': delimiter must be a single character, got '{}'",
                    def.name, def.delimiter
                )));
            }
        };

        let mut tags = BTreeMap::new();
        for (tag, template) in &def.tags {
            let fields = parse_template(&def.name, tag, template, delimiter)?;
            tags.insert(tag.clone(), fields);
        }

        tracing::debug!(layout = %def.name, version = %def.version, tags = tags.len(), "layout loaded");

        Ok(Self {
            name: def.name,
            version: def.version,
            delimiter,
            tags,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Field delimiter, also required as the last character of every line.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Usable field names of a tag, in positional order.
    pub fn fields(&self, tag: &str) -> Option<&[String]> {
        self.tags.get(tag).map(Vec::as_slice)
    }

    /// Number of fields every line of `tag` must carry.
    pub fn field_count(&self, tag: &str) -> Option<usize> {
        self.tags.get(tag).map(Vec::len)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// All tags, in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }
}

/// Builder for layouts defined in code.
///
/// Tags go through the same template checks as JSON definitions, so a layout
/// built here is exactly the layout the equivalent JSON would load.
///
/// # Example
///
/// ```
/// use notafiscal::core::LayoutConfigBuilder;
///
/// let layout = LayoutConfigBuilder::new("mini", "4.00")
///     .tag("A", &["versao", "Id"])
///     .tag("C02", &["CNPJ"])
///     .build()
///     .unwrap();
/// assert_eq!(layout.field_count("A"), Some(2));
///
/// let duplicate = LayoutConfigBuilder::new("mini", "4.00")
///     .tag("C", &["xNome", "xNome"])
///     .build();
/// assert!(duplicate.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct LayoutConfigBuilder {
    name: String,
    version: String,
    delimiter: char,
    tags: Vec<(String, Vec<String>)>,
}

impl LayoutConfigBuilder {
    /// Start an empty layout using the default `|` delimiter.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            delimiter: DEFAULT_DELIMITER,
            tags: Vec::new(),
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Add a tag with its usable field names. A later call for the same tag
    /// replaces the earlier one.
    pub fn tag<S: AsRef<str>>(mut self, tag: impl Into<String>, fields: &[S]) -> Self {
        self.tags.push((
            tag.into(),
            fields.iter().map(|f| f.as_ref().to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Result<LayoutConfig, ConvertError> {
        let delimiter = self.delimiter;
        let mut tags = BTreeMap::new();
        for (tag, fields) in self.tags {
            if let Some(field) = fields.iter().find(|f| f.contains(delimiter)) {
                return Err(ConvertError::Layout(format!(
                    "layout '{}', tag '{tag}': field name '{field}' contains the delimiter",
                    self.name
                )));
            }
            let template: String = std::iter::once(tag.as_str())
                .chain(fields.iter().map(String::as_str))
                .fold(String::new(), |mut acc, slot| {
                    acc.push_str(slot);
                    acc.push(delimiter);
                    acc
                });
            let fields = parse_template(&self.name, &tag, &template, delimiter)?;
            tags.insert(tag, fields);
        }
        Ok(LayoutConfig {
            name: self.name,
            version: self.version,
            delimiter,
            tags,
        })
    }
}

fn parse_template(
    layout: &str,
    tag: &str,
    template: &str,
    delimiter: char,
) -> Result<Vec<String>, ConvertError> {
    let malformed = |reason: &str| {
        ConvertError::Layout(format!(
            "layout '{layout}', tag '{tag}': {reason} (template '{template}')"
        ))
    };

    if tag.is_empty() {
        return Err(malformed("empty tag"));
    }
    if !template.ends_with(delimiter) {
        return Err(malformed("template must end with the delimiter"));
    }

    let slots: Vec<&str> = template.split(delimiter).collect();
    // At least the tag slot and the trailing empty slot.
    if slots.len() < 2 || slots[0] != tag {
        return Err(malformed("template must start with its own tag"));
    }

    let fields: Vec<String> = slots[1..slots.len() - 1]
        .iter()
        .map(|s| s.trim().to_string())
        .collect();

    for (i, field) in fields.iter().enumerate() {
        if field.is_empty() {
            return Err(malformed("empty field name"));
        }
        if fields[..i].contains(field) {
            return Err(malformed(&format!("duplicate field name '{field}'")));
        }
    }

    Ok(fields)
}
