//! Field-level format rules, keyed by field name.
//!
//! These are shape checks only: digit counts, code lists and date patterns.
//! Check digits (CNPJ/CPF/access key) are left to the XML builder.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

type Check = fn(&str) -> Result<(), String>;

/// A format rule for one field name, optionally limited to some tags.
struct FieldRule {
    field: &'static str,
    /// Tags the rule applies to; empty means every tag.
    tags: &'static [&'static str],
    check: Check,
}

const FIELD_RULES: &[FieldRule] = &[
    FieldRule { field: "versao", tags: &[], check: check_version },
    FieldRule { field: "refNFe", tags: &[], check: check_access_key },
    FieldRule { field: "chNFe", tags: &[], check: check_access_key },
    FieldRule { field: "refCTe", tags: &[], check: check_access_key },
    FieldRule { field: "CNPJ", tags: &[], check: check_cnpj },
    FieldRule { field: "CPF", tags: &[], check: check_cpf },
    FieldRule { field: "cUF", tags: &[], check: check_state_code },
    // Referenced paper documents carry other models (01, 04, 2D…).
    FieldRule { field: "mod", tags: &["B"], check: check_model },
    FieldRule { field: "dhEmi", tags: &[], check: check_datetime },
    FieldRule { field: "dhSaiEnt", tags: &[], check: check_datetime },
    FieldRule { field: "dhCont", tags: &[], check: check_datetime },
    FieldRule { field: "dVenc", tags: &[], check: check_datetime },
    FieldRule { field: "IE", tags: &[], check: check_state_registration },
    FieldRule { field: "email", tags: &[], check: check_email },
    FieldRule { field: "CEP", tags: &[], check: check_postal_code },
    FieldRule { field: "NCM", tags: &[], check: check_ncm },
    FieldRule { field: "CFOP", tags: &[], check: check_cfop },
    FieldRule { field: "cMun", tags: &[], check: check_municipality },
    FieldRule { field: "item", tags: &["H"], check: check_item_number },
];

/// Schema versions a document may declare.
pub const SUPPORTED_VERSIONS: [&str; 2] = ["3.10", "4.00"];

/// Document models: 55 (NF-e) and 65 (NFC-e).
pub const DOCUMENT_MODELS: [&str; 2] = ["55", "65"];

/// IBGE state codes.
const STATE_CODES: [u8; 27] = [
    11, 12, 13, 14, 15, 16, 17, 21, 22, 23, 24, 25, 26, 27, 28, 29, 31, 32, 33, 35, 41, 42, 43,
    50, 51, 52, 53,
];

/// Characters that are never allowed in a value.
///
/// Control characters (tab and carriage return included) and the characters
/// XML reserves for markup and attribute quoting.
pub fn prohibited_char(value: &str) -> Option<char> {
    value
        .chars()
        .find(|c| c.is_control() || matches!(c, '<' | '>' | '"' | '\''))
}

/// Run the rule registered for `field` (if any) on a present value.
///
/// Returns `None` when the value passes or no rule applies.
pub fn check_field(tag: &str, field: &str, value: &str) -> Option<String> {
    FIELD_RULES
        .iter()
        .filter(|r| r.field == field && (r.tags.is_empty() || r.tags.contains(&tag)))
        .find_map(|r| (r.check)(value).err())
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_repeated(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.iter().all(|b| *b == bytes[0])
}

fn check_version(value: &str) -> Result<(), String> {
    if SUPPORTED_VERSIONS.contains(&value) {
        Ok(())
    } else {
        Err(format!(
            "version '{value}' is not supported (expected one of {})",
            SUPPORTED_VERSIONS.join(", ")
        ))
    }
}

fn check_access_key(value: &str) -> Result<(), String> {
    if is_digits(value, 44) {
        Ok(())
    } else {
        Err(format!("access key must have 44 digits, got '{value}'"))
    }
}

fn check_taxpayer_id(kind: &str, value: &str, len: usize) -> Result<(), String> {
    if !is_digits(value, len) {
        return Err(format!("{kind} must have {len} digits, got '{value}'"));
    }
    if is_repeated(value) {
        return Err(format!("{kind} '{value}' repeats a single digit"));
    }
    Ok(())
}

fn check_cnpj(value: &str) -> Result<(), String> {
    check_taxpayer_id("CNPJ", value, 14)
}

fn check_cpf(value: &str) -> Result<(), String> {
    check_taxpayer_id("CPF", value, 11)
}

fn check_state_code(value: &str) -> Result<(), String> {
    let known = is_digits(value, 2)
        && value
            .parse::<u8>()
            .is_ok_and(|code| STATE_CODES.contains(&code));
    if known {
        Ok(())
    } else {
        Err(format!("'{value}' is not an IBGE state code (11-53)"))
    }
}

fn check_model(value: &str) -> Result<(), String> {
    if DOCUMENT_MODELS.contains(&value) {
        Ok(())
    } else {
        Err(format!("document model '{value}' must be 55 or 65"))
    }
}

fn check_datetime(value: &str) -> Result<(), String> {
    let accepted = DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();
    if accepted {
        Ok(())
    } else {
        Err(format!(
            "'{value}' is not a date (YYYY-MM-DD) or date-time (YYYY-MM-DDThh:mm:ss[TZD])"
        ))
    }
}

fn check_state_registration(value: &str) -> Result<(), String> {
    if value.eq_ignore_ascii_case("ISENTO")
        || ((2..=14).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit()))
    {
        Ok(())
    } else {
        Err(format!("state registration '{value}' must be ISENTO or 2 to 14 digits"))
    }
}

fn check_email(value: &str) -> Result<(), String> {
    let valid = value.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !value.chars().any(char::is_whitespace)
    });
    if valid {
        Ok(())
    } else {
        Err(format!("'{value}' is not an email address"))
    }
}

fn check_postal_code(value: &str) -> Result<(), String> {
    if is_digits(value, 8) {
        Ok(())
    } else {
        Err(format!("CEP must have 8 digits, got '{value}'"))
    }
}

fn check_ncm(value: &str) -> Result<(), String> {
    if is_digits(value, 2) || is_digits(value, 8) {
        Ok(())
    } else {
        Err(format!("NCM must have 8 digits (or 2 for services), got '{value}'"))
    }
}

fn check_cfop(value: &str) -> Result<(), String> {
    if is_digits(value, 4) {
        Ok(())
    } else {
        Err(format!("CFOP must be a 4-digit code, got '{value}'"))
    }
}

fn check_municipality(value: &str) -> Result<(), String> {
    if is_digits(value, 7) {
        Ok(())
    } else {
        Err(format!("municipality code must have 7 digits, got '{value}'"))
    }
}

fn check_item_number(value: &str) -> Result<(), String> {
    if value.bytes().all(|b| b.is_ascii_digit()) && value.parse::<u32>().is_ok_and(|n| n > 0) {
        Ok(())
    } else {
        Err(format!("item number '{value}' must be a positive integer"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(field: &str, value: &str) -> bool {
        check_field("B", field, value).is_none()
    }

    #[test]
    fn versions() {
        assert!(ok("versao", "4.00"));
        assert!(ok("versao", "3.10"));
        assert!(!ok("versao", "2.00"));
    }

    #[test]
    fn taxpayer_ids() {
        assert!(ok("CNPJ", "12345678000195"));
        assert!(!ok("CNPJ", "1234567800019"));
        assert!(!ok("CNPJ", "11111111111111"));
        assert!(!ok("CNPJ", "12.345.678/0001"));
        assert!(ok("CPF", "12345678909"));
        assert!(!ok("CPF", "00000000000"));
    }

    #[test]
    fn referenced_keys() {
        let key = "35240612345678000195550010000000011000000010";
        // the document Id is free-form; the XML builder derives the key
        assert!(ok("Id", "DOC123"));
        assert!(ok("Id", ""));
        assert!(ok("chNFe", key));
        assert!(!ok("chNFe", "123"));
        assert!(!ok("refCTe", &key[1..]));
        assert!(ok("refNFe", key));
        assert!(!ok("refNFe", &format!("NFe{key}")));
    }

    #[test]
    fn state_codes() {
        assert!(ok("cUF", "35"));
        assert!(ok("cUF", "53"));
        assert!(!ok("cUF", "10"));
        assert!(!ok("cUF", "99"));
        assert!(!ok("cUF", "5"));
    }

    #[test]
    fn model_only_checked_on_identification() {
        assert!(ok("mod", "55"));
        assert!(ok("mod", "65"));
        assert!(!ok("mod", "57"));
        assert!(check_field("BA20", "mod", "2D").is_none());
    }

    #[test]
    fn datetimes() {
        assert!(ok("dhEmi", "2024-06-15T10:30:00-03:00"));
        assert!(ok("dhEmi", "2024-06-15T10:30:00"));
        assert!(ok("dhEmi", "2024-06-15 10:30:00"));
        assert!(ok("dVenc", "2024-07-15"));
        assert!(!ok("dhEmi", "15/06/2024"));
        assert!(!ok("dhEmi", "2024-13-01"));
    }

    #[test]
    fn registrations_and_codes() {
        assert!(ok("IE", "ISENTO"));
        assert!(ok("IE", "123456789012"));
        assert!(!ok("IE", "1"));
        assert!(!ok("IE", "12.345"));
        assert!(ok("CEP", "01310100"));
        assert!(!ok("CEP", "01310-100"));
        assert!(ok("NCM", "84713012"));
        assert!(ok("NCM", "00"));
        assert!(!ok("NCM", "8471"));
        assert!(ok("CFOP", "5102"));
        assert!(!ok("CFOP", "510"));
        assert!(ok("cMun", "3550308"));
        assert!(!ok("cMun", "355030"));
        assert!(check_field("H", "item", "12").is_none());
        assert!(check_field("H", "item", "0").is_some());
        assert!(check_field("H", "item", "+1").is_some());
    }

    #[test]
    fn emails() {
        assert!(ok("email", "fiscal@empresa.com.br"));
        assert!(!ok("email", "fiscal.empresa.com.br"));
        assert!(!ok("email", "@empresa.com"));
        assert!(!ok("email", "a@b@c.com"));
        assert!(!ok("email", "a@localhost"));
        assert!(!ok("email", "a b@c.com"));
    }

    #[test]
    fn unruled_fields_pass() {
        assert!(ok("xNome", "anything at all"));
        assert!(ok("xProd", "12"));
    }

    #[test]
    fn prohibited_characters() {
        assert_eq!(prohibited_char("a<b"), Some('<'));
        assert_eq!(prohibited_char("O'Brien"), Some('\''));
        assert_eq!(prohibited_char("a\tb"), Some('\t'));
        assert_eq!(prohibited_char("Rua São João, 10 & 12"), None);
    }
}
