//! Single-field transforms used by the field normalizer.
//!
//! Every transform is total and idempotent: malformed input resolves to the
//! transform's sentinel instead of an error, and feeding a transform its own
//! output returns that output unchanged. The `try_*` variants surface the
//! [`TransformFailure`] so the caller can count it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{COLUMN_ALIASES, COUNTRY_CODE, NULL_SPELLINGS, UNKNOWN};
use crate::domain::Value;
use crate::error::TransformFailure;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d-%b-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Largest serial a spreadsheet date can carry (9999-12-31).
const MAX_EXCEL_SERIAL: i64 = 2_958_465;

pub fn is_null_spelling(raw: &str) -> bool {
    let trimmed = raw.trim();
    NULL_SPELLINGS.iter().any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// Customer name: placeholders become `Unknown`, anything else is trimmed.
pub fn clean_name(value: &Value) -> Value {
    match value.to_text() {
        Some(text) if !is_null_spelling(&text) => Value::Text(text.trim().to_string()),
        _ => Value::text(UNKNOWN),
    }
}

/// Titlecase form of a word-initial letter. Latin digraphs have their own
/// titlecase letter; a letter whose uppercase expands to several characters
/// keeps only the first one upper-cased (`ß` gives `Ss`).
fn push_titlecase(out: &mut String, c: char) {
    let titled = match c {
        '\u{01C4}'..='\u{01C6}' => '\u{01C5}',
        '\u{01C7}'..='\u{01C9}' => '\u{01C8}',
        '\u{01CA}'..='\u{01CC}' => '\u{01CB}',
        '\u{01F1}'..='\u{01F3}' => '\u{01F2}',
        _ => {
            let mut upper = c.to_uppercase();
            if let Some(first) = upper.next() {
                out.push(first);
            }
            for rest in upper {
                out.extend(rest.to_lowercase());
            }
            return;
        }
    };
    out.push(titled);
}

/// Python-style title casing: the first letter of every alphabetic run is
/// title-cased and the rest lower-cased. Applying it twice changes nothing.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                push_titlecase(&mut out, c);
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}

/// Convert a raw header into lower camel case with spaces removed.
///
/// `"Nature of Complaint"` becomes `natureOfComplaint`. A leading token that is
/// already mixed case keeps its inner capitals, so `customerId` is stable.
pub fn to_lower_camel(header: &str) -> String {
    let mut tokens = header.split_whitespace();
    let Some(first) = tokens.next() else {
        return String::new();
    };

    let mut out = if first.chars().any(char::is_lowercase) {
        let mut chars = first.chars();
        chars
            .next()
            .map(|c| c.to_lowercase().chain(chars).collect())
            .unwrap_or_default()
    } else {
        first.to_lowercase()
    };

    for token in tokens {
        out.push_str(&title_case(token));
    }
    out
}

/// Lower-camel-case a header and apply the legacy aliases.
pub fn canonical_column(header: &str) -> String {
    let camel = to_lower_camel(header);
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == camel)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(camel)
}

/// Trim a text cell; whitespace-only text becomes null.
pub fn trim_text(value: &Value) -> Value {
    match value {
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Value::Null
            } else {
                Value::text(trimmed)
            }
        }
        other => other.clone(),
    }
}

pub fn title_case_value(value: &Value) -> Value {
    match value {
        Value::Text(s) => Value::Text(title_case(s)),
        other => other.clone(),
    }
}

/// Canonical international form of a local phone number.
pub fn try_format_phone(raw: &str) -> Result<String, TransformFailure> {
    let digits = NON_DIGITS.replace_all(raw, "");
    if digits.len() < 9 {
        return Err(TransformFailure::new("phone number", raw));
    }

    if digits.len() == 10 && digits.starts_with('0') {
        Ok(format!("+{COUNTRY_CODE}{}", &digits[1..]))
    } else if digits.len() == COUNTRY_CODE.len() + 9 && digits.starts_with(COUNTRY_CODE) {
        Ok(format!("+{digits}"))
    } else if digits.len() == 9 {
        Ok(format!("+{COUNTRY_CODE}{digits}"))
    } else {
        Err(TransformFailure::new("phone number", raw))
    }
}

pub fn format_phone(raw: &str) -> Option<String> {
    try_format_phone(raw).ok()
}

/// Phone cell transform. Placeholder spellings are null without counting as
/// a failure.
pub fn try_phone_value(value: &Value) -> Result<Value, TransformFailure> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(s) if is_null_spelling(s) => Ok(Value::Null),
        Value::Text(s) => try_format_phone(s).map(Value::Text),
        Value::Int(n) => try_format_phone(&n.to_string()).map(Value::Text),
        Value::Date(d) => Err(TransformFailure::new("phone number", d.to_string())),
    }
}

/// Day count cell transform.
pub fn try_parse_int(value: &Value) -> Result<Value, TransformFailure> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Text(s) if is_null_spelling(s) => Ok(Value::Null),
        Value::Text(s) => parse_integral(s.trim())
            .map(Value::Int)
            .ok_or_else(|| TransformFailure::new("integer", s.as_str())),
        Value::Date(d) => Err(TransformFailure::new("integer", d.to_string())),
    }
}

fn parse_integral(text: &str) -> Option<i64> {
    if let Ok(n) = text.parse::<i64>() {
        return Some(n);
    }
    let f = text.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}

/// Convert a spreadsheet serial day number into a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL as f64 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Calendar date cell transform.
pub fn try_parse_date(value: &Value) -> Result<Value, TransformFailure> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Date(d) => Ok(Value::Date(*d)),
        Value::Int(n) if is_bare_year(*n) => Err(TransformFailure::new("date", n.to_string())),
        Value::Int(n) => excel_serial_to_date(*n as f64)
            .map(Value::Date)
            .ok_or_else(|| TransformFailure::new("date", n.to_string())),
        Value::Text(s) if is_null_spelling(s) => Ok(Value::Null),
        Value::Text(s) => parse_date_text(s.trim())
            .map(Value::Date)
            .ok_or_else(|| TransformFailure::new("date", s.as_str())),
    }
}

/// A four-digit number is a year, not a serial day count, and names no single
/// date.
fn is_bare_year(n: i64) -> bool {
    (1000..=9999).contains(&n)
}

pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    try_parse_date(value).ok().and_then(|v| v.as_date())
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    {
        return Some(date);
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(dt.date());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if text.len() == 4 && text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok().and_then(excel_serial_to_date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_shapes() {
        assert_eq!(format_phone("0241234567").as_deref(), Some("+233241234567"));
        assert_eq!(format_phone("233241234567").as_deref(), Some("+233241234567"));
        assert_eq!(format_phone("241234567").as_deref(), Some("+233241234567"));
        assert_eq!(format_phone("024 123-4567").as_deref(), Some("+233241234567"));
        assert_eq!(format_phone("123"), None);
        assert_eq!(format_phone("12345678901"), None);
    }

    #[test]
    fn test_format_phone_is_idempotent() {
        let once = format_phone("0241234567").unwrap();
        assert_eq!(format_phone(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn test_phone_value_from_numeric_cell() {
        assert_eq!(try_phone_value(&Value::Int(241234567)), Ok(Value::text("+233241234567")));
        assert_eq!(try_phone_value(&Value::text("null")), Ok(Value::Null));
        assert!(try_phone_value(&Value::text("call me")).is_err());
    }

    #[test]
    fn test_clean_name_placeholders() {
        for raw in ["", "   ", "nan", "NULL", " None "] {
            assert_eq!(clean_name(&Value::text(raw)), Value::text(UNKNOWN), "input {raw:?}");
        }
        assert_eq!(clean_name(&Value::Null), Value::text(UNKNOWN));
        assert_eq!(clean_name(&Value::text("  Ama Owusu ")), Value::text("Ama Owusu"));
    }

    #[test]
    fn test_to_lower_camel() {
        assert_eq!(to_lower_camel("Nature of Complaint"), "natureOfComplaint");
        assert_eq!(to_lower_camel("  Log Date "), "logDate");
        assert_eq!(to_lower_camel("TAT"), "tat");
        assert_eq!(to_lower_camel("Name of CC Rep"), "nameOfCcRep");
        assert_eq!(to_lower_camel("customerId"), "customerId");
        assert_eq!(to_lower_camel(&to_lower_camel("Reason For Reversal Request")), "reasonForReversalRequest");
    }

    #[test]
    fn test_canonical_column_aliases() {
        assert_eq!(canonical_column("TAT"), "turnaroundTime");
        assert_eq!(canonical_column("DOB"), "dateOfBirth");
        assert_eq!(canonical_column("Date of Birth"), "dateOfBirth");
    }

    #[test]
    fn test_title_case_matches_str_title() {
        assert_eq!(title_case("card BLOCKED by bank"), "Card Blocked By Bank");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("Title Case"), "Title Case");
        assert_eq!(title_case("straße ßeta ǆungla"), "Straße Sseta ǅungla");
        assert_eq!(title_case("ÉLODIE ß"), "Élodie Ss");
        assert_eq!(title_case("ﬁsh"), "Fish");
    }

    #[test]
    fn test_title_case_is_stable_on_second_pass() {
        for input in ["straße ßeta ǆungla", "ÉLODIE ß", "ǈubljana ǲ", "ﬁsh ﬂour", "o'neil"] {
            let once = title_case(input);
            assert_eq!(title_case(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_int_coercion() {
        assert_eq!(try_parse_int(&Value::text("7")), Ok(Value::Int(7)));
        assert_eq!(try_parse_int(&Value::text("-3.0")), Ok(Value::Int(-3)));
        assert_eq!(try_parse_int(&Value::text("")), Ok(Value::Null));
        assert!(try_parse_int(&Value::text("seven")).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        for raw in ["2024-03-10", "2024/03/10", "03/10/2024", "10 March 2024", "2024-03-10 14:22:00"] {
            assert_eq!(parse_date(&Value::text(raw)), Some(expected), "input {raw:?}");
        }
        assert_eq!(parse_date(&Value::Int(45361)), Some(expected));
        assert_eq!(parse_date(&Value::text("next tuesday")), None);
        assert_eq!(parse_date(&Value::Date(expected)), Some(expected));
    }

    #[test]
    fn test_bare_year_is_not_a_date() {
        assert_eq!(parse_date(&Value::text("1990")), None);
        assert_eq!(parse_date(&Value::Int(1990)), None);
        assert_eq!(
            try_parse_date(&Value::text("1990")),
            Err(TransformFailure::new("date", "1990"))
        );
        assert_eq!(parse_date(&Value::text("1990-05-01")), NaiveDate::from_ymd_opt(1990, 5, 1));
        assert_eq!(parse_date(&Value::text("45361")), NaiveDate::from_ymd_opt(2024, 3, 10));
    }

    #[test]
    fn test_excel_serial_bounds() {
        assert_eq!(excel_serial_to_date(0.0), None);
        assert_eq!(excel_serial_to_date(1.0), NaiveDate::from_ymd_opt(1899, 12, 31));
        assert_eq!(excel_serial_to_date(3_000_000.0), None);
    }
}
