//! Extraction of forbidden-field violations from tagged records.
//!
//! The external validator attaches its findings under
//! [`VIOLATIONS_KEY`](crate::VIOLATIONS_KEY). Producers disagree on the
//! encoding, so the payload is classified into a [`ViolationPayload`] before
//! any entry is read. Nothing here returns an error: unreadable payloads and
//! malformed entries contribute no fields.

use crate::{FieldSet, LogRecord};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Violation codes that mark a field as forbidden.
pub const FORBIDDEN_CODES: &[&str] = &["ForbiddenField", "DisallowedFieldPresent"];

/// A policy breach reported by the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(alias = "Code", default)]
    pub code: String,
    #[serde(alias = "Field", default)]
    pub field: String,
    #[serde(alias = "Severity", default)]
    pub severity: String,
    #[serde(alias = "Message", default)]
    pub message: String,
}

impl Violation {
    /// Create a violation.
    pub fn new(
        code: impl Into<String>,
        field: impl Into<String>,
        severity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            field: field.into(),
            severity: severity.into(),
            message: message.into(),
        }
    }

    /// Whether the code names a forbidden field.
    pub fn is_forbidden_field(&self) -> bool {
        is_forbidden_code(&self.code)
    }

    /// Attach violations to a record under the reserved key.
    pub fn attach(record: &mut LogRecord, violations: &[Violation]) {
        let value = serde_json::to_value(violations).unwrap_or(Value::Array(Vec::new()));
        record.insert(crate::VIOLATIONS_KEY, value);
    }
}

fn is_forbidden_code(code: &str) -> bool {
    let code = code.trim();
    FORBIDDEN_CODES.iter().any(|c| c.eq_ignore_ascii_case(code))
}

/// The shapes a violations payload arrives in.
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationPayload<'a> {
    /// No payload, or one of an unusable type.
    Absent,
    /// A sequence of violation objects.
    Entries(&'a [Value]),
    /// A single violation as a key-value map.
    Single(&'a Map<String, Value>),
    /// JSON text that still has to be parsed.
    Text(&'a str),
}

impl<'a> ViolationPayload<'a> {
    /// Classify a raw payload value.
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            Some(Value::Array(entries)) => ViolationPayload::Entries(entries),
            Some(Value::Object(map)) => ViolationPayload::Single(map),
            Some(Value::String(text)) => ViolationPayload::Text(text),
            _ => ViolationPayload::Absent,
        }
    }

    /// Visit every well-formed violation entry as `(code, field)`.
    ///
    /// Returns the number of entries visited.
    pub fn for_each_entry(&self, mut visit: impl FnMut(&str, &str)) -> usize {
        match self {
            ViolationPayload::Absent => 0,
            ViolationPayload::Entries(entries) => visit_entries(entries, &mut visit),
            ViolationPayload::Single(map) => visit_object(map, &mut visit) as usize,
            ViolationPayload::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(entries)) => visit_entries(&entries, &mut visit),
                Ok(Value::Object(map)) => visit_object(&map, &mut visit) as usize,
                _ => 0,
            },
        }
    }
}

fn visit_entries(entries: &[Value], visit: &mut impl FnMut(&str, &str)) -> usize {
    entries
        .iter()
        .filter_map(Value::as_object)
        .filter(|map| visit_object(map, visit))
        .count()
}

/// Reads `code` and `field` from an entry, tolerating key case.
fn visit_object(map: &Map<String, Value>, visit: &mut impl FnMut(&str, &str)) -> bool {
    let code = lookup_str(map, "code");
    let field = lookup_str(map, "field");
    match (code, field) {
        (Some(code), Some(field)) => {
            visit(code, field);
            true
        }
        _ => false,
    }
}

fn lookup_str<'m>(map: &'m Map<String, Value>, key: &str) -> Option<&'m str> {
    map.get(key)
        .or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .and_then(Value::as_str)
}

/// Fields named by forbidden-field violations on `record`.
pub fn extract_forbidden_fields(record: &LogRecord) -> Vec<String> {
    let mut fields = Vec::new();
    ViolationPayload::classify(record.violations()).for_each_entry(|code, field| {
        if is_forbidden_code(code) && !field.is_empty() {
            fields.push(field.to_string());
        }
    });
    fields
}

/// Add forbidden fields from `record` to `out`.
///
/// Returns the number of well-formed violations observed, forbidden or not.
pub fn collect_forbidden_fields(record: &LogRecord, out: &mut FieldSet) -> usize {
    ViolationPayload::classify(record.violations()).for_each_entry(|code, field| {
        if is_forbidden_code(code) && !field.is_empty() {
            out.insert(field);
        }
    })
}
