//! Fuzz target for raw-text violation payloads.
//!
//! Arbitrary text under the violations key must never panic and must only
//! yield fields that a forbidden-field entry actually named.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lg_redact::{extract_forbidden_fields, LogRecord, ViolationPayload, VIOLATIONS_KEY};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let value = Value::String(text.into_owned());

    let visited = ViolationPayload::classify(Some(&value)).for_each_entry(|_, _| {});

    let mut record = LogRecord::new();
    record.insert(VIOLATIONS_KEY, value);
    let fields = extract_forbidden_fields(&record);
    assert!(fields.len() <= visited);
});
