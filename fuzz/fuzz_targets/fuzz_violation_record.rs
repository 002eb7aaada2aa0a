//! Fuzz target for structured violation payloads.
//!
//! Builds a record from arbitrary JSON and runs extraction on whatever shape
//! lands under the violations key.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lg_redact::{collect_forbidden_fields, FieldSet, LogRecord, VIOLATIONS_KEY};
use serde_json::Value;

#[derive(Debug, Arbitrary)]
struct Input {
    violations_json: String,
    key_upper: bool,
}

fuzz_target!(|input: Input| {
    let Ok(value) = serde_json::from_str::<Value>(&input.violations_json) else {
        return;
    };
    let key = if input.key_upper {
        VIOLATIONS_KEY.to_uppercase()
    } else {
        VIOLATIONS_KEY.to_string()
    };

    let mut record = LogRecord::new();
    record.insert(key, value);
    let mut fields = FieldSet::new();
    let _ = collect_forbidden_fields(&record, &mut fields);
});
