//! Fuzz target for governance policy parsing.
//!
//! Parsing must never panic, and any accepted document must yield a redact
//! set for an arbitrary profile name.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lg_redact::PolicyDocument;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(doc) = PolicyDocument::parse(text) {
        assert!(doc.profile("no-such-profile").is_some());
        let fields = doc.redact_fields("default");
        for name in fields.iter() {
            assert!(fields.contains(name));
        }
    }
});
