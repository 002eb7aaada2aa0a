//! No-mock governance tests against real policy files.
//!
//! Covers:
//! - Policy and violation driven redaction
//! - Relax bypass through the record flag and the call context
//! - Hot reload after the policy file is rewritten, by mtime and by watch event
//! - Fail-open on missing and malformed policy files
//! - Foreign JSON maps through the copy-back path

use filetime::FileTime;
use lg_redact::{
    CacheOptions, GovernanceConfig, GovernanceContext, GovernanceCounters, GovernanceEngine,
    GovernanceError, LogRecord, NoopValidator, PolicyCache, PolicyStatus, Result, Validator,
    Violation, REDACTION_MARKER, RELAXED_KEY, VIOLATIONS_KEY,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

struct Harness {
    _dir: TempDir,
    path: PathBuf,
}

impl Harness {
    fn new(policy: &Value) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("governance-policy.json");
        std::fs::write(&path, policy.to_string()).expect("write policy");
        Self { _dir: dir, path }
    }

    fn with_disallowed(fields: &[&str]) -> Self {
        Self::new(&policy_with(fields))
    }

    fn rewrite(&self, policy: &Value) {
        std::fs::write(&self.path, policy.to_string()).expect("rewrite policy");
        let later = FileTime::from_unix_time(FileTime::now().unix_seconds() + 30, 0);
        filetime::set_file_mtime(&self.path, later).expect("set mtime");
    }

    fn engine(&self, validator: Arc<dyn Validator>) -> (GovernanceEngine, Arc<GovernanceCounters>) {
        engine_at(&self.path, validator)
    }
}

fn policy_with(fields: &[&str]) -> Value {
    json!({
        "version": "2024-01",
        "LoggingProfiles": {
            "default": { "DisallowedFields": fields }
        }
    })
}

fn engine_at(path: &Path, validator: Arc<dyn Validator>) -> (GovernanceEngine, Arc<GovernanceCounters>) {
    let cache = PolicyCache::with_options(
        path,
        "default",
        CacheOptions {
            watch: false,
            ..CacheOptions::default()
        },
    );
    let counters = Arc::new(GovernanceCounters::new());
    let engine = GovernanceEngine::new(cache, validator).with_metrics(counters.clone());
    (engine, counters)
}

fn record(pairs: &[(&str, Value)]) -> LogRecord {
    pairs.iter().map(|(k, v)| (*k, v.clone())).collect()
}

// ============================================================================
// Redaction
// ============================================================================

#[test]
fn test_disallowed_field_redacted_others_untouched() {
    let harness = Harness::with_disallowed(&["ssn"]);
    let (engine, counters) = harness.engine(Arc::new(NoopValidator));

    let mut rec = record(&[("ssn", json!("111-22-3333")), ("userId", json!("u1"))]);
    engine.validate_and_redact(&mut rec).unwrap();

    assert_eq!(
        rec,
        record(&[("ssn", json!(REDACTION_MARKER)), ("userId", json!("u1"))])
    );
    let snap = counters.snapshot();
    assert_eq!((snap.processed, snap.violations, snap.redactions), (1, 0, 1));
}

#[test]
fn test_policy_case_does_not_matter() {
    let harness = Harness::with_disallowed(&["SSN"]);
    let (engine, _) = harness.engine(Arc::new(NoopValidator));

    let mut rec = record(&[("ssn", json!("111-22-3333"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("ssn"), Some(&json!(REDACTION_MARKER)));

    let mut rec = record(&[("Ssn", json!("111-22-3333"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("SSN"), Some(&json!(REDACTION_MARKER)));
}

#[test]
fn test_forbidden_severity_redacts() {
    let harness = Harness::new(&json!({
        "version": "1",
        "LoggingProfiles": {
            "Production": {
                "DisallowedFields": [],
                "FieldSeverities": { "apiKey": "forbidden", "region": "Low" }
            }
        }
    }));
    let cache = PolicyCache::with_options(
        &harness.path,
        "production",
        CacheOptions {
            watch: false,
            ..CacheOptions::default()
        },
    );
    let engine = GovernanceEngine::new(cache, Arc::new(NoopValidator));

    let mut rec = record(&[("apikey", json!("k-123")), ("region", json!("eu"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("apiKey"), Some(&json!(REDACTION_MARKER)));
    assert_eq!(rec.get("region"), Some(&json!("eu")));
}

#[test]
fn test_unknown_profile_falls_back_to_first() {
    let harness = Harness::new(&json!({
        "version": "1",
        "LoggingProfiles": {
            "strict": { "DisallowedFields": ["email"] },
            "lenient": { "DisallowedFields": [] }
        }
    }));
    let cache = PolicyCache::with_options(
        &harness.path,
        "does-not-exist",
        CacheOptions {
            watch: false,
            ..CacheOptions::default()
        },
    );
    let engine = GovernanceEngine::new(cache, Arc::new(NoopValidator));

    let mut rec = record(&[("email", json!("a@example.com"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("email"), Some(&json!(REDACTION_MARKER)));
}

#[test]
fn test_violation_shapes_all_contribute() {
    let harness = Harness::with_disallowed(&[]);

    // Structured objects.
    let structured = |rec: &mut LogRecord| -> Result<()> {
        Violation::attach(
            rec,
            &[Violation::new("ForbiddenField", "card", "High", "card number")],
        );
        Ok(())
    };
    // Raw JSON text with camelCase keys.
    let textual = |rec: &mut LogRecord| -> Result<()> {
        let text = r#"[{"code":"disallowedfieldpresent","field":"card"}]"#;
        rec.insert(VIOLATIONS_KEY, text);
        Ok(())
    };
    // A single object instead of an array.
    let single = |rec: &mut LogRecord| -> Result<()> {
        rec.insert(VIOLATIONS_KEY, json!({"Code": "ForbiddenField", "Field": "card"}));
        Ok(())
    };

    let validators: Vec<Arc<dyn Validator>> =
        vec![Arc::new(structured), Arc::new(textual), Arc::new(single)];
    for validator in validators {
        let (engine, _) = harness.engine(validator);
        let mut rec = record(&[("card", json!("4111")), ("amount", json!(12))]);
        engine.validate_and_redact(&mut rec).unwrap();
        assert_eq!(rec.get("card"), Some(&json!(REDACTION_MARKER)));
        assert_eq!(rec.get("amount"), Some(&json!(12)));
    }
}

#[test]
fn test_garbage_violation_text_contributes_nothing() {
    let harness = Harness::with_disallowed(&[]);
    let tagger = |rec: &mut LogRecord| -> Result<()> {
        rec.insert(VIOLATIONS_KEY, "{{ not json");
        Ok(())
    };
    let (engine, counters) = harness.engine(Arc::new(tagger));

    let mut rec = record(&[("card", json!("4111"))]);
    let outcome = engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(outcome.redacted, 0);
    assert_eq!(rec.get("card"), Some(&json!("4111")));
    assert_eq!(counters.snapshot().violations, 0);
}

#[test]
fn test_second_pass_changes_nothing() {
    let harness = Harness::with_disallowed(&["password", "token"]);
    let (engine, _) = harness.engine(Arc::new(NoopValidator));

    let mut rec = record(&[
        ("password", json!("hunter2")),
        ("token", json!(42)),
        ("user", json!("alice")),
    ]);
    engine.validate_and_redact(&mut rec).unwrap();
    let once = rec.clone();
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec, once);
}

// ============================================================================
// Relax bypass
// ============================================================================

#[test]
fn test_relaxed_record_passes_through() {
    let harness = Harness::with_disallowed(&["secret"]);
    let tagger = |rec: &mut LogRecord| -> Result<()> {
        Violation::attach(rec, &[Violation::new("ForbiddenField", "secret", "", "")]);
        Ok(())
    };
    let (engine, counters) = harness.engine(Arc::new(tagger));

    let mut rec = record(&[(RELAXED_KEY, json!(true)), ("secret", json!("value"))]);
    let before = rec.clone();
    let outcome = engine.validate_and_redact(&mut rec).unwrap();

    assert!(outcome.relaxed);
    assert_eq!(rec, before);
    assert!(!rec.contains_key(VIOLATIONS_KEY));
    let snap = counters.snapshot();
    assert_eq!((snap.processed, snap.violations, snap.redactions), (1, 0, 0));
}

#[test]
fn test_relaxed_context_across_threads() {
    let harness = Harness::with_disallowed(&["secret"]);
    let (engine, _) = harness.engine(Arc::new(NoopValidator));
    let engine = Arc::new(engine);

    let relaxed = {
        let engine = Arc::clone(&engine);
        let ctx = GovernanceContext::relaxed();
        std::thread::spawn(move || {
            let mut rec = record(&[("secret", json!("value"))]);
            engine.validate_and_redact_in(ctx, &mut rec).unwrap();
            rec
        })
    };
    let governed = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || {
            let mut rec = record(&[("secret", json!("value"))]);
            engine
                .validate_and_redact_in(GovernanceContext::governed(), &mut rec)
                .unwrap();
            rec
        })
    };

    let relaxed = relaxed.join().unwrap();
    let governed = governed.join().unwrap();
    assert_eq!(relaxed.get("secret"), Some(&json!("value")));
    assert_eq!(relaxed.get(RELAXED_KEY), Some(&json!(true)));
    assert_eq!(governed.get("secret"), Some(&json!(REDACTION_MARKER)));
    assert!(!governed.contains_key(RELAXED_KEY));
}

// ============================================================================
// Hot reload and fail-open
// ============================================================================

#[test]
fn test_hot_reload_picks_up_new_field() {
    let harness = Harness::with_disallowed(&[]);
    let (engine, _) = harness.engine(Arc::new(NoopValidator));

    let mut first = record(&[("email", json!("a@example.com"))]);
    engine.validate_and_redact(&mut first).unwrap();
    assert_eq!(first.get("email"), Some(&json!("a@example.com")));

    harness.rewrite(&policy_with(&["email"]));

    let mut second = record(&[("email", json!("a@example.com"))]);
    engine.validate_and_redact(&mut second).unwrap();
    assert_eq!(second.get("email"), Some(&json!(REDACTION_MARKER)));
}

#[test]
fn test_watch_event_reloads_without_mtime_change() {
    let harness = Harness::with_disallowed(&["a"]);
    let cache = PolicyCache::with_options(
        &harness.path,
        "default",
        CacheOptions {
            watch: true,
            mtime_poll_interval: Duration::from_secs(3600),
        },
    );
    assert!(cache.is_watching());

    let first = cache.redact_fields();
    assert!(first.contains("a"));
    assert!(Arc::ptr_eq(&first, &cache.redact_fields()));

    let meta = std::fs::metadata(&harness.path).expect("stat policy");
    let original = FileTime::from_last_modification_time(&meta);
    std::fs::write(&harness.path, policy_with(&["b"]).to_string()).expect("rewrite policy");
    filetime::set_file_mtime(&harness.path, original).expect("restore mtime");

    let deadline = Instant::now() + Duration::from_secs(10);
    let fields = loop {
        let fields = cache.redact_fields();
        if fields.contains("b") || Instant::now() > deadline {
            break fields;
        }
        std::thread::sleep(Duration::from_millis(20));
    };
    assert!(fields.contains("b"));
    assert!(!fields.contains("a"));
}

#[test]
fn test_policy_created_after_start_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("governance-policy.json");
    let (engine, counters) = engine_at(&path, Arc::new(NoopValidator));
    assert_eq!(engine.cache().status(), PolicyStatus::Missing);
    assert_eq!(counters.snapshot().policy_fail_open, 1);

    std::fs::write(&path, policy_with(&["token"]).to_string()).unwrap();

    let mut rec = record(&[("token", json!("abc"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("token"), Some(&json!(REDACTION_MARKER)));
    assert_eq!(engine.cache().status(), PolicyStatus::Loaded);
}

#[test]
fn test_malformed_policy_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("governance-policy.json");
    std::fs::write(&path, "this is not json at all").unwrap();

    let (engine, counters) = engine_at(&path, Arc::new(NoopValidator));
    assert!(engine.cache().redact_fields().is_empty());
    assert_eq!(engine.cache().status(), PolicyStatus::Malformed);

    let mut rec = record(&[("ssn", json!("111-22-3333")), ("password", json!("x"))]);
    let outcome = engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(outcome.redacted, 0);
    assert_eq!(rec.get("ssn"), Some(&json!("111-22-3333")));

    let snap = counters.snapshot();
    assert_eq!(snap.redactions, 0);
    assert_eq!(snap.policy_fail_open, 1);
}

#[test]
fn test_policy_without_profiles_fails_open() {
    let harness = Harness::new(&json!({"version": "1", "LoggingProfiles": {}}));
    let (engine, _) = harness.engine(Arc::new(NoopValidator));
    assert_eq!(engine.cache().status(), PolicyStatus::NoProfiles);
    assert!(engine.cache().redact_fields().is_empty());
}

// ============================================================================
// Validator failures and foreign maps
// ============================================================================

#[test]
fn test_validator_error_reaches_caller() {
    let harness = Harness::with_disallowed(&["ssn"]);
    let failing = |_: &mut LogRecord| -> Result<()> {
        Err(GovernanceError::validator("schema registry unreachable"))
    };
    let (engine, counters) = harness.engine(Arc::new(failing));

    let mut rec = record(&[("ssn", json!("111-22-3333"))]);
    let err = engine.validate_and_redact(&mut rec).unwrap_err();
    assert!(err.to_string().contains("schema registry unreachable"));
    assert_eq!(counters.snapshot().processed, 1);
    assert_eq!(counters.snapshot().redactions, 0);

    // The engine keeps working after a failure.
    let (engine, _) = harness.engine(Arc::new(NoopValidator));
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("ssn"), Some(&json!(REDACTION_MARKER)));
}

#[test]
fn test_foreign_map_redacted_and_tagged() {
    let harness = Harness::with_disallowed(&["Authorization"]);
    let tagger = |rec: &mut LogRecord| -> Result<()> {
        Violation::attach(rec, &[Violation::new("ForbiddenField", "cookie", "High", "")]);
        Ok(())
    };
    let (engine, _) = harness.engine(Arc::new(tagger));

    let mut map = Map::new();
    map.insert("authorization".into(), json!("Bearer abc"));
    map.insert("Cookie".into(), json!("sid=1"));
    map.insert("path".into(), json!("/health"));
    let outcome = engine
        .validate_and_redact_map(GovernanceContext::default(), &mut map)
        .unwrap();

    assert_eq!(outcome.redacted, 2);
    assert_eq!(map["authorization"], json!(REDACTION_MARKER));
    assert_eq!(map["Cookie"], json!(REDACTION_MARKER));
    assert_eq!(map["path"], json!("/health"));
    assert!(map.contains_key(VIOLATIONS_KEY));
}

#[test]
fn test_engine_from_config() {
    let harness = Harness::with_disallowed(&["ssn"]);
    let config = GovernanceConfig::default()
        .with_policy_path(&harness.path)
        .with_watch(false)
        .with_pool_capacity(Some(8));
    let engine = GovernanceEngine::from_config(&config, Arc::new(NoopValidator));

    let mut rec = record(&[("SSN", json!("1"))]);
    engine.validate_and_redact(&mut rec).unwrap();
    assert_eq!(rec.get("ssn"), Some(&json!(REDACTION_MARKER)));
    assert_eq!(engine.cache().path(), harness.path.as_path());
}
