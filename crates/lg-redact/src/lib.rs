//! Governance redaction engine for structured log records.
//!
//! This crate decides which fields of an outgoing log record must be hidden
//! and overwrites them in place before the record leaves the process.
//!
//! # Key Features
//!
//! - **Two-source redaction**: fields flagged by an external violation tagger
//!   are merged with fields the active policy profile forbids.
//! - **Hot reload**: the policy file is re-read when a filesystem watch fires
//!   or its modification time moves forward. Readers always see a complete set.
//! - **Pooled scratch space**: working maps and sets are rented from lock-free
//!   pools and returned on every exit path.
//! - **Relax bypass**: a caller can disable redaction for one logical
//!   operation through an explicit [`GovernanceContext`].
//! - **Fail-open**: a missing or malformed policy never blocks logging. It is
//!   reported through a warning and [`MetricsSink::record_policy_fail_open`].
//!
//! # Example
//!
//! ```no_run
//! use lg_redact::{GovernanceEngine, LogRecord, NoopValidator, PolicyCache};
//! use std::sync::Arc;
//!
//! let cache = PolicyCache::open("governance-policy.json", "default");
//! let engine = GovernanceEngine::new(cache, Arc::new(NoopValidator));
//!
//! let mut record = LogRecord::new();
//! record.insert("ssn", "111-22-3333");
//! record.insert("userId", "u1");
//!
//! engine.validate_and_redact(&mut record).unwrap();
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fields;
pub mod metrics;
pub mod policy;
pub mod pool;
pub mod record;
pub mod resolve;
pub mod validator;
pub mod violations;

pub use cache::{CacheOptions, PolicyCache};
pub use config::GovernanceConfig;
pub use context::GovernanceContext;
pub use engine::{GovernanceEngine, RedactionOutcome};
pub use error::{GovernanceError, Result};
pub use fields::FieldSet;
pub use metrics::{CountersSnapshot, GovernanceCounters, MetricsSink};
pub use policy::{PolicyDocument, PolicyStatus, PolicyStore, Profile};
pub use pool::{Pool, Poolable, Pooled};
pub use record::LogRecord;
pub use resolve::{resolve_policy_path, ConfigSource, ResolvedPolicy};
pub use validator::{NoopValidator, Validator};
pub use violations::{collect_forbidden_fields, extract_forbidden_fields, Violation, ViolationPayload};

/// Fixed sentinel written over every redacted value.
pub const REDACTION_MARKER: &str = "***REDACTED***";

/// Reserved record key holding the validator's violation list.
pub const VIOLATIONS_KEY: &str = "GovernanceViolations";

/// Reserved record key holding the relax flag.
pub const RELAXED_KEY: &str = "GovernanceRelaxed";
