//! Main governance engine.
//!
//! The GovernanceEngine runs one validation/redaction pass per log record:
//! relax check, external tagging, collection of the fields to hide from both
//! the violations and the active policy, and the in-place overwrite.

use crate::{
    collect_forbidden_fields, CacheOptions, FieldSet, GovernanceConfig, GovernanceContext,
    GovernanceCounters, LogRecord, MetricsSink, PolicyCache, Pool, Pooled, Result, Validator,
    REDACTION_MARKER, RELAXED_KEY,
};
use crate::record::is_relax_value;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Result of one pass over a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionOutcome {
    /// The record bypassed governance.
    pub relaxed: bool,

    /// Well-formed violations observed on the record.
    pub violations: usize,

    /// Fields overwritten with the redaction marker.
    pub redacted: usize,
}

impl RedactionOutcome {
    fn bypassed() -> Self {
        Self {
            relaxed: true,
            ..Self::default()
        }
    }
}

/// The governance engine.
pub struct GovernanceEngine {
    /// Redact set for the active profile.
    cache: PolicyCache,

    /// External violation tagger.
    validator: Arc<dyn Validator>,

    /// Counter sink.
    metrics: Arc<dyn MetricsSink>,

    /// Working copies for foreign maps.
    records: Pool<LogRecord>,

    /// Redact-set scratch space.
    sets: Pool<FieldSet>,
}

impl GovernanceEngine {
    /// Create an engine with fresh counters and unbounded pools.
    pub fn new(cache: PolicyCache, validator: Arc<dyn Validator>) -> Self {
        let metrics: Arc<dyn MetricsSink> = Arc::new(GovernanceCounters::new());
        let mut cache = cache;
        cache.set_metrics(Arc::clone(&metrics));

        Self {
            cache,
            validator,
            metrics,
            records: Pool::unbounded(),
            sets: Pool::unbounded(),
        }
    }

    /// Build an engine from configuration.
    pub fn from_config(config: &GovernanceConfig, validator: Arc<dyn Validator>) -> Self {
        let resolved = config.resolve_policy();
        tracing::debug!(
            target: "governance.engine.init",
            path = %resolved.path.display(),
            source = %resolved.source,
            profile = %config.profile,
            "resolved governance policy"
        );

        let cache = PolicyCache::with_options(
            resolved.path,
            config.profile.clone(),
            CacheOptions {
                watch: config.watch,
                mtime_poll_interval: config.mtime_poll_interval(),
            },
        );
        Self::new(cache, validator).with_pool_capacity(config.pool_capacity)
    }

    /// Send counters to `metrics` instead of the built-in counters.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        let status = self.cache.status();
        if status.is_fail_open() {
            metrics.record_policy_fail_open(status);
        }
        self.cache.set_metrics(Arc::clone(&metrics));
        self.metrics = metrics;
        self
    }

    /// Cap the number of idle pooled containers. `None` leaves pools unbounded.
    pub fn with_pool_capacity(mut self, capacity: Option<usize>) -> Self {
        self.records = Pool::with_capacity(capacity);
        self.sets = Pool::with_capacity(capacity);
        self
    }

    /// Validate and redact `record` in place under a governed context.
    pub fn validate_and_redact(&self, record: &mut LogRecord) -> Result<RedactionOutcome> {
        self.validate_and_redact_in(GovernanceContext::default(), record)
    }

    /// Validate and redact `record` in place under `ctx`.
    pub fn validate_and_redact_in(
        &self,
        ctx: GovernanceContext,
        record: &mut LogRecord,
    ) -> Result<RedactionOutcome> {
        self.metrics.increment_processed();

        if record.is_relaxed() {
            return Ok(RedactionOutcome::bypassed());
        }
        if ctx.is_relaxed() {
            record.set_relaxed(true);
            return Ok(RedactionOutcome::bypassed());
        }

        let (outcome, _) = self.redact_working(record)?;
        self.record_outcome(&outcome);
        Ok(outcome)
    }

    /// Validate and redact a foreign JSON object.
    ///
    /// The map is copied into a pooled case-insensitive record and processed.
    /// Only redacted fields, fields the validator changed, and fields the
    /// validator added are copied back.
    pub fn validate_and_redact_map(
        &self,
        ctx: GovernanceContext,
        map: &mut Map<String, Value>,
    ) -> Result<RedactionOutcome> {
        self.metrics.increment_processed();

        if map_is_relaxed(map) {
            return Ok(RedactionOutcome::bypassed());
        }
        if ctx.is_relaxed() {
            stamp_relaxed(map);
            return Ok(RedactionOutcome::bypassed());
        }

        let mut working = self.records.rent();
        working.copy_from_map(map);
        let (outcome, redacted) = self.redact_working(&mut working)?;
        working.write_back(map, &redacted);
        self.record_outcome(&outcome);
        Ok(outcome)
    }

    /// The policy cache.
    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    /// The metrics sink.
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    /// One pass over a working record. Also returns the fields that were
    /// overwritten.
    fn redact_working(
        &self,
        working: &mut LogRecord,
    ) -> Result<(RedactionOutcome, Pooled<'_, FieldSet>)> {
        self.validator.tag_violations(working)?;

        let mut fields = self.sets.rent();
        let violations = collect_forbidden_fields(working, &mut fields);
        fields.extend_from(&self.cache.redact_fields());

        let mut hits = self.sets.rent();
        for field in fields.iter() {
            if let Some(value) = working.get_mut(field) {
                *value = Value::String(REDACTION_MARKER.to_string());
                hits.insert(field);
            }
        }
        let redacted = hits.len();

        tracing::debug!(
            target: "governance.engine.pass",
            violations,
            candidates = fields.len(),
            redacted,
            "record governed"
        );

        let outcome = RedactionOutcome {
            relaxed: false,
            violations,
            redacted,
        };
        Ok((outcome, hits))
    }

    fn record_outcome(&self, outcome: &RedactionOutcome) {
        self.metrics.increment_violations(outcome.violations as u64);
        self.metrics.increment_redactions(outcome.redacted as u64);
    }
}

fn map_is_relaxed(map: &Map<String, Value>) -> bool {
    map.iter()
        .any(|(key, value)| key.eq_ignore_ascii_case(RELAXED_KEY) && is_relax_value(value))
}

/// Set the relax flag on a map whose own flag is absent or false.
fn stamp_relaxed(map: &mut Map<String, Value>) {
    let existing = map
        .iter_mut()
        .find_map(|(key, value)| key.eq_ignore_ascii_case(RELAXED_KEY).then_some(value));
    match existing {
        Some(value) => *value = Value::Bool(true),
        None => {
            map.insert(RELAXED_KEY.to_string(), Value::Bool(true));
        }
    }
}

impl std::fmt::Debug for GovernanceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceEngine")
            .field("cache", &self.cache)
            .field("idle_records", &self.records.idle())
            .field("idle_sets", &self.sets.idle())
            .finish()
    }
}
