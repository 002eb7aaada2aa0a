//! Governance counters and the metrics sink seam.

use crate::PolicyStatus;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Receiver of the engine's counter increments.
///
/// Implementations must be cheap and thread-safe; they are called on every
/// log record.
pub trait MetricsSink: Send + Sync {
    /// One record entered the engine.
    fn increment_processed(&self);

    /// `count` violations were observed on a record.
    fn increment_violations(&self, count: u64);

    /// `count` fields were overwritten with the redaction marker.
    fn increment_redactions(&self, count: u64);

    /// A policy load degraded to an empty redact set.
    fn record_policy_fail_open(&self, _status: PolicyStatus) {}
}

/// Point-in-time copy of [`GovernanceCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountersSnapshot {
    pub processed: u64,
    pub violations: u64,
    pub redactions: u64,
    pub policy_fail_open: u64,
}

/// Process-wide atomic counters.
///
/// Construct once at startup and share through an `Arc`; [`reset`](Self::reset)
/// exists for test setup.
#[derive(Debug, Default)]
pub struct GovernanceCounters {
    processed: AtomicU64,
    violations: AtomicU64,
    redactions: AtomicU64,
    policy_fail_open: AtomicU64,
}

impl GovernanceCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            violations: self.violations.load(Ordering::Relaxed),
            redactions: self.redactions.load(Ordering::Relaxed),
            policy_fail_open: self.policy_fail_open.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
        self.violations.store(0, Ordering::Relaxed);
        self.redactions.store(0, Ordering::Relaxed);
        self.policy_fail_open.store(0, Ordering::Relaxed);
    }
}

impl MetricsSink for GovernanceCounters {
    fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_violations(&self, count: u64) {
        if count > 0 {
            self.violations.fetch_add(count, Ordering::Relaxed);
        }
    }

    fn increment_redactions(&self, count: u64) {
        if count > 0 {
            self.redactions.fetch_add(count, Ordering::Relaxed);
        }
    }

    fn record_policy_fail_open(&self, _status: PolicyStatus) {
        self.policy_fail_open.fetch_add(1, Ordering::Relaxed);
    }
}
