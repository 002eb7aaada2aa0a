//! Cached redact set with hot-reload detection.
//!
//! The hot path performs an atomic staleness check and loads the current set
//! from an [`ArcSwapOption`] without locking. A reload reads the policy file
//! under a mutex, builds the complete new set, and stores it with one atomic
//! pointer swap. Readers therefore see either the previous set or the new
//! one, never a partially built set.
//!
//! Staleness is signalled by a filesystem watch on the policy's directory or
//! by the file's modification time moving past the one recorded at the last
//! load. If the watch cannot be started, modification times alone are used.

use crate::{FieldSet, MetricsSink, PolicyStatus, PolicyStore, Result};
use arc_swap::ArcSwapOption;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime};

/// Tuning for [`PolicyCache`].
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Start a filesystem watcher on the policy directory.
    pub watch: bool,

    /// Minimum time between modification-time checks. Zero checks on every call.
    pub mtime_poll_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            watch: true,
            mtime_poll_interval: Duration::ZERO,
        }
    }
}

/// Holds the redact set for one profile of one policy file.
pub struct PolicyCache {
    path: PathBuf,
    profile: String,
    options: CacheOptions,
    current: ArcSwapOption<FieldSet>,
    dirty: Arc<AtomicBool>,
    /// Modification time (ns since the epoch) seen at the last load; 0 if absent.
    loaded_mtime: AtomicU64,
    started: Instant,
    last_stat_ms: AtomicU64,
    /// Serializes reloads and records how the last one went.
    reload_lock: Mutex<PolicyStatus>,
    metrics: Option<Arc<dyn MetricsSink>>,
    watcher: Option<RecommendedWatcher>,
}

impl PolicyCache {
    /// Open a cache with default options and load the policy.
    pub fn open(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self::with_options(path, profile, CacheOptions::default())
    }

    /// Open a cache with explicit options and load the policy.
    pub fn with_options(
        path: impl Into<PathBuf>,
        profile: impl Into<String>,
        options: CacheOptions,
    ) -> Self {
        let path = path.into();
        let dirty = Arc::new(AtomicBool::new(false));

        let watcher = if options.watch {
            match start_watcher(&path, Arc::clone(&dirty)) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    tracing::warn!(
                        target: "governance.policy.watch",
                        path = %path.display(),
                        error = %err,
                        "policy watch unavailable, falling back to modification-time checks"
                    );
                    None
                }
            }
        } else {
            None
        };

        let cache = Self {
            path,
            profile: profile.into(),
            options,
            current: ArcSwapOption::empty(),
            dirty,
            loaded_mtime: AtomicU64::new(0),
            started: Instant::now(),
            last_stat_ms: AtomicU64::new(0),
            reload_lock: Mutex::new(PolicyStatus::Missing),
            metrics: None,
            watcher,
        };
        cache.reload();
        cache
    }

    /// Report fail-open loads to `metrics` from now on.
    pub fn set_metrics(&mut self, metrics: Arc<dyn MetricsSink>) {
        self.metrics = Some(metrics);
    }

    /// The current redact set, reloading first if the policy changed.
    pub fn redact_fields(&self) -> Arc<FieldSet> {
        if !self.is_stale(true) {
            if let Some(fields) = self.snapshot() {
                return fields;
            }
        }

        let mut status = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have finished the reload while we waited.
        if !self.is_stale(false) {
            if let Some(fields) = self.snapshot() {
                return fields;
            }
        }
        self.reload_locked(&mut status)
    }

    /// Force a reload regardless of staleness.
    pub fn reload(&self) -> Arc<FieldSet> {
        let mut status = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.reload_locked(&mut status)
    }

    /// Mark the cache stale; the next read reloads.
    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// How the most recent load went.
    pub fn status(&self) -> PolicyStatus {
        *self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a filesystem watcher is active.
    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// The policy file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The selected profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    fn snapshot(&self) -> Option<Arc<FieldSet>> {
        self.current.load_full()
    }

    fn is_stale(&self, throttled: bool) -> bool {
        self.dirty.load(Ordering::Acquire) || self.mtime_advanced(throttled)
    }

    fn mtime_advanced(&self, throttled: bool) -> bool {
        let interval = self.options.mtime_poll_interval;
        if throttled && !interval.is_zero() {
            let now_ms = self.started.elapsed().as_millis() as u64;
            let last = self.last_stat_ms.load(Ordering::Relaxed);
            if now_ms.saturating_sub(last) < interval.as_millis() as u64 {
                return false;
            }
            self.last_stat_ms.store(now_ms, Ordering::Relaxed);
        }
        file_mtime_nanos(&self.path) > self.loaded_mtime.load(Ordering::Acquire)
    }

    fn reload_locked(&self, status: &mut PolicyStatus) -> Arc<FieldSet> {
        // Clear before reading so a change during the read marks us stale again.
        self.dirty.store(false, Ordering::Release);
        let mtime = file_mtime_nanos(&self.path);

        let (fields, loaded) = PolicyStore::load_with_status(&self.path, &self.profile);
        if loaded.is_fail_open() {
            if let Some(metrics) = &self.metrics {
                metrics.record_policy_fail_open(loaded);
            }
        } else {
            tracing::info!(
                target: "governance.policy.reload",
                path = %self.path.display(),
                profile = %self.profile,
                fields = fields.len(),
                "policy loaded"
            );
        }

        let fields = Arc::new(fields);
        self.current.store(Some(Arc::clone(&fields)));
        self.loaded_mtime.store(mtime, Ordering::Release);
        self.last_stat_ms
            .store(self.started.elapsed().as_millis() as u64, Ordering::Relaxed);
        *status = loaded;
        fields
    }
}

impl std::fmt::Debug for PolicyCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyCache")
            .field("path", &self.path)
            .field("profile", &self.profile)
            .field("options", &self.options)
            .field("watching", &self.watcher.is_some())
            .finish()
    }
}

fn file_mtime_nanos(path: &Path) -> u64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|since| since.as_nanos() as u64)
        .unwrap_or(0)
}

/// Watch the policy's directory so atomic replace-by-rename is seen too.
fn start_watcher(path: &Path, dirty: Arc<AtomicBool>) -> Result<RecommendedWatcher> {
    let file_name = path.file_name().map(|name| name.to_os_string());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
        match event {
            // Reads of the policy, including our own reloads, change nothing.
            Ok(event) if matches!(event.kind, EventKind::Access(_)) => {}
            Ok(event) => {
                let touches_policy = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == file_name.as_deref());
                if touches_policy {
                    dirty.store(true, Ordering::Release);
                }
            }
            Err(_) => dirty.store(true, Ordering::Release),
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}
