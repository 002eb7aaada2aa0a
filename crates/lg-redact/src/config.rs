//! Engine configuration.
//!
//! Supports configuration via:
//! - Explicit overrides (builder methods)
//! - Environment variables (LOG_GOVERNANCE_*)
//! - A serialized config section (serde)

use crate::resolve::{resolve_policy_path, ResolvedPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the active profile.
pub const ENV_PROFILE: &str = "LOG_GOVERNANCE_PROFILE";

/// Environment variable toggling the policy file watcher.
pub const ENV_WATCH: &str = "LOG_GOVERNANCE_WATCH";

/// Environment variable capping idle pooled containers.
pub const ENV_POOL_CAPACITY: &str = "LOG_GOVERNANCE_POOL_CAPACITY";

/// Profile used when none is configured.
pub const DEFAULT_PROFILE: &str = "default";

/// Governance engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Policy file path; resolved from the environment when unset.
    pub policy_path: Option<PathBuf>,

    /// Active profile name.
    pub profile: String,

    /// Watch the policy file for changes.
    pub watch: bool,

    /// Minimum milliseconds between modification-time checks.
    pub mtime_poll_interval_ms: u64,

    /// Idle container ceiling for each pool; unbounded when unset.
    pub pool_capacity: Option<usize>,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        GovernanceConfig {
            policy_path: None,
            profile: DEFAULT_PROFILE.to_string(),
            watch: true,
            mtime_poll_interval_ms: 0,
            pool_capacity: None,
        }
    }
}

impl GovernanceConfig {
    /// Create config from environment and explicit overrides.
    pub fn from_env(policy_path: Option<PathBuf>, profile: Option<String>) -> Self {
        Self::from_lookup(policy_path, profile, |name| std::env::var(name).ok())
    }

    fn from_lookup(
        policy_path: Option<PathBuf>,
        profile: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = GovernanceConfig::default();

        if let Some(val) = env(ENV_PROFILE).filter(|v| !v.trim().is_empty()) {
            config.profile = val.trim().to_string();
        }

        if let Some(val) = env(ENV_WATCH) {
            match val.trim().to_lowercase().as_str() {
                "0" | "false" | "off" | "no" => config.watch = false,
                "1" | "true" | "on" | "yes" => config.watch = true,
                _ => {}
            }
        }

        if let Some(val) = env(ENV_POOL_CAPACITY) {
            if let Ok(cap) = val.trim().parse::<usize>() {
                config.pool_capacity = Some(cap);
            }
        }

        // Explicit overrides take final precedence
        if let Some(path) = policy_path {
            config.policy_path = Some(path);
        }
        if let Some(profile) = profile {
            config.profile = profile;
        }

        config
    }

    /// Resolve the policy path (explicit → environment → working directory).
    pub fn resolve_policy(&self) -> ResolvedPolicy {
        resolve_policy_path(self.policy_path.as_deref())
    }

    /// The modification-time poll interval.
    pub fn mtime_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mtime_poll_interval_ms)
    }

    /// Set the policy path.
    pub fn with_policy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.policy_path = Some(path.into());
        self
    }

    /// Set the profile.
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    /// Enable or disable the file watcher.
    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Cap idle pooled containers.
    pub fn with_pool_capacity(mut self, capacity: Option<usize>) -> Self {
        self.pool_capacity = capacity;
        self
    }
}
