//! Policy path resolution.
//!
//! Resolution order: explicit argument → environment variables → default
//! filename in the working directory.

use std::path::{Path, PathBuf};

/// Where the policy path came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    /// Passed explicitly by the caller.
    Explicit,

    /// Set via `LOG_GOVERNANCE_POLICY`.
    Environment,

    /// Found through `LOG_GOVERNANCE_CONFIG_DIR`.
    ConfigDir,

    /// Default filename in the working directory.
    #[default]
    WorkingDirectory,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Explicit => write!(f, "explicit path"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigDir => write!(f, "config directory"),
            ConfigSource::WorkingDirectory => write!(f, "working directory"),
        }
    }
}

/// A resolved policy path and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub path: PathBuf,
    pub source: ConfigSource,
}

/// Environment variable naming the policy file.
pub const ENV_POLICY_PATH: &str = "LOG_GOVERNANCE_POLICY";

/// Environment variable naming a directory holding the default policy file.
pub const ENV_CONFIG_DIR: &str = "LOG_GOVERNANCE_CONFIG_DIR";

/// Default policy filename.
pub const POLICY_FILENAME: &str = "governance-policy.json";

/// Resolve the policy path.
///
/// An explicit path or `LOG_GOVERNANCE_POLICY` is used even if the file does
/// not exist yet, so a policy dropped in later is picked up by hot reload.
/// `LOG_GOVERNANCE_CONFIG_DIR` is only used when the file exists there.
pub fn resolve_policy_path(explicit: Option<&Path>) -> ResolvedPolicy {
    resolve_with(explicit, |name| std::env::var(name).ok())
}

fn resolve_with(explicit: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> ResolvedPolicy {
    // 1. Explicit argument
    if let Some(path) = explicit {
        return ResolvedPolicy {
            path: path.to_path_buf(),
            source: ConfigSource::Explicit,
        };
    }

    // 2. Environment variable (direct path)
    if let Some(env_path) = env(ENV_POLICY_PATH).filter(|p| !p.trim().is_empty()) {
        return ResolvedPolicy {
            path: PathBuf::from(env_path),
            source: ConfigSource::Environment,
        };
    }

    // 3. Environment variable (config dir)
    if let Some(config_dir) = env(ENV_CONFIG_DIR) {
        let path = PathBuf::from(config_dir).join(POLICY_FILENAME);
        if path.exists() {
            return ResolvedPolicy {
                path,
                source: ConfigSource::ConfigDir,
            };
        }
    }

    // 4. Working directory default
    ResolvedPolicy {
        path: PathBuf::from(POLICY_FILENAME),
        source: ConfigSource::WorkingDirectory,
    }
}
