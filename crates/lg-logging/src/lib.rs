//! Governed structured logging.
//!
//! Installs a tracing subscriber whose output layer runs every event through
//! an [`lg_redact::GovernanceEngine`] before it is written:
//! - Human-readable single-line output for interactive use
//! - Machine-parseable JSONL for collectors
//!
//! # Usage
//!
//! ```no_run
//! use lg_logging::{init_logging, LogConfig, RelaxedLogger};
//! use lg_redact::{GovernanceConfig, GovernanceEngine, NoopValidator};
//! use std::sync::Arc;
//!
//! let governance = GovernanceConfig::from_env(None, None);
//! let engine = Arc::new(GovernanceEngine::from_config(&governance, Arc::new(NoopValidator)));
//! let handle = init_logging(&LogConfig::from_env(None, None), engine).unwrap();
//!
//! tracing::info!(target: "app.signup", ssn = "111-22-3333", "user created");
//!
//! RelaxedLogger::new().scope(|| {
//!     tracing::info!(target: "app.support", email = "ops@example.com", "contact");
//! });
//! assert_eq!(handle.dropped_records(), 0);
//! ```
//!
//! # Design Notes
//!
//! - All log output goes to stderr unless a writer is supplied to [`GovernanceLayer`]
//! - Events emitted from inside `lg_redact` carry counts only and are not governed again
//! - The filter is attached to the governance layer and keeps relaxed spans enabled
//! - A record the validator rejects is replaced by a `governance.record_dropped` line

pub mod config;
pub mod error;
pub mod layer;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod relaxed;

pub use config::{LogConfig, LogFormat};
pub use error::{LoggingError, Result};
pub use layer::{DroppedRecords, GovernanceLayer};
#[cfg(feature = "metrics")]
pub use metrics::PrometheusMetrics;
pub use relaxed::{relax_aware, relaxed_span, span_for, RelaxedLogger};

use lg_redact::{GovernanceConfig, GovernanceEngine, NoopValidator};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// What [`init_logging`] installed.
#[derive(Debug, Clone)]
pub struct LoggingHandle {
    engine: Arc<GovernanceEngine>,
    dropped: DroppedRecords,
}

impl LoggingHandle {
    /// The engine governing log output.
    pub fn engine(&self) -> &Arc<GovernanceEngine> {
        &self.engine
    }

    /// Records dropped because the validator failed.
    pub fn dropped_records(&self) -> u64 {
        self.dropped.count()
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. Events are
/// filtered by `config.directives` only.
pub fn init_logging(config: &LogConfig, engine: Arc<GovernanceEngine>) -> Result<LoggingHandle> {
    let filter = relax_aware(config.env_filter()?);

    let layer = GovernanceLayer::stderr(Arc::clone(&engine))
        .with_format(config.format)
        .with_timestamps(config.timestamps);
    let dropped = layer.dropped();

    tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init()
        .map_err(|err| LoggingError::AlreadyInitialized(err.to_string()))?;

    Ok(LoggingHandle { engine, dropped })
}

/// Initialize logging and governance entirely from the environment.
///
/// No violation tagger is wired in; only policy-driven redaction applies.
pub fn init_from_env() -> Result<LoggingHandle> {
    let governance = GovernanceConfig::from_env(None, None);
    let engine = GovernanceEngine::from_config(&governance, Arc::new(NoopValidator));
    init_logging(&LogConfig::from_env(None, None), Arc::new(engine))
}
