//! Relaxed logging scopes.
//!
//! A relaxed scope is a tracing span carrying `governance_relaxed = true`.
//! [`GovernanceLayer`](crate::GovernanceLayer) treats every event inside such
//! a span as relaxed. Spans follow a future through `.await` points when it is
//! instrumented, and tasks that never entered the span cannot see it.
//!
//! A filter that selects by target would disable relaxed spans along with
//! everything else it does not name. Wrap such a filter with [`relax_aware`]
//! and attach it to the governance layer so relaxed spans stay enabled.

use lg_redact::GovernanceContext;
use std::future::Future;
use tracing::instrument::Instrumented;
use tracing::{Instrument, Metadata, Span};
use tracing_subscriber::filter::combinator::Or;
use tracing_subscriber::filter::{FilterExt, FilterFn};
use tracing_subscriber::layer::Filter;

/// Span field that marks a scope as relaxed.
pub const RELAXED_FIELD: &str = "governance_relaxed";

/// Target of relaxed scope spans.
pub const RELAXED_TARGET: &str = "governance.relaxed";

/// Create a span that relaxes governance for everything logged inside it.
///
/// The span is only seen by layers whose filter enables it; see [`relax_aware`].
pub fn relaxed_span() -> Span {
    tracing::error_span!(target: RELAXED_TARGET, "governance_relaxed", governance_relaxed = true)
}

/// Extend `filter` so it also enables relaxed spans.
///
/// Events are still filtered by `filter` alone.
///
/// ```no_run
/// use lg_logging::{relax_aware, GovernanceLayer};
/// use tracing_subscriber::layer::SubscriberExt;
/// use tracing_subscriber::{EnvFilter, Layer};
/// # fn engine() -> std::sync::Arc<lg_redact::GovernanceEngine> { unimplemented!() }
///
/// let layer = GovernanceLayer::stderr(engine())
///     .with_filter(relax_aware(EnvFilter::new("app=info")));
/// let subscriber = tracing_subscriber::registry().with(layer);
/// ```
pub fn relax_aware<S, F>(filter: F) -> Or<F, FilterFn, S>
where
    F: Filter<S>,
{
    <F as FilterExt<S>>::or(filter, FilterFn::new(is_relaxed_span as fn(&Metadata<'_>) -> bool))
}

fn is_relaxed_span(meta: &Metadata<'_>) -> bool {
    meta.is_span() && meta.target() == RELAXED_TARGET
}

/// Create a span reflecting `ctx`: relaxed if the context is, disabled otherwise.
pub fn span_for(ctx: GovernanceContext) -> Span {
    if ctx.is_relaxed() {
        relaxed_span()
    } else {
        Span::none()
    }
}

/// Runs code with governance relaxed for known-safe call sites.
///
/// ```no_run
/// use lg_logging::RelaxedLogger;
///
/// let relaxed = RelaxedLogger::new();
/// relaxed.scope(|| {
///     tracing::info!(user_email = "ops@example.com", "support contact");
/// });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedLogger;

impl RelaxedLogger {
    pub fn new() -> Self {
        Self
    }

    /// Run `f` inside a relaxed span.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        relaxed_span().in_scope(f)
    }

    /// Relax governance for every poll of `future`.
    pub fn instrument<F: Future>(&self, future: F) -> Instrumented<F> {
        future.instrument(relaxed_span())
    }

    /// The context a relaxed scope carries.
    pub fn context(&self) -> GovernanceContext {
        GovernanceContext::relaxed()
    }
}
