//! Tracing layer that governs each event before writing it.
//!
//! Event fields are collected into a pooled [`LogRecord`], passed through the
//! [`GovernanceEngine`], and written as one human-readable or JSONL line. The
//! formatted message is written as-is and is not a governed field.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use lg_redact::{GovernanceContext, GovernanceEngine, LogRecord, Pool};
use serde::Serialize;
use serde_json::Value;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::relaxed::RELAXED_FIELD;
use crate::LogFormat;

/// Module path of the governance engine. Its own events carry counts only and
/// are written without a governance pass.
pub const ENGINE_MODULE: &str = "lg_redact";

/// Event written in place of a record the validator rejected.
pub const RECORD_DROPPED_EVENT: &str = "governance.record_dropped";

/// Relax state stored in span extensions.
#[derive(Debug, Clone, Copy, Default)]
struct SpanGovernance {
    relaxed: bool,
}

/// Reads the relax field from span attributes.
#[derive(Default)]
struct SpanGovernanceVisitor {
    relaxed: Option<bool>,
}

impl Visit for SpanGovernanceVisitor {
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == RELAXED_FIELD {
            self.relaxed = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == RELAXED_FIELD {
            self.relaxed = Some(value.eq_ignore_ascii_case("true"));
        }
    }

    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
}

/// Collects event fields into a log record.
struct RecordVisitor<'a> {
    record: &'a mut LogRecord,
    message: Option<String>,
}

impl<'a> RecordVisitor<'a> {
    fn new(record: &'a mut LogRecord) -> Self {
        RecordVisitor {
            record,
            message: None,
        }
    }
}

impl Visit for RecordVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.record.insert(field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(s);
        } else {
            self.record.insert(field.name(), s);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.record.insert(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        match serde_json::Number::from_f64(value) {
            Some(n) => self.record.insert(field.name(), Value::Number(n)),
            // NaN and the infinities have no JSON number form.
            None => self.record.insert(field.name(), value.to_string()),
        };
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.record.insert(field.name(), value);
    }
}

/// Count of records dropped because the validator failed.
#[derive(Debug, Clone, Default)]
pub struct DroppedRecords(Arc<AtomicU64>);

impl DroppedRecords {
    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    ts: String,
    level: &'static str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "no_fields")]
    fields: &'a LogRecord,
}

fn no_fields(record: &&LogRecord) -> bool {
    record.is_empty()
}

/// Governance layer writing to stderr by default.
pub struct GovernanceLayer<W = io::Stderr> {
    engine: Arc<GovernanceEngine>,
    writer: Mutex<W>,
    format: LogFormat,
    timestamps: bool,
    dropped: DroppedRecords,
    records: Pool<LogRecord>,
}

impl GovernanceLayer<io::Stderr> {
    /// Create a layer writing to stderr.
    pub fn stderr(engine: Arc<GovernanceEngine>) -> Self {
        GovernanceLayer::new(engine, io::stderr())
    }
}

impl<W: Write> GovernanceLayer<W> {
    /// Create a layer with a custom writer.
    pub fn new(engine: Arc<GovernanceEngine>, writer: W) -> Self {
        GovernanceLayer {
            engine,
            writer: Mutex::new(writer),
            format: LogFormat::default(),
            timestamps: true,
            dropped: DroppedRecords::default(),
            records: Pool::unbounded(),
        }
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Include timestamps in human output.
    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// A handle on the dropped-record counter.
    pub fn dropped(&self) -> DroppedRecords {
        self.dropped.clone()
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }

    fn render(&self, meta: &Metadata<'_>, target: &str, message: Option<&str>, record: &LogRecord) -> String {
        match self.format {
            LogFormat::Jsonl => {
                let line = JsonLine {
                    ts: Utc::now().to_rfc3339(),
                    level: level_name(meta.level()),
                    event: target,
                    message,
                    fields: record,
                };
                serde_json::to_string(&line).unwrap_or_default()
            }
            LogFormat::Human => {
                let mut line = String::new();
                if self.timestamps {
                    let _ = write!(line, "{} ", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"));
                }
                let _ = write!(line, "{:>5} {}:", meta.level().as_str(), target);
                if let Some(msg) = message {
                    line.push(' ');
                    line.push_str(msg);
                }
                for (key, value) in record.iter() {
                    let _ = match value {
                        Value::String(s) => write!(line, " {}={}", key, s),
                        other => write!(line, " {}={}", key, other),
                    };
                }
                line
            }
        }
    }
}

impl<S, W> Layer<S> for GovernanceLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanGovernanceVisitor::default();
        attrs.record(&mut visitor);

        if let (Some(relaxed), Some(span)) = (visitor.relaxed, ctx.span(id)) {
            span.extensions_mut().insert(SpanGovernance { relaxed });
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = SpanGovernanceVisitor::default();
        values.record(&mut visitor);

        if let (Some(relaxed), Some(span)) = (visitor.relaxed, ctx.span(id)) {
            let mut extensions = span.extensions_mut();
            match extensions.get_mut::<SpanGovernance>() {
                Some(existing) => existing.relaxed = relaxed,
                None => extensions.insert(SpanGovernance { relaxed }),
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        let target = meta.target();

        let mut record = self.records.rent();
        let mut visitor = RecordVisitor::new(&mut record);
        event.record(&mut visitor);
        let message = visitor.message;

        if !is_engine_event(meta) {
            let scope = scope_context(event, &ctx);
            if let Err(err) = self.engine.validate_and_redact_in(scope, &mut record) {
                self.dropped.increment();
                record.clear();
                record.insert("target", target);
                record.insert("error", err.to_string());
                let line = self.render(meta, RECORD_DROPPED_EVENT, None, &record);
                self.write_line(&line);
                return;
            }
        }

        let line = self.render(meta, target, message.as_deref(), &record);
        self.write_line(&line);
    }
}

/// Whether the event was emitted from inside the governance engine.
fn is_engine_event(meta: &Metadata<'_>) -> bool {
    meta.module_path().is_some_and(|path| {
        path.strip_prefix(ENGINE_MODULE)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

/// Relaxed if any span enclosing the event is relaxed.
fn scope_context<S>(event: &Event<'_>, ctx: &Context<'_, S>) -> GovernanceContext
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let relaxed = ctx
        .event_scope(event)
        .map(|mut scope| {
            scope.any(|span| {
                span.extensions()
                    .get::<SpanGovernance>()
                    .is_some_and(|g| g.relaxed)
            })
        })
        .unwrap_or(false);
    GovernanceContext::governed().with_relaxed(relaxed)
}

fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}
