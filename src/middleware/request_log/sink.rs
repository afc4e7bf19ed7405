//! Destinations for request records.
//!
//! | Sink | Output |
//! |---|---|
//! | [`ConsoleSink`] | `tracing-subscriber`'s human-readable format on stderr (the default) |
//! | [`JsonSink`] | one JSON object per line on any `Write`, tags keep their types |
//! | [`TracingSink`] | a `tracing` event per record, target `reqlog::request` |
//!
//! Writing is fire-and-forget: a sink that fails to write drops the record
//! rather than failing the request. Each record goes out as one line in a
//! single write, so records from concurrent requests never interleave.

use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Dispatch;
use tracing_subscriber::fmt::MakeWriter;

use super::record::{Field, Level, Record};

/// A structured-log destination shared by every in-flight request.
pub trait Sink: Send + Sync + 'static {
    fn write(&self, record: &Record);
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn write(&self, record: &Record) {
        (**self).write(record);
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&self, record: &Record) {
        (**self).write(record);
    }
}

// ── ConsoleSink ───────────────────────────────────────────────────────────────

/// Human-readable lines on stderr, formatted by a private
/// `tracing-subscriber` fmt subscriber.
///
/// The sink owns its subscriber, so records reach the console whether or
/// not the application installed a global one, and they are not duplicated
/// into it.
///
/// ```text
/// 2026-10-19T08:15:02.114203Z  WARN reqlog::request: Unprocessable Entity tag="request" id="3" status=422 method="GET" …
/// ```
#[derive(Clone, Debug)]
pub struct ConsoleSink {
    dispatch: Dispatch,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::build(io::stderr, true)
    }

    /// Formats onto `make_writer` instead of stderr, without ANSI colors.
    pub fn with_writer<W>(make_writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        Self::build(make_writer, false)
    }

    fn build<W>(make_writer: W, ansi: bool) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(make_writer)
            .with_ansi(ansi)
            .finish();
        Self { dispatch: Dispatch::new(subscriber) }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self { Self::new() }
}

impl Sink for ConsoleSink {
    fn write(&self, record: &Record) {
        tracing::dispatcher::with_default(&self.dispatch, || TracingSink.write(record));
    }
}

// ── JsonSink ──────────────────────────────────────────────────────────────────

/// One JSON object per record, newline-terminated.
///
/// ```rust
/// use reqlog::middleware::request_log::{JsonSink, RequestLog};
///
/// let log = RequestLog::builder()
///     .sink(JsonSink::new(std::io::stdout()))
///     .build();
/// ```
pub struct JsonSink<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> Sink for JsonSink<W> {
    fn write(&self, record: &Record) {
        let Ok(mut line) = serde_json::to_vec(record) else {
            return;
        };
        line.push(b'\n');

        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.write_all(&line).and_then(|()| out.flush());
    }
}

// ── TracingSink ───────────────────────────────────────────────────────────────

/// Forwards records to the current `tracing` subscriber.
///
/// `tracing` events have a fixed field set, so only the base request fields
/// travel as typed event fields (`tag`, `id`, `status`, `method`, `path`,
/// `remote_ip`, `latency_ms`). Every other field, typed tags included, is
/// collected into one JSON-encoded `fields` string: an `I64` tag arrives as
/// `{"attempt":2}` text, not as an integer event field. Use [`JsonSink`] when
/// tags must keep their types in the output.
///
/// Messages containing control characters or `=` are written in quoted,
/// escaped form so a record always stays on one line and its message cannot
/// pass for a field.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

const TYPED: [&str; 7] = ["tag", "id", "status", "method", "path", "remote_ip", "latency"];

impl Sink for TracingSink {
    fn write(&self, record: &Record) {
        let tag = record.str_field("tag").unwrap_or_default();
        let id = record.str_field("id").unwrap_or_default();
        let method = record.str_field("method").unwrap_or_default();
        let path = record.str_field("path").unwrap_or_default();
        let remote_ip = record.str_field("remote_ip").unwrap_or_default();
        let status = match record.field("status") {
            Some(Field::I64(s)) => *s,
            _ => 0,
        };
        let latency_ms = match record.field("latency") {
            Some(Field::Duration(d)) => d.as_nanos() as f64 / 1e6,
            _ => 0.0,
        };

        let rest = record.fields.iter()
            .filter(|(k, _)| !TYPED.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<Vec<_>>();
        let fields = serde_json::to_string(&Field::Object(rest)).unwrap_or_default();
        let message = one_line(&record.message);

        macro_rules! emit {
            ($lvl:expr) => {
                tracing::event!(
                    target: "reqlog::request",
                    $lvl,
                    tag,
                    id,
                    status,
                    method,
                    path,
                    remote_ip,
                    latency_ms,
                    fields = %fields,
                    "{}",
                    message
                )
            };
        }

        match record.level {
            Level::Info  => emit!(tracing::Level::INFO),
            Level::Warn  => emit!(tracing::Level::WARN),
            Level::Error => emit!(tracing::Level::ERROR),
        }
    }
}

fn one_line(message: &str) -> Cow<'_, str> {
    if message.contains(|c: char| c.is_control() || c == '=') {
        Cow::Owned(format!("{message:?}"))
    } else {
        Cow::Borrowed(message)
    }
}
