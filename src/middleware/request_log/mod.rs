//! Structured request logging.
//!
//! [`RequestLog`] times the rest of the chain and writes exactly one
//! [`Record`] per request to a [`Sink`]:
//!
//! | Field | Source |
//! |---|---|
//! | `tag` | always [`RECORD_TAG`] (`"request"`) |
//! | `id` | `X-Request-ID` request header, else a generated id echoed on the response |
//! | `status` | final response status, after error translation |
//! | `method`, `path`, `protocol`, `remote_ip` | the request |
//! | `latency` | time spent in the rest of the chain |
//!
//! plus whatever optional fields the [`Settings`] enable. Optional fields
//! whose value is missing or empty are left out rather than logged blank.
//!
//! The record's level follows the status: `warn` for 4xx, `error` for 5xx,
//! `info` otherwise. When the chain fails, the error goes through the
//! router's error handler so the client still gets a response, and its
//! message becomes the record's message.
//!
//! ```rust
//! use reqlog::{Request, Router};
//! use reqlog::middleware::request_log::{JsonSink, RequestLog};
//!
//! let app = Router::new()
//!     .get("/ok", |_req: Request| async { "ok" })
//!     .with(
//!         RequestLog::builder()
//!             .skip(|req| req.path() == "/healthz")
//!             .sink(JsonSink::new(std::io::stdout()))
//!             .log_user_agent()
//!             .tag_response_header("content-type")
//!             .build(),
//!     );
//! ```

mod record;
mod settings;
mod sink;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use http::StatusCode;

use crate::handler::{BoxFuture, Outcome};
use crate::locals::{Locals, Value};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

pub use record::{Field, Level, Record};
pub use settings::Settings;
pub use sink::{ConsoleSink, JsonSink, Sink, TracingSink};

/// Correlation header read from requests and set on responses.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Value of every record's `tag` field, for picking request lines out of a
/// shared log stream.
pub const RECORD_TAG: &str = "request";

/// Decides per request whether logging is bypassed.
pub type SkipFn = Arc<dyn Fn(&Request) -> bool + Send + Sync + 'static>;

/// The request-logging middleware. Register it with
/// [`Router::with`](crate::Router::with).
#[derive(Clone)]
pub struct RequestLog {
    inner: Arc<Inner>,
}

struct Inner {
    settings: Settings,
    skip: Option<SkipFn>,
    sink: Box<dyn Sink>,
    next_id: AtomicU64,
}

impl RequestLog {
    /// No optional fields, console output.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self::builder().settings(settings).build()
    }

    pub fn builder() -> RequestLogBuilder {
        RequestLogBuilder { settings: Settings::default(), skip: None, sink: None }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }
}

impl Default for RequestLog {
    fn default() -> Self { Self::new() }
}

impl Middleware for RequestLog {
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.intercept(req, next).await })
    }
}

// ── Interception ──────────────────────────────────────────────────────────────

/// What the record needs from the request, taken before the request moves
/// down the chain.
struct Seen {
    request_id: Option<String>,
    method: String,
    path: String,
    protocol: &'static str,
    remote_ip: String,
    host: String,
    user_agent: Option<String>,
    forwarded_for: Option<String>,
    tagged_headers: Vec<(String, String)>,
    locals: Locals,
}

impl Inner {
    async fn intercept(&self, req: Request, next: Next) -> Outcome {
        if self.skip.as_ref().is_some_and(|skip| skip(&req)) {
            return next.run(req).await;
        }

        let seen = self.observe(&req);
        let start = Instant::now();

        let (mut res, message) = match next.run(req).await {
            Ok(res) => (res, String::new()),
            Err(err) => {
                let res = next.handle_error(&err)
                    .unwrap_or_else(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR));
                (res, err.to_string())
            }
        };

        let latency = start.elapsed();
        let status = res.status_code();

        let id = match &seen.request_id {
            Some(id) => id.clone(),
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
                res.set_header(REQUEST_ID_HEADER, &id);
                id
            }
        };

        let mut record = Record::new(Level::for_status(status), message);
        record.push("tag", Field::Str(RECORD_TAG.to_owned()));
        record.push("id", Field::Str(id));
        record.push("status", Field::I64(status.as_u16().into()));
        record.push("method", Field::Str(seen.method));
        record.push("path", Field::Str(seen.path));
        record.push("remote_ip", Field::Str(seen.remote_ip.clone()));
        record.push("protocol", Field::Str(seen.protocol.to_owned()));
        record.push("latency", Field::Duration(latency));

        let settings = &self.settings;
        if settings.log_host && !seen.host.is_empty() {
            record.push("host", Field::Str(seen.host));
        }
        if let Some(ua) = seen.user_agent {
            record.push("user-agent", Field::Str(ua));
        }
        if settings.log_forwarded_for {
            let forwarded = seen.forwarded_for.unwrap_or(seen.remote_ip);
            record.push("forwarded_for", Field::Str(forwarded));
        }
        if let Some(key) = &settings.log_username {
            if let Some(Value::Str(username)) = seen.locals.get(key) {
                if !username.is_empty() {
                    record.push("username", Field::Str(username));
                }
            }
        }
        for (name, value) in seen.tagged_headers {
            record.push(name, Field::Str(value));
        }
        for name in &settings.tag_response_headers {
            if let Some(value) = res.header(name).filter(|v| !v.is_empty()) {
                record.push(name.clone(), Field::Str(value.to_owned()));
            }
        }
        for name in &settings.tags {
            if let Some(value) = seen.locals.get(name) {
                record.push(name.clone(), Field::from(&value));
            }
        }

        self.sink.write(&record);
        Ok(res)
    }

    fn observe(&self, req: &Request) -> Seen {
        let settings = &self.settings;
        let non_empty = |name: &str| req.header(name).filter(|v| !v.is_empty()).map(str::to_owned);

        Seen {
            request_id: non_empty(REQUEST_ID_HEADER),
            method: req.method().to_string(),
            path: req.path().to_owned(),
            protocol: req.protocol(),
            remote_ip: req.ip().to_string(),
            host: req.host().to_owned(),
            user_agent: settings.log_user_agent.then(|| non_empty("user-agent")).flatten(),
            forwarded_for: settings.log_forwarded_for.then(|| non_empty(FORWARDED_FOR_HEADER)).flatten(),
            tagged_headers: settings.tag_request_headers.iter()
                .filter_map(|name| Some((name.clone(), non_empty(name.as_str())?)))
                .collect(),
            locals: req.locals().clone(),
        }
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

/// Fluent builder for [`RequestLog`]. Every option starts disabled and the
/// sink defaults to [`ConsoleSink`].
pub struct RequestLogBuilder {
    settings: Settings,
    skip: Option<SkipFn>,
    sink: Option<Box<dyn Sink>>,
}

impl RequestLogBuilder {
    /// Requests for which `skip` returns `true` pass straight through: no
    /// timing, no record, no request id.
    pub fn skip<F>(mut self, skip: F) -> Self
    where
        F: Fn(&Request) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(skip));
        self
    }

    pub fn sink(mut self, sink: impl Sink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Replaces every serializable option at once.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn log_host(mut self) -> Self {
        self.settings.log_host = true;
        self
    }

    pub fn log_user_agent(mut self) -> Self {
        self.settings.log_user_agent = true;
        self
    }

    pub fn log_forwarded_for(mut self) -> Self {
        self.settings.log_forwarded_for = true;
        self
    }

    /// Logs the string local stored under `key` as `username`.
    pub fn log_username(mut self, key: &str) -> Self {
        self.settings.log_username = Some(key.to_owned());
        self
    }

    pub fn tag_request_header(mut self, name: &str) -> Self {
        self.settings.tag_request_headers.push(name.to_owned());
        self
    }

    pub fn tag_response_header(mut self, name: &str) -> Self {
        self.settings.tag_response_headers.push(name.to_owned());
        self
    }

    pub fn tag(mut self, key: &str) -> Self {
        self.settings.tags.push(key.to_owned());
        self
    }

    pub fn build(self) -> RequestLog {
        RequestLog {
            inner: Arc::new(Inner {
                settings: self.settings.normalized(),
                skip: self.skip,
                sink: self.sink.unwrap_or_else(|| Box::new(ConsoleSink::new())),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}
