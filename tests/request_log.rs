use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqlog::middleware::request_log::{Field, Level, RECORD_TAG, Record, RequestLog, RequestLogBuilder, Settings, Sink};
use reqlog::{Error, Next, Outcome, Request, Response, Router, Service, StatusCode, Value};

// ── Helpers ───────────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<Record>>>);

impl Sink for Capture {
    fn write(&self, record: &Record) {
        self.0.lock().unwrap().push(record.clone());
    }
}

impl Capture {
    fn records(&self) -> Vec<Record> {
        self.0.lock().unwrap().clone()
    }

    fn only(&self) -> Record {
        let records = self.records();
        assert_eq!(records.len(), 1, "expected exactly one record, got {records:#?}");
        records.into_iter().next().unwrap()
    }
}

async fn ok(_req: Request) -> Response {
    Response::builder().bytes("text/plain", "ok")
}

async fn warn(_req: Request) -> Result<Response, Error> {
    Err(Error::status(StatusCode::UNPROCESSABLE_ENTITY))
}

async fn err(_req: Request) -> Result<Response, Error> {
    Err(Error::status(StatusCode::INTERNAL_SERVER_ERROR))
}

fn app(log: RequestLogBuilder, capture: &Capture) -> Service {
    Router::new()
        .get("/ok", ok)
        .get("/warn", warn)
        .get("/err", err)
        .get("/private", ok)
        .with(log.sink(capture.clone()).build())
        .into_service()
}

fn get(path: &str) -> Request {
    Request::builder().uri(path).build()
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ok_request_logs_info_with_response_header() {
    let capture = Capture::default();
    let app = app(RequestLog::builder().tag_response_header("content-type"), &capture);

    let res = app.handle(get("/ok")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.body(), b"ok");

    let record = capture.only();
    assert_eq!(record.level, Level::Info);
    assert_eq!(record.message, "");
    assert_eq!(record.field("status"), Some(&Field::I64(200)));
    assert_eq!(record.str_field("method"), Some("GET"));
    assert_eq!(record.str_field("path"), Some("/ok"));
    assert_eq!(record.str_field("content-type"), Some("text/plain"));
    assert_eq!(record.str_field("remote_ip"), Some("127.0.0.1"));
    assert_eq!(record.str_field("protocol"), Some("HTTP/1.1"));
    assert!(matches!(record.field("latency"), Some(Field::Duration(_))));
}

#[tokio::test]
async fn every_record_leads_with_the_request_tag() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    app.handle(get("/ok")).await;
    app.handle(get("/err")).await;

    for record in capture.records() {
        let (key, value) = &record.fields[0];
        assert_eq!(key, "tag");
        assert_eq!(value, &Field::Str(RECORD_TAG.into()));
    }
    assert_eq!(capture.records().len(), 2);
}

#[tokio::test]
async fn client_errors_log_warn_with_message() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    let res = app.handle(get("/warn")).await;
    assert_eq!(res.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let record = capture.only();
    assert_eq!(record.level, Level::Warn);
    assert_eq!(record.field("status"), Some(&Field::I64(422)));
    assert_eq!(record.message, "Unprocessable Entity");
}

#[tokio::test]
async fn server_errors_log_error_with_message() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    let res = app.handle(get("/err")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let record = capture.only();
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.field("status"), Some(&Field::I64(500)));
    assert_eq!(record.message, "Internal Server Error");
}

#[tokio::test]
async fn unmatched_routes_log_warn() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    let res = app.handle(get("/")).await;
    assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

    let record = capture.only();
    assert_eq!(record.level, Level::Warn);
    assert_eq!(record.message, "Cannot GET /");
}

#[tokio::test]
async fn skipped_requests_produce_no_record() {
    let capture = Capture::default();
    let app = app(
        RequestLog::builder().skip(|req| req.path() == "/private"),
        &capture,
    );

    let res = app.handle(get("/private")).await;
    assert_eq!(res.status_code(), StatusCode::OK);
    assert_eq!(res.header("x-request-id"), None);
    assert!(capture.records().is_empty());

    app.handle(get("/ok")).await;
    assert_eq!(capture.records().len(), 1);
}

#[tokio::test]
async fn one_record_per_request() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    for path in ["/ok", "/warn", "/err", "/missing", "/ok"] {
        app.handle(get(path)).await;
    }

    let statuses = capture.records().iter()
        .map(|r| r.field("status").cloned())
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        [200, 422, 500, 404, 200].map(|s| Some(Field::I64(s))).to_vec(),
    );
}

// ── Outcome passed up the chain ───────────────────────────────────────────────

/// Records whether the outcome coming back from the inner chain was an error.
fn outcome_recorder(seen: Arc<Mutex<Vec<bool>>>) -> impl Fn(Request, Next) -> reqlog::BoxFuture + Send + Sync + 'static {
    move |req, next| {
        let seen = Arc::clone(&seen);
        Box::pin(async move {
            let outcome: Outcome = next.run(req).await;
            seen.lock().unwrap().push(outcome.is_err());
            outcome
        })
    }
}

#[tokio::test]
async fn logged_requests_never_fail_but_skipped_ones_pass_errors_through() {
    let capture = Capture::default();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let app = Router::new()
        .get("/warn", warn)
        .get("/private", warn)
        .with(outcome_recorder(Arc::clone(&seen)))
        .with(
            RequestLog::builder()
                .skip(|req| req.path() == "/private")
                .sink(capture.clone())
                .build(),
        )
        .into_service();

    let logged = app.handle(get("/warn")).await;
    let skipped = app.handle(get("/private")).await;

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    assert_eq!(logged.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(skipped.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(capture.records().len(), 1);
}

#[tokio::test]
async fn failing_error_translation_forces_500() {
    let capture = Capture::default();
    let app = Router::new()
        .get("/warn", warn)
        .on_error(|_| Err(Error::with_message(StatusCode::INTERNAL_SERVER_ERROR, "translator broke")))
        .with(RequestLog::builder().sink(capture.clone()).build())
        .into_service();

    let res = app.handle(get("/warn")).await;
    assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    let record = capture.only();
    assert_eq!(record.level, Level::Error);
    assert_eq!(record.field("status"), Some(&Field::I64(500)));
    assert_eq!(record.message, "Unprocessable Entity");
}

// ── Correlation id ────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbound_request_id_is_reused() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    let req = Request::builder().uri("/ok").header("x-request-id", "abc-123").build();
    let res = app.handle(req).await;

    assert_eq!(capture.only().str_field("id"), Some("abc-123"));
    assert_eq!(res.header("X-Request-ID"), None);
}

#[tokio::test]
async fn missing_request_id_is_generated_and_echoed() {
    let capture = Capture::default();
    let app = app(RequestLog::builder(), &capture);

    let first = app.handle(get("/ok")).await;
    let second = app.handle(get("/err")).await;

    let ids = capture.records().iter()
        .map(|r| r.str_field("id").map(str::to_owned))
        .collect::<Vec<_>>();
    assert_eq!(ids, vec![Some("1".to_owned()), Some("2".to_owned())]);
    assert_eq!(first.header("x-request-id"), Some("1"));
    assert_eq!(second.header("x-request-id"), Some("2"));
}

// ── Optional fields ───────────────────────────────────────────────────────────

#[tokio::test]
async fn optional_fields_present_when_sent() {
    let capture = Capture::default();
    let app = Router::new()
        .get("/me", |req: Request| async move {
            req.locals().insert("username", "alice");
            Response::text("me")
        })
        .with(
            RequestLog::builder()
                .sink(capture.clone())
                .log_host()
                .log_user_agent()
                .log_forwarded_for()
                .log_username("username")
                .tag_request_header("X-Trace")
                .build(),
        )
        .into_service();

    let req = Request::builder()
        .uri("/me")
        .header("host", "api.example.com")
        .header("user-agent", "curl/8.5")
        .header("x-forwarded-for", "203.0.113.9")
        .header("x-trace", "t-77")
        .build();
    app.handle(req).await;

    let record = capture.only();
    assert_eq!(record.str_field("host"), Some("api.example.com"));
    assert_eq!(record.str_field("user-agent"), Some("curl/8.5"));
    assert_eq!(record.str_field("forwarded_for"), Some("203.0.113.9"));
    assert_eq!(record.str_field("username"), Some("alice"));
    assert_eq!(record.str_field("X-Trace"), Some("t-77"));
}

#[tokio::test]
async fn optional_fields_omitted_when_absent() {
    let capture = Capture::default();
    let app = Router::new()
        .get("/anon", |req: Request| async move {
            req.locals().insert("username", 42_i64);
            Response::status(StatusCode::NO_CONTENT)
        })
        .with(
            RequestLog::builder()
                .sink(capture.clone())
                .log_host()
                .log_user_agent()
                .log_username("username")
                .tag_request_header("x-trace")
                .tag_response_header("content-type")
                .tag("missing")
                .build(),
        )
        .into_service();

    let req = Request::builder().uri("/anon").header("user-agent", "").build();
    app.handle(req).await;

    let record = capture.only();
    for key in ["host", "user-agent", "username", "x-trace", "content-type", "missing"] {
        assert_eq!(record.field(key), None, "{key} should be omitted");
    }
}

#[tokio::test]
async fn forwarded_for_falls_back_to_remote_ip() {
    let capture = Capture::default();
    let app = app(RequestLog::builder().log_forwarded_for(), &capture);

    let req = Request::builder()
        .uri("/ok")
        .remote_addr("192.0.2.4:40000".parse().unwrap())
        .build();
    app.handle(req).await;

    let record = capture.only();
    assert_eq!(record.str_field("forwarded_for"), Some("192.0.2.4"));
    assert_eq!(record.str_field("remote_ip"), Some("192.0.2.4"));
}

#[tokio::test]
async fn tags_keep_their_structured_type() {
    #[derive(Debug)]
    struct Basket;

    let capture = Capture::default();
    let app = Router::new()
        .get("/tags", |req: Request| async move {
            let locals = req.locals();
            locals.insert("plan", "pro");
            locals.insert("roles", vec!["admin", "ops"]);
            locals.insert("offset", -5_i64);
            locals.insert("bytes", 1024_u64);
            locals.insert("ratio", 0.25);
            locals.insert("wait", Duration::from_millis(12));
            locals.insert("cached", true);
            locals.insert("failures", Value::errors([std::io::Error::other("timeout")]));
            locals.insert("geo", Value::object([("country", "NL")]));
            locals.insert("peer", Value::display(std::net::Ipv4Addr::new(10, 0, 0, 1)));
            locals.insert("basket", Value::opaque(Basket));
            "tagged"
        })
        .with(
            RequestLog::builder()
                .sink(capture.clone())
                .tag("plan").tag("roles").tag("offset").tag("bytes").tag("ratio")
                .tag("wait").tag("cached").tag("failures").tag("geo").tag("peer")
                .tag("basket")
                .build(),
        )
        .into_service();

    app.handle(get("/tags")).await;

    let record = capture.only();
    assert_eq!(record.field("plan"), Some(&Field::Str("pro".into())));
    assert_eq!(record.field("roles"), Some(&Field::Strs(vec!["admin".into(), "ops".into()])));
    assert_eq!(record.field("offset"), Some(&Field::I64(-5)));
    assert_eq!(record.field("bytes"), Some(&Field::U64(1024)));
    assert_eq!(record.field("ratio"), Some(&Field::F64(0.25)));
    assert_eq!(record.field("wait"), Some(&Field::Duration(Duration::from_millis(12))));
    assert_eq!(record.field("cached"), Some(&Field::Bool(true)));
    assert_eq!(record.field("failures"), Some(&Field::Errors(vec!["timeout".into()])));
    assert_eq!(
        record.field("geo"),
        Some(&Field::Object(vec![("country".into(), Field::Str("NL".into()))])),
    );
    assert_eq!(record.field("peer"), Some(&Field::Str("10.0.0.1".into())));
    let basket = record.str_field("basket").unwrap();
    assert!(basket.starts_with('<') && basket.ends_with("Basket>"), "{basket}");
}

#[tokio::test]
async fn latency_covers_the_handler() {
    let capture = Capture::default();
    let app = Router::new()
        .get("/slow", |_req: Request| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            "done"
        })
        .with(RequestLog::builder().sink(capture.clone()).build())
        .into_service();

    app.handle(get("/slow")).await;

    match capture.only().field("latency") {
        Some(Field::Duration(d)) => assert!(*d >= Duration::from_millis(20), "{d:?}"),
        other => panic!("unexpected latency field {other:?}"),
    }
}

#[tokio::test]
async fn settings_drive_the_same_options_as_the_builder() {
    let settings: Settings = serde_json::from_str(r#"{
        "log_user_agent": true,
        "tag_response_headers": ["Content-Type", "content-type"]
    }"#).unwrap();

    let capture = Capture::default();
    let log = RequestLog::builder().settings(settings.clone()).sink(capture.clone()).build();
    assert_eq!(log.settings().tag_response_headers, vec!["Content-Type"]);
    assert_eq!(RequestLog::from_settings(settings).settings(), log.settings());

    let app = Router::new().get("/ok", ok).with(log).into_service();
    app.handle(Request::builder().uri("/ok").header("User-Agent", "settings-test").build()).await;

    let record = capture.only();
    assert_eq!(record.str_field("user-agent"), Some("settings-test"));
    assert_eq!(record.str_field("Content-Type"), Some("text/plain"));
}
