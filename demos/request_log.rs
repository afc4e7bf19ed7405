//! Request logging demo: JSON records on stdout, server lifecycle on stderr.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example request_log
//!
//! `RUST_LOG` filters the server's lifecycle logs (default `info`). Request
//! records go to their own sink and are not affected by it.
//!
//! Try:
//!   curl http://localhost:3000/ok
//!   curl http://localhost:3000/warn
//!   curl http://localhost:3000/err
//!   curl http://localhost:3000/private         (not logged)
//!   curl -H 'x-request-id: abc' http://localhost:3000/users/42
//!
//! Set REQLOG_CONSOLE=1 for human-readable records on stderr instead, or
//! REQLOG_TRACING=1 to send them through the subscriber installed below, where
//! `RUST_LOG=info,reqlog::request=warn` keeps only failing requests.

use reqlog::middleware::request_log::{ConsoleSink, JsonSink, RequestLog, TracingSink};
use reqlog::{Error, Request, Response, Router, Server, StatusCode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let log = RequestLog::builder()
        .skip(|req| req.path() == "/private")
        .log_host()
        .log_username("username")
        .tag_response_header("content-type")
        .tag("plan");
    let log = if std::env::var_os("REQLOG_CONSOLE").is_some() {
        log.sink(ConsoleSink::new())
    } else if std::env::var_os("REQLOG_TRACING").is_some() {
        log.sink(TracingSink::new())
    } else {
        log.sink(JsonSink::new(std::io::stdout()))
    };

    let app = Router::new()
        .get("/ok",         ok)
        .get("/warn",       warn)
        .get("/err",        err)
        .get("/private",    ok)
        .get("/users/{id}", get_user)
        .with(log.build());

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

async fn ok(_req: Request) -> &'static str {
    "ok"
}

async fn warn(_req: Request) -> Result<Response, Error> {
    Err(Error::status(StatusCode::UNPROCESSABLE_ENTITY))
}

async fn err(_req: Request) -> Result<Response, Error> {
    Err(Error::status(StatusCode::INTERNAL_SERVER_ERROR))
}

// Locals set here show up as `username` and `plan` in the record.
async fn get_user(req: Request) -> Response {
    let id = req.param("id").unwrap_or("unknown").to_owned();
    req.locals().insert("username", format!("user-{id}"));
    req.locals().insert("plan", "free");
    Response::json(format!(r#"{{"id":"{id}"}}"#))
}
