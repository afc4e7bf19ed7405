//! # reqlog
//!
//! Structured request logging for a minimal hyper-based HTTP framework.
//!
//! Every request that passes through [`RequestLog`](middleware::request_log::RequestLog)
//! produces exactly one record: status, method, path, latency, remote
//! address and correlation id, plus whichever extras you switch on (host,
//! user agent, forwarded-for, username, chosen request/response headers,
//! typed per-request [`Locals`]). The record's level follows the final
//! status: `warn` for 4xx, `error` for 5xx, `info` otherwise.
//!
//! The framework around it is deliberately small:
//!
//! - Radix-tree routing: O(path-length) lookup via [`matchit`]
//! - A middleware chain with a configurable error handler
//! - Async I/O: tokio + hyper, HTTP/1.1 and HTTP/2
//! - Graceful shutdown: SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use reqlog::{Error, Request, Response, Router, Server, StatusCode};
//! use reqlog::middleware::request_log::{JsonSink, RequestLog};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/users/{id}", get_user)
//!         .post("/users",     create_user)
//!         .with(
//!             RequestLog::builder()
//!                 .sink(JsonSink::new(std::io::stdout()))
//!                 .log_username("username")
//!                 .tag_response_header("content-type")
//!                 .build(),
//!         );
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     req.locals().insert("username", "alice");
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Result<Response, Error> {
//!     if req.body().is_empty() {
//!         return Err(Error::with_message(StatusCode::BAD_REQUEST, "empty body"));
//!     }
//!     Ok(Response::builder()
//!         .status(StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json(r#"{"id":"99"}"#))
//! }
//! ```

mod error;
mod handler;
mod locals;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::Error;
pub use handler::{BoxFuture, Handler, IntoOutcome, Outcome};
pub use http::{Method, StatusCode};
pub use locals::{Locals, Opaque, Value};
pub use middleware::{Middleware, Next};
pub use request::{Request, RequestBuilder};
pub use response::{IntoResponse, Response, ResponseBuilder};
pub use router::{ErrorHandler, Router, Service, default_error_handler};
pub use server::Server;
