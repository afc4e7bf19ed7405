//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: access logging, request-id injection, and
//! authentication-header inspection.
//!
//! A middleware receives the request together with a [`Next`] handle for the
//! rest of the chain. It may answer on its own, or call [`Next::run`] and
//! inspect or amend the [`Outcome`] that comes back. Middleware runs in the
//! order it was registered with [`Router::with`](crate::Router::with); the
//! route lookup itself is the last link, so an unmatched path comes back as a
//! `404` error like any other handler failure.
//!
//! Any `Fn(Request, Next) -> impl Future<Output = Outcome>` is a middleware:
//!
//! ```rust
//! use reqlog::{Next, Outcome, Request, Router};
//!
//! async fn server_header(req: Request, next: Next) -> Outcome {
//!     let mut res = next.run(req).await?;
//!     res.set_header("server", "reqlog");
//!     Ok(res)
//! }
//!
//! let app = Router::new().with(server_header);
//! ```
//!
//! Built-in middleware:
//! - [`request_log`]: one structured record per request with status,
//!   latency and configurable extras

use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::router::Router;

pub mod request_log;

/// A link in the request chain.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, next: Next) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture {
        Box::pin((self)(req, next))
    }
}

/// The remainder of the chain after the current middleware.
pub struct Next {
    router: Arc<Router>,
    index: usize,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router, index: 0 }
    }

    /// Runs the remaining middleware and, at the end, the matched route.
    pub async fn run(&self, req: Request) -> Outcome {
        match self.router.middleware.get(self.index).map(Arc::clone) {
            Some(middleware) => {
                let rest = Self { router: Arc::clone(&self.router), index: self.index + 1 };
                middleware.call(req, rest).await
            }
            None => self.router.route(req).await,
        }
    }

    /// Translates `err` into a response with the router's error handler.
    ///
    /// Lets a middleware that swallows a chain error still produce the
    /// response the client would otherwise have received.
    pub fn handle_error(&self, err: &Error) -> Outcome {
        (self.router.error_handler)(err)
    }
}
