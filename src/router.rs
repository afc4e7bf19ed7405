//! Radix-tree request router and middleware chain.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware registered
//! with [`Router::with`] wraps every route, including the 404 produced when
//! nothing matches.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, Outcome};
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Turns a chain error into a response. May itself fail, in which case the
/// client receives a bare `500`.
pub type ErrorHandler = Arc<dyn Fn(&Error) -> Outcome + Send + Sync + 'static>;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve)
/// or turn it into a [`Service`] to drive requests in-process.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
    pub(crate) error_handler: ErrorHandler,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            middleware: Vec::new(),
            error_handler: Arc::new(default_error_handler),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route pattern or conflicts with an
    /// existing route.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware to the chain. Middleware runs in registration order.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Replaces the default error handler.
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Error) -> Outcome + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn into_service(self) -> Service {
        Service { router: Arc::new(self) }
    }

    /// The last link of the chain: route lookup and handler call.
    pub(crate) async fn route(&self, mut req: Request) -> Outcome {
        let Some((handler, params)) = self.lookup(&req.method, &req.path) else {
            return Err(Error::with_message(
                StatusCode::NOT_FOUND,
                format!("Cannot {} {}", req.method, req.path),
            ));
        };
        req.params = params;
        handler.call(req).await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Responds with the error's status and its message as a plain-text body.
pub fn default_error_handler(err: &Error) -> Outcome {
    Ok(Response::builder()
        .status(err.status_code())
        .text(err.to_string()))
}

// ── Service ───────────────────────────────────────────────────────────────────

/// A finished [`Router`], cheap to clone and share across connections.
#[derive(Clone)]
pub struct Service {
    router: Arc<Router>,
}

impl Service {
    /// Runs one request through the whole chain and always yields a response.
    ///
    /// An error that escapes every middleware goes to the error handler; if
    /// that fails as well the response is a bare `500`.
    pub async fn handle(&self, req: Request) -> Response {
        let next = Next::new(Arc::clone(&self.router));
        match next.run(req).await {
            Ok(res) => res,
            Err(err) => (self.router.error_handler)(&err)
                .unwrap_or_else(|_| Response::status(StatusCode::INTERNAL_SERVER_ERROR)),
        }
    }
}
