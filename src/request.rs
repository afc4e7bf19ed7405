//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;
use http::{Method, Version};
use http_body_util::BodyExt;

use crate::locals::Locals;

/// An incoming HTTP request.
///
/// The body is buffered before the request reaches the chain. Header lookups
/// ignore ASCII case throughout the crate.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) version: Version,
    pub(crate) host: String,
    pub(crate) remote_addr: SocketAddr,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) locals: Locals,
}

impl Request {
    /// Buffers a hyper request. Headers whose value is not visible ASCII are
    /// dropped.
    pub(crate) async fn from_hyper<B>(
        req: hyper::Request<B>,
        remote_addr: SocketAddr,
    ) -> Result<Self, B::Error>
    where
        B: hyper::body::Body,
    {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();

        let headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect::<Vec<_>>();
        let host = host_of(&headers, &parts.uri);

        Ok(Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            version: parts.version,
            host,
            remote_addr,
            headers,
            body,
            params: HashMap::new(),
            locals: Locals::new(),
        })
    }

    /// Builder for requests constructed in-process (tests, demos).
    pub fn builder() -> RequestBuilder {
        RequestBuilder {
            method: Method::GET,
            uri: "/".to_owned(),
            version: Version::HTTP_11,
            remote_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn remote_addr(&self) -> SocketAddr { self.remote_addr }
    pub fn ip(&self) -> IpAddr { self.remote_addr.ip() }

    /// Value of the `Host` header, or the URI authority for absolute-form
    /// and HTTP/2 requests. Empty when neither is present.
    pub fn host(&self) -> &str { &self.host }

    /// Protocol version as it appears on the wire, e.g. `HTTP/1.1`.
    pub fn protocol(&self) -> &'static str {
        match self.version {
            Version::HTTP_09 => "HTTP/0.9",
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_11 => "HTTP/1.1",
            Version::HTTP_2  => "HTTP/2.0",
            Version::HTTP_3  => "HTTP/3.0",
            _                => "HTTP",
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The per-request key/value store shared with every middleware.
    pub fn locals(&self) -> &Locals { &self.locals }
}

fn host_of(headers: &[(String, String)], uri: &http::Uri) -> String {
    headers.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("host"))
        .map(|(_, v)| v.clone())
        .or_else(|| uri.authority().map(|a| a.as_str().to_owned()))
        .unwrap_or_default()
}

// ── RequestBuilder ────────────────────────────────────────────────────────────

/// Fluent builder for [`Request`]. Defaults to `GET /` over HTTP/1.1 from
/// `127.0.0.1:0`.
pub struct RequestBuilder {
    method: Method,
    uri: String,
    version: Version,
    remote_addr: SocketAddr,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl RequestBuilder {
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Request target. The query string, if any, is not part of [`Request::path`].
    pub fn uri(mut self, uri: &str) -> Self {
        uri.clone_into(&mut self.uri);
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = addr;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        let uri = self.uri.parse::<http::Uri>().unwrap_or_default();
        let host = host_of(&self.headers, &uri);
        Request {
            method: self.method,
            path: uri.path().to_owned(),
            version: self.version,
            host,
            remote_addr: self.remote_addr,
            headers: self.headers,
            body: self.body,
            params: HashMap::new(),
            locals: Locals::new(),
        }
    }
}
