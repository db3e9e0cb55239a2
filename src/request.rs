//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::header::{self, AsHeaderName, HeaderMap};
use http::{Method, Uri};

/// `X-Real-IP`, set by nginx's `proxy_set_header X-Real-IP $remote_addr`.
const X_REAL_IP: &str = "x-real-ip";

/// An incoming HTTP request with its body fully buffered.
///
/// The body is read off the connection before any handler runs, so reading
/// it (from a handler or from the request logger) never consumes it.
#[derive(Debug)]
pub struct Request {
    head: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self { head, body, params: HashMap::new(), remote_addr: None }
    }

    /// Records the peer address of the connection the request arrived on.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &Bytes { &self.body }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Header lookup. Values that are not visible ASCII read as absent.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The request target as sent by the client: path plus query string.
    pub fn request_uri(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// The `Host` header, or the URI authority for HTTP/2 requests.
    pub fn host(&self) -> &str {
        self.header(header::HOST)
            .or_else(|| self.head.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT).unwrap_or_default()
    }

    pub fn referer(&self) -> &str {
        self.header(header::REFERER).unwrap_or_default()
    }

    /// The raw `Content-Length` header, if the client sent one.
    pub fn content_length(&self) -> Option<&str> {
        self.header(header::CONTENT_LENGTH)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Best guess at the client address behind a reverse proxy.
    ///
    /// Checks the first `X-Forwarded-For` hop, then `X-Real-IP`, then falls
    /// back to the peer address of the connection.
    pub fn real_ip(&self) -> String {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
                return first.to_owned();
            }
        }
        if let Some(ip) = self.header(X_REAL_IP) {
            return ip.to_owned();
        }
        self.remote_addr.map(|a| a.ip().to_string()).unwrap_or_default()
    }
}
