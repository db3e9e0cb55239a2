//! Per-request context handed to handlers.
//!
//! [`Context`] is a trait so middleware can decorate it. The server builds
//! a [`RequestContext`]; the request logger wraps it in a [`ScopedContext`]
//! that swaps in a logger carrying the request id and forwards everything
//! else.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

use crate::error::{Error, ErrorHandler, default_error_handler};
use crate::logger::Logger;
use crate::request::Request;
use crate::response::{Response, ResponseWriter};

/// Everything a handler can see and do for one request.
pub trait Context: Send {
    fn request(&self) -> &Request;

    fn request_mut(&mut self) -> &mut Request;

    fn response(&self) -> &Response;

    fn response_mut(&mut self) -> &mut Response;

    /// The logger for this request. Fields attached by middleware (such as
    /// the request id) appear on every event logged through it.
    fn logger(&self) -> &Logger;

    /// Reports a handler error to the error handler, which writes a
    /// client-visible response unless one is already committed.
    fn error(&mut self, err: &Error);

    fn real_ip(&self) -> String {
        self.request().real_ip()
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.request().param(name)
    }

    /// Writes `body` with the given status and content type.
    fn blob(&mut self, status: StatusCode, content_type: &'static str, body: &[u8]) -> Result<(), Error> {
        let res = self.response_mut();
        res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        res.write_header(status);
        res.write(body)?;
        Ok(())
    }

    fn text(&mut self, status: StatusCode, body: &str) -> Result<(), Error> {
        self.blob(status, "text/plain; charset=utf-8", body.as_bytes())
    }

    fn json(&mut self, status: StatusCode, value: &serde_json::Value) -> Result<(), Error> {
        let body = serde_json::to_vec(value)?;
        self.blob(status, "application/json", &body)
    }

    fn no_content(&mut self, status: StatusCode) -> Result<(), Error> {
        self.response_mut().write_header(status);
        Ok(())
    }
}

// ── RequestContext ────────────────────────────────────────────────────────────

/// The server's context: owns the request, the response and the logger.
pub struct RequestContext {
    request: Request,
    response: Response,
    logger: Logger,
    error_handler: ErrorHandler,
}

impl RequestContext {
    /// A context logging to the current default dispatcher and handling
    /// errors with [`default_error_handler`].
    pub fn new(request: Request, writer: Box<dyn ResponseWriter>) -> Self {
        Self {
            request,
            response: Response::new(writer),
            logger: Logger::current(),
            error_handler: Arc::new(default_error_handler),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_error_handler(mut self, handler: ErrorHandler) -> Self {
        self.error_handler = handler;
        self
    }

    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        self.response.into_http()
    }
}

impl Context for RequestContext {
    fn request(&self) -> &Request { &self.request }
    fn request_mut(&mut self) -> &mut Request { &mut self.request }
    fn response(&self) -> &Response { &self.response }
    fn response_mut(&mut self) -> &mut Response { &mut self.response }
    fn logger(&self) -> &Logger { &self.logger }

    fn error(&mut self, err: &Error) {
        (self.error_handler)(err, &mut self.response);
    }
}

// ── ScopedContext ─────────────────────────────────────────────────────────────

/// A context that replaces only the logger of the context it wraps.
pub struct ScopedContext<'a> {
    inner: &'a mut dyn Context,
    logger: Logger,
}

impl<'a> ScopedContext<'a> {
    pub fn new(inner: &'a mut dyn Context, logger: Logger) -> Self {
        Self { inner, logger }
    }
}

impl Context for ScopedContext<'_> {
    fn request(&self) -> &Request { self.inner.request() }
    fn request_mut(&mut self) -> &mut Request { self.inner.request_mut() }
    fn response(&self) -> &Response { self.inner.response() }
    fn response_mut(&mut self) -> &mut Response { self.inner.response_mut() }
    fn logger(&self) -> &Logger { &self.logger }
    fn error(&mut self, err: &Error) { self.inner.error(err) }
    fn real_ip(&self) -> String { self.inner.real_ip() }
}
