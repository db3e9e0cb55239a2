//! Structured request logging.
//!
//! [`RequestLogger`] emits one INFO event per request, after the rest of
//! the chain has run:
//!
//! | Field | Meaning |
//! |---|---|
//! | `remote_ip` | [`Context::real_ip`] |
//! | `host`, `method`, `uri` | from the request line and `Host` header |
//! | `user_agent`, `referer` | request headers, empty when absent |
//! | `status` | response status, after error handling |
//! | `err` | handler error, only when the handler failed |
//! | `latency`, `latency_human` | milliseconds as a float, and e.g. `"50.2ms"` |
//! | `bytes_in` | raw `Content-Length`, `"0"` when absent |
//! | `bytes_out` | body bytes written |
//! | `request`, `response` | bodies as compact JSON, when dumping is on and they parse |
//!
//! `tracing` fields are flat, so `request` and `response` arrive as JSON
//! *text* (`"response":"{\"ok\":true}"` in the stdout emitter). Consumers
//! that want the structure parse the string again.
//!
//! The request id (`x-request-id`, inbound first, then outbound) is not an
//! event field. It lives on the logger's span, and the handler runs inside
//! that span, so the handler's own events carry it too.
//!
//! ```rust,no_run
//! use reqlog::middleware::{Config, RequestLogger};
//! use reqlog::{Context, Router};
//!
//! let app = Router::new().layer(RequestLogger::new(
//!     Config::new()
//!         .skipper(|ctx: &dyn Context| ctx.request().uri().path() == "/healthz")
//!         .dump_response(true),
//! ));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::HeaderName;
use serde_json::Value;

use crate::context::{Context, ScopedContext};
use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::logger::Logger;
use crate::middleware::Middleware;
use crate::middleware::capture::{CaptureBuffer, CaptureWriter};

/// The correlation header read from the request, then from the response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Decides whether a request bypasses logging entirely.
pub type Skipper = Arc<dyn Fn(&dyn Context) -> bool + Send + Sync>;

// ── Config ────────────────────────────────────────────────────────────────────

/// Request logger options. Everything is optional.
#[derive(Clone, Default)]
pub struct Config {
    skipper: Option<Skipper>,
    logger: Option<Logger>,
    dump_request: bool,
    dump_response: bool,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests for which `f` returns `true` are passed through untouched.
    pub fn skipper(mut self, f: impl Fn(&dyn Context) -> bool + Send + Sync + 'static) -> Self {
        self.skipper = Some(Arc::new(f));
        self
    }

    /// Where events go. Defaults to [`Logger::stdout`].
    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Attach the request body as `request` when it parses as JSON.
    pub fn dump_request(mut self, enabled: bool) -> Self {
        self.dump_request = enabled;
        self
    }

    /// Attach the response body as `response` when it parses as JSON.
    pub fn dump_response(mut self, enabled: bool) -> Self {
        self.dump_response = enabled;
        self
    }
}

/// [`Config`] with every default filled in.
struct Resolved {
    skipper: Skipper,
    logger: Logger,
    dump_request: bool,
    dump_response: bool,
}

impl From<Config> for Resolved {
    fn from(config: Config) -> Self {
        let skipper: Skipper = match config.skipper {
            Some(skipper) => skipper,
            None => Arc::new(never_skip),
        };
        Self {
            skipper,
            logger: config.logger.unwrap_or_else(Logger::stdout),
            dump_request: config.dump_request,
            dump_response: config.dump_response,
        }
    }
}

fn never_skip(_: &dyn Context) -> bool {
    false
}

// ── RequestLogger ─────────────────────────────────────────────────────────────

/// The request logging middleware.
#[derive(Clone)]
pub struct RequestLogger {
    config: Arc<Resolved>,
}

impl RequestLogger {
    /// Resolves `config` once; every wrapped handler shares the result.
    pub fn new(config: Config) -> Self {
        Self { config: Arc::new(config.into()) }
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Middleware for RequestLogger {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        Arc::new(Logged { next, config: Arc::clone(&self.config) })
    }
}

/// A handler wrapped by [`RequestLogger`].
struct Logged {
    next: BoxedHandler,
    config: Arc<Resolved>,
}

impl Handler for Logged {
    fn call<'a>(&'a self, ctx: &'a mut dyn Context) -> BoxFuture<'a, Result<(), Error>> {
        Box::pin(async move {
            let config = &*self.config;
            if (config.skipper)(&*ctx) {
                return self.next.call(ctx).await;
            }

            let start = Instant::now();

            let logger = match request_id(&*ctx) {
                Some(id) => config.logger.with_id(&id),
                None => config.logger.clone(),
            };

            // Installed before the handler runs so every body byte is seen.
            let captured = config.dump_response.then(|| {
                let sink = CaptureBuffer::default();
                let tap = sink.clone();
                ctx.response_mut()
                    .wrap_writer(move |w| Box::new(CaptureWriter::new(w, tap)));
                sink
            });

            let result = {
                let mut scoped = ScopedContext::new(&mut *ctx, logger.clone());
                let result = logger.instrument(self.next.call(&mut scoped)).await;
                if let Err(err) = &result {
                    scoped.error(err);
                }
                result
            };

            let latency = start.elapsed();

            let mut record = AccessRecord::collect(&*ctx, result.as_ref().err(), latency);
            if config.dump_request {
                record.request = parse_body(ctx.request().body());
            }
            if let Some(sink) = captured {
                record.response = parse_body(&sink.take());
            }
            record.emit(&logger);

            result
        })
    }
}

/// The request id, from the request headers or, failing that, from headers
/// an earlier middleware already set on the response.
fn request_id(ctx: &dyn Context) -> Option<String> {
    ctx.request()
        .header(&X_REQUEST_ID)
        .filter(|id| !id.is_empty())
        .or_else(|| ctx.response().header(&X_REQUEST_ID).filter(|id| !id.is_empty()))
        .map(str::to_owned)
}

/// Best effort: anything that is not JSON is simply not logged.
fn parse_body(body: &[u8]) -> Option<Value> {
    serde_json::from_slice(body).ok()
}

// ── AccessRecord ──────────────────────────────────────────────────────────────

/// The fields of one request event.
#[derive(Debug)]
struct AccessRecord {
    remote_ip: String,
    host: String,
    method: String,
    uri: String,
    user_agent: String,
    status: u16,
    referer: String,
    err: Option<String>,
    latency: Duration,
    bytes_in: String,
    bytes_out: String,
    request: Option<Value>,
    response: Option<Value>,
}

impl AccessRecord {
    fn collect(ctx: &dyn Context, err: Option<&Error>, latency: Duration) -> Self {
        let req = ctx.request();
        let res = ctx.response();
        Self {
            remote_ip: ctx.real_ip(),
            host: req.host().to_owned(),
            method: req.method().to_string(),
            uri: req.request_uri().to_owned(),
            user_agent: req.user_agent().to_owned(),
            status: res.status().as_u16(),
            referer: req.referer().to_owned(),
            err: err.map(ToString::to_string),
            latency,
            bytes_in: req.content_length().unwrap_or("0").to_owned(),
            bytes_out: res.size().to_string(),
            request: None,
            response: None,
        }
    }

    fn emit(&self, logger: &Logger) {
        logger.in_scope(|| {
            tracing::info!(
                remote_ip = %self.remote_ip,
                host = %self.host,
                method = %self.method,
                uri = %self.uri,
                user_agent = %self.user_agent,
                status = self.status,
                referer = %self.referer,
                err = self.err.as_ref().map(display),
                latency = self.latency.as_secs_f64() * 1e3,
                latency_human = ?self.latency,
                bytes_in = %self.bytes_in,
                bytes_out = %self.bytes_out,
                request = self.request.as_ref().map(display),
                response = self.response.as_ref().map(display),
                "request"
            );
        });
    }
}
