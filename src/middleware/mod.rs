//! Middleware layer.
//!
//! A middleware turns the next handler in the chain into a new handler
//! that runs code before and after it. Register middleware with
//! [`Router::layer`](crate::Router::layer); the first one registered is the
//! outermost and sees every request first.
//!
//! Built-in middleware:
//! - [`request_logger`]: one structured event per request with status,
//!   latency, sizes and the request id, optionally with the bodies

pub mod capture;
pub mod request_logger;

use crate::handler::BoxedHandler;

pub use capture::{CaptureBuffer, CaptureWriter};
pub use request_logger::{Config, RequestLogger};

/// Wraps a handler in another handler.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}
