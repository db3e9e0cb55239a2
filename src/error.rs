//! Unified error type and the default error handler.

use std::sync::Arc;

use http::header::{CONTENT_TYPE, HeaderValue};
use http::StatusCode;

use crate::response::Response;

/// The error type returned by handlers and by reqlog's fallible operations.
///
/// Handlers return `Err(Error::http(..))` to ask the error handler for a
/// client-visible status. Everything else maps to `500 Internal Server Error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("hyper: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    /// A response writer was asked for a capability it does not provide.
    #[error("{0} is not supported by this response writer")]
    Unsupported(&'static str),

    #[error("invalid route `{path}`: {source}")]
    Route {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error(transparent)]
    Handler(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// An error that renders as `status` with `message` as the client-visible text.
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http { status, message: message.into() }
    }

    /// Wraps an arbitrary application error.
    pub fn other(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(err.into())
    }

    /// The status the default error handler responds with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Turns a handler error into a client-visible response.
///
/// Called through [`Context::error`](crate::Context::error). Must leave a
/// committed response untouched.
pub type ErrorHandler = Arc<dyn Fn(&Error, &mut Response) + Send + Sync>;

/// Writes `{"message": "..."}` with the error's status.
///
/// Internal errors are not echoed to the client; they get the generic
/// reason phrase instead.
pub fn default_error_handler(err: &Error, res: &mut Response) {
    if res.committed() {
        return;
    }

    let status = err.status();
    let message = match err {
        Error::Http { message, .. } => message.clone(),
        _ => status.canonical_reason().unwrap_or_default().to_owned(),
    };
    let body = serde_json::json!({ "message": message }).to_string();

    res.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res.write_header(status);
    if let Err(e) = res.write(body.as_bytes()) {
        tracing::error!("failed to write error response: {e}");
    }
}
