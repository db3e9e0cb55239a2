//! Response body capture.
//!
//! [`CaptureWriter`] sits between a [`Response`](crate::Response) and its
//! writer and copies every accepted body byte into a [`CaptureBuffer`].
//! The client sees exactly what it would have seen without the tap.

use std::sync::{Arc, Mutex, PoisonError};

use bytes::{Bytes, BytesMut};
use http::header::HeaderMap;
use http::StatusCode;
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;

use crate::error::Error;
use crate::response::ResponseWriter;

/// Shared handle to the bytes a [`CaptureWriter`] has seen.
#[derive(Clone, Debug, Default)]
pub struct CaptureBuffer(Arc<Mutex<BytesMut>>);

impl CaptureBuffer {
    fn extend(&self, buf: &[u8]) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(buf);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes everything captured so far, leaving the buffer empty.
    pub fn take(&self) -> Bytes {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).split().freeze()
    }
}

/// A [`ResponseWriter`] that mirrors body writes into a [`CaptureBuffer`].
///
/// Only `write` is intercepted. Headers, status, `flush` and `hijack` go
/// straight to the wrapped writer, so an unsupported capability stays
/// unsupported.
pub struct CaptureWriter {
    inner: Box<dyn ResponseWriter>,
    sink: CaptureBuffer,
}

impl CaptureWriter {
    pub fn new(inner: Box<dyn ResponseWriter>, sink: CaptureBuffer) -> Self {
        Self { inner, sink }
    }
}

impl ResponseWriter for CaptureWriter {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        self.inner.write_header(status);
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let n = self.inner.write(buf)?;
        // Mirror only what the client actually got.
        self.sink.extend(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()
    }

    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.inner.hijack()
    }

    fn into_response(self: Box<Self>) -> http::Response<Full<Bytes>> {
        self.inner.into_response()
    }
}
