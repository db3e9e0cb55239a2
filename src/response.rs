//! Outgoing response state and the [`ResponseWriter`] seam.
//!
//! Handlers never build a response value. They write through
//! [`Response`], which tracks the status, whether the head has been
//! committed, and how many body bytes went out. The bytes themselves go to
//! a boxed [`ResponseWriter`], which middleware may wrap (see
//! [`Response::wrap_writer`]).

use bytes::{Bytes, BytesMut};
use http::header::{AsHeaderName, HeaderMap};
use http::StatusCode;
use http_body_util::Full;
use hyper::upgrade::OnUpgrade;

use crate::error::Error;

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// The sink a [`Response`] writes into.
///
/// `flush` and `hijack` are optional capabilities. Writers that cannot
/// provide them keep the default implementations, which report
/// [`Error::Unsupported`]. Decorators forward both to the writer they wrap
/// so the capability set of the chain is the capability set of the
/// innermost writer.
pub trait ResponseWriter: Send {
    fn headers(&self) -> &HeaderMap;

    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::Unsupported("flush"))
    }

    /// Takes over the underlying connection once the response head is sent.
    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        Err(Error::Unsupported("hijack"))
    }

    /// Hands the finished response to the connection.
    fn into_response(self: Box<Self>) -> http::Response<Full<Bytes>>;
}

// ── BufferedWriter ────────────────────────────────────────────────────────────

/// The server's own writer: buffers the body and sends it in one frame when
/// the handler chain returns.
#[derive(Debug, Default)]
pub struct BufferedWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    upgrade: Option<OnUpgrade>,
}

impl BufferedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A writer that can hand out the connection via [`ResponseWriter::hijack`].
    pub fn with_upgrade(upgrade: OnUpgrade) -> Self {
        Self { upgrade: Some(upgrade), ..Self::default() }
    }
}

impl ResponseWriter for BufferedWriter {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    // The body leaves in one piece when the chain returns; nothing to push early.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.upgrade.take().ok_or(Error::Unsupported("hijack"))
    }

    fn into_response(self: Box<Self>) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body.freeze()));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// Response state for one request.
///
/// The status defaults to `200 OK` and is fixed by the first
/// [`write_header`](Response::write_header) (or the first
/// [`write`](Response::write), which commits implicitly).
pub struct Response {
    writer: Box<dyn ResponseWriter>,
    status: StatusCode,
    size: u64,
    committed: bool,
}

impl Response {
    pub fn new(writer: Box<dyn ResponseWriter>) -> Self {
        Self { writer, status: StatusCode::OK, size: 0, committed: false }
    }

    pub fn headers(&self) -> &HeaderMap {
        self.writer.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.writer.headers_mut()
    }

    /// Header lookup. Values that are not visible ASCII read as absent.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers().get(name).and_then(|v| v.to_str().ok())
    }

    /// Sends the status line. A second call is ignored with a warning.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(%status, "response already committed");
            return;
        }
        self.status = status;
        self.writer.write_header(status);
        self.committed = true;
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        if !self.committed {
            self.write_header(self.status);
        }
        let n = self.writer.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer.flush()
    }

    pub fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.writer.hijack()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body bytes written so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn committed(&self) -> bool {
        self.committed
    }

    /// Replaces the writer with `f(writer)`.
    ///
    /// Status, size and committed state are kept; only the byte sink changes.
    pub fn wrap_writer<F>(&mut self, f: F)
    where
        F: FnOnce(Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter>,
    {
        let inner = std::mem::replace(&mut self.writer, Box::new(BufferedWriter::new()));
        self.writer = f(inner);
    }

    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        self.writer.into_response()
    }
}
