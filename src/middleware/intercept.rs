//! Single-use response capture.
//!
//! A middleware that wants to rewrite a body takes the downstream response
//! apart with [`Captured::new`], reads the buffered body, and then finalizes
//! exactly once with [`Captured::send`] or [`Captured::send_original`]. Both
//! consume the capture, so a second write does not type-check.
//!
//! ```text
//! handler ─► Response ─► Captured::new ─┬─► send(new body)   ─► Response
//!                                       └─► send_original()  ─► Response
//! ```
//!
//! Nothing is written to the connection while a `Captured` exists. The
//! server only sees the `Response` a finalizer returns, so an abandoned
//! transformation can never leave half a body on the wire.

use bytes::Bytes;
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, StatusCode};

use crate::response::Response;

/// A downstream response held back from the client.
///
/// Not `Clone`: one capture, one response.
#[derive(Debug)]
pub struct Captured {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Captured {
    /// Takes ownership of `res`. The body is already fully buffered, so
    /// this only moves fields.
    pub fn new(res: Response) -> Self {
        Self { status: res.status, headers: res.headers, body: res.body }
    }

    /// The buffered original body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Status the downstream handler chose. Kept on both finalizers.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Finalizes with a replacement body. Status and headers are kept; a
    /// `content-length` set downstream no longer applies and is dropped.
    pub fn send(mut self, body: impl Into<Bytes>) -> Response {
        self.headers.remove(CONTENT_LENGTH);
        Response { status: self.status, headers: self.headers, body: body.into() }
    }

    /// Finalizes with the body exactly as it was captured.
    pub fn send_original(self) -> Response {
        Response { status: self.status, headers: self.headers, body: self.body }
    }
}
