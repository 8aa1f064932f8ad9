//! Unified error types.

use std::time::Duration;

/// Boxed error returned by a [`Transformer`](crate::Transformer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by amp-ssr's fallible operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: parsing the bind address, binding to a port or
/// accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Why a transformation did not produce a body.
///
/// Never reaches the client: [`AmpSsr`](crate::middleware::AmpSsr) logs it
/// and sends the original response instead.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("transformer rejected the document: {0}")]
    Rejected(#[source] BoxError),

    #[error("transformer did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("response body is not valid UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}
