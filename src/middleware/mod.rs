//! Middleware layer.
//!
//! Middleware wraps the routed handler and sees every request on its way in
//! and every response on its way out. A middleware receives the request and
//! a [`Next`] continuation; it either answers on its own or calls
//! [`Next::run`] and does something with what comes back.
//!
//! ```rust,no_run
//! use amp_ssr::middleware::{self, Next, Trace};
//! use amp_ssr::{Request, Response, Router};
//!
//! async fn powered_by(req: Request, next: Next) -> Response {
//!     let mut res = next.run(req).await;
//!     res.headers_mut().insert("x-powered-by", "amp-ssr".parse().unwrap());
//!     res
//! }
//!
//! # async fn home(_: Request) -> Response { Response::html("") }
//! let app = Router::new()
//!     .get("/", home)
//!     .layer(Trace)
//!     .layer(middleware::from_fn(powered_by));
//! ```
//!
//! Built-in middleware:
//! - [`AmpSsr`] runs HTML responses through an AMP [`Transformer`](crate::Transformer)
//! - [`Trace`] opens a per-request span with method, path, status, latency

mod amp_ssr;
mod intercept;
mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::Response;

pub use amp_ssr::{AmpSsr, Route, amp_url};
pub use intercept::Captured;
pub use trace::Trace;

/// A layer in the request chain.
///
/// The future may borrow `self`; the chain keeps every middleware alive for
/// as long as a request is in flight.
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a>;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The rest of the chain after the current middleware.
///
/// Consumed by [`run`](Next::run), so a middleware can hand the request on
/// at most once.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    cursor: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, cursor: 0, endpoint }
    }

    /// Runs the remaining middleware, then the routed handler.
    pub async fn run(mut self, req: Request) -> Response {
        match self.chain.get(self.cursor).cloned() {
            Some(layer) => {
                self.cursor += 1;
                layer.handle(req, self).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

// ── from_fn ───────────────────────────────────────────────────────────────────

/// Middleware built from an `async fn(Request, Next) -> Response`.
pub struct FromFn<F>(F);

/// Turns an async function into a [`Middleware`].
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    FromFn(f)
}

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin((self.0)(req, next))
    }
}
