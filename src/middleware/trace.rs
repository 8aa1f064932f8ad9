//! Per-request tracing span.

use std::time::Instant;

use tracing::{Instrument, info, info_span};

use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};
use crate::request::Request;

/// Wraps the rest of the chain in a `request` span and logs the outcome.
///
/// Register it first so the span covers every other layer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        let span = info_span!("request", method = %req.method(), path = %req.path());
        Box::pin(
            async move {
                let started = Instant::now();
                let res = next.run(req).await;
                info!(
                    status = res.status_code().as_u16(),
                    latency_ms = started.elapsed().as_millis() as u64,
                    "finished"
                );
                res
            }
            .instrument(span),
        )
    }
}
