//! Handler trait and type erasure.
//!
//! The router holds handlers of *different* types in one table, so each
//! handler is hidden behind a trait object (`dyn ErasedHandler`):
//!
//! ```text
//! async fn page(req: Request) -> Response { … }   ← user writes this
//!        ↓ router.get("/", page)
//! page.into_boxed_handler()                      ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(page))                      ← stored as BoxedHandler
//!        ↓
//! handler.call(req)  at request time             ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future resolving to a [`Response`].
///
/// `Pin<Box<…>>` because the runtime polls the future in place and must not
/// move it after the first poll. `Send` lets tokio move it between worker
/// threads. Handlers produce `'static` futures; middleware futures may
/// borrow the middleware they came from, hence the lifetime.
pub type BoxFuture<'a, T = Response> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` because it appears in the return type of
/// [`Handler::into_boxed_handler`].
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static>;
}

/// A type-erased handler shared across concurrent requests.
///
/// `Arc` gives cheap shared ownership: one atomic increment per request,
/// no copy of the handler. `Send + Sync` because every connection task may
/// call it at the same time.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler:
///
/// ```text
/// async fn name(req: Request) -> impl IntoResponse
/// ```
///
/// You never implement this yourself. The trait is sealed through the
/// private `Sealed` supertrait, so only the blanket impl below can satisfy
/// it and the public surface stays stable.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

/// `Sealed` is unnameable outside this crate, which is what seals `Handler`.
mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static> {
        // Calling the function yields the concrete `Fut`. Mapping its output
        // through `IntoResponse` and boxing it erases the type so it fits
        // the trait signature.
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response() })
    }
}
