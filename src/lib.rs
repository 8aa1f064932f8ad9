//! # amp-ssr
//!
//! Server-side AMP rendering as HTTP middleware, plus the small HTTP host it
//! runs in.
//!
//! [`middleware::AmpSsr`] sits in the request chain and, for every page a
//! browser asks for, captures the handler's HTML and hands it to a
//! [`Transformer`] of your choosing. The transformer gets the document and
//! the page's AMP URL; whatever it returns is what the client receives.
//!
//! Requests that are never transformed:
//!
//! - paths under the AMP prefix (`/amp/` by default): already AMP
//! - static resources: `.jpg`, `.svg`, `.js`, `.css` and friends
//! - clients whose `Accept` header rules out HTML
//! - non-2xx responses
//!
//! A transformer that errors or runs past the timeout does not break the
//! page: the original response is sent.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use amp_ssr::middleware::{AmpSsr, Trace};
//! use amp_ssr::{BoxError, Request, Response, Router, Server, TransformOptions, Transformer};
//!
//! struct Lightning;
//!
//! impl Transformer for Lightning {
//!     async fn transform_html(&self, body: String, opts: TransformOptions) -> Result<String, BoxError> {
//!         let link = format!(r#"<link rel="amphtml" href="{}">"#, opts.amp_url);
//!         Ok(body.replacen("</head>", &format!("{link}</head>"), 1))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .get("/", home)
//!         .layer(Trace)
//!         .layer(AmpSsr::new(Lightning));
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn home(_req: Request) -> Response {
//!     Response::html("<html><head></head><body>hi</body></html>")
//! }
//! ```

mod accept;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod transform;

pub mod middleware;

pub use error::{BoxError, Error, TransformError};
pub use handler::{BoxFuture, Handler};
pub use request::Request;
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use transform::{TransformOptions, Transformer};
