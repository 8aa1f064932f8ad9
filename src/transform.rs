//! The transformer capability.
//!
//! [`AmpSsr`](crate::middleware::AmpSsr) knows nothing about AMP markup. It
//! decides *whether* a page gets transformed and hands the HTML to whatever
//! [`Transformer`] it was built with.

use std::future::Future;
use std::sync::Arc;

use crate::error::BoxError;

/// Per-request input to a transformation, alongside the HTML itself.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct TransformOptions {
    /// The request URL with an `amp=` marker merged into its query string.
    pub amp_url: String,
}

impl TransformOptions {
    pub fn new(amp_url: impl Into<String>) -> Self {
        Self { amp_url: amp_url.into() }
    }
}

/// Turns an HTML document into another HTML document.
///
/// ```rust
/// use amp_ssr::{BoxError, TransformOptions, Transformer};
///
/// struct Lightning;
///
/// impl Transformer for Lightning {
///     async fn transform_html(
///         &self,
///         body: String,
///         _options: TransformOptions,
///     ) -> Result<String, BoxError> {
///         Ok(body.replacen("<html", "<html ⚡", 1))
///     }
/// }
/// ```
pub trait Transformer: Send + Sync + 'static {
    fn transform_html(
        &self,
        body: String,
        options: TransformOptions,
    ) -> impl Future<Output = Result<String, BoxError>> + Send;
}

impl<T: Transformer> Transformer for Arc<T> {
    fn transform_html(
        &self,
        body: String,
        options: TransformOptions,
    ) -> impl Future<Output = Result<String, BoxError>> + Send {
        (**self).transform_html(body, options)
    }
}
