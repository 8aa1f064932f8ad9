//! AMP server-side-rendering middleware.
//!
//! Every request falls into one of three buckets:
//!
//! | Request | What happens |
//! |---|---|
//! | path under the AMP prefix (`/amp/…`) | passed through, already AMP |
//! | static resource (`.jpg`, `.js`, `.css`, …) | passed through |
//! | anything else, from a client accepting HTML | response captured and transformed |
//!
//! A client that does not accept HTML gets the untouched response. So does
//! every request whose transformation fails or times out: the middleware
//! fails open and sends what the handler produced.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::TransformError;
use crate::handler::BoxFuture;
use crate::middleware::intercept::Captured;
use crate::middleware::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;
use crate::transform::{TransformOptions, Transformer};

const DEFAULT_AMP_PREFIX: &str = "/amp/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const AMP_PARAM: &str = "amp";
const AMP_MARKER: &str = "amp=";

/// Extensions that never carry an HTML document. Matched against the last
/// path segment only, so `/scripts.js/index` is still a page.
const DEFAULT_STATIC_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "svg", "webp", "avif", "ico", "bmp",
    // scripts and styles
    "js", "mjs", "css", "map",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // media
    "mp3", "mp4", "webm", "ogg", "wav",
    // documents and data
    "json", "xml", "txt", "pdf", "zip", "wasm",
];

/// Where a request URL lands in the decision table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Under the AMP prefix; already AMP.
    AmpPage,
    /// Ends in a static-resource extension.
    StaticResource,
    /// A page that may be transformed.
    Transformable,
}

/// Middleware that runs HTML pages through a [`Transformer`].
///
/// ```rust,no_run
/// use amp_ssr::middleware::AmpSsr;
/// use amp_ssr::{BoxError, Request, Response, Router, TransformOptions, Transformer};
/// use std::time::Duration;
///
/// struct Optimizer;
///
/// impl Transformer for Optimizer {
///     async fn transform_html(&self, body: String, _: TransformOptions) -> Result<String, BoxError> {
///         Ok(body)
///     }
/// }
///
/// # async fn page(_: Request) -> Response { Response::html("") }
/// let app = Router::new()
///     .get("/{*path}", page)
///     .layer(AmpSsr::new(Optimizer).timeout(Duration::from_secs(2)));
/// ```
///
/// The middleware holds no per-request state. One instance serves every
/// concurrent request through `&self`; all that varies between requests lives
/// on the stack of [`Middleware::handle`].
pub struct AmpSsr<T> {
    transformer: T,
    amp_prefix: String,
    static_extensions: Vec<String>,
    timeout: Option<Duration>,
}

impl<T: Transformer> AmpSsr<T> {
    /// Delegates transformations to `transformer`, with the `/amp/` prefix,
    /// the built-in static extension list and a 10 second timeout.
    pub fn new(transformer: T) -> Self {
        Self {
            transformer,
            amp_prefix: DEFAULT_AMP_PREFIX.to_owned(),
            static_extensions: DEFAULT_STATIC_EXTENSIONS.iter().map(|e| (*e).to_owned()).collect(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Paths starting with `prefix` are never transformed.
    pub fn amp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.amp_prefix = prefix.into();
        self
    }

    /// Replaces the static-resource extension list. Leading dots are
    /// ignored and matching is case-insensitive.
    pub fn static_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.static_extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    /// Upper bound on one transformation. On expiry the original body is sent.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Waits for the transformer however long it takes.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Buckets a request URL (path plus optional query).
    ///
    /// Never fails: anything that does not look like an AMP path or a static
    /// resource is transformable.
    pub fn classify(&self, url: &str) -> Route {
        // Decisions are made on the path alone. `?f=a.css` must not turn a
        // page into a stylesheet.
        let path = url.split(['?', '#']).next().unwrap_or_default();

        if path.starts_with(&self.amp_prefix) {
            return Route::AmpPage;
        }

        let file = path.rsplit('/').next().unwrap_or_default();
        let is_static = file
            .rsplit_once('.')
            .is_some_and(|(_, ext)| self.static_extensions.iter().any(|s| s.eq_ignore_ascii_case(ext)));

        if is_static { Route::StaticResource } else { Route::Transformable }
    }

    async fn run(&self, req: Request, next: Next) -> Response {
        // Owned copy: the request moves into `next` but the URL is still
        // needed for `amp_url` once the response comes back.
        let url = req.url().to_owned();

        match self.classify(&url) {
            Route::Transformable => {}
            route => {
                debug!(%url, ?route, "amp-ssr: pass-through");
                return next.run(req).await;
            }
        }

        if req.accepts("html").is_none() {
            debug!(%url, "amp-ssr: client does not accept html");
            return next.run(req).await;
        }

        // Whatever the handler produced is held back here. From this point
        // on `captured` is the only way to finish the response, and each of
        // its finalizers consumes it.
        let captured = Captured::new(next.run(req).await);
        let options = TransformOptions::new(amp_url(&url));

        match self.transform(captured.body(), options).await {
            Ok(html) => captured.send(html),
            Err(e) => {
                // Fail open: the client still gets a complete page.
                warn!(
                    %url,
                    status = captured.status().as_u16(),
                    error = %e,
                    "amp-ssr: transformation failed, sending original"
                );
                captured.send_original()
            }
        }
    }

    /// Runs the transformer under the configured timeout. Every way this can
    /// go wrong comes back as a [`TransformError`] for the caller to fail
    /// open on.
    async fn transform(&self, body: &[u8], options: TransformOptions) -> Result<String, TransformError> {
        // Transformers work on text. A binary body is not HTML.
        let body = std::str::from_utf8(body)?.to_owned();
        let fut = self.transformer.transform_html(body, options);

        let result = match self.timeout {
            // Dropping the timed-out future cancels the transformation.
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| TransformError::TimedOut(limit))?,
            None => fut.await,
        };
        result.map_err(TransformError::Rejected)
    }
}

// Boxing happens here, once per request, so `run` can stay a plain async fn.
impl<T: Transformer> Middleware for AmpSsr<T> {
    fn handle<'a>(&'a self, req: Request, next: Next) -> BoxFuture<'a> {
        Box::pin(self.run(req, next))
    }
}

/// Merges an empty `amp` parameter into the query string of `url`.
///
/// Only the query is touched, and only its `amp` segments: the first one
/// becomes `amp=` in place and any repeats are dropped. When there is none,
/// `amp=` is appended. Path, fragment and every other segment are kept byte
/// for byte, so the transformer sees the URL the client asked for.
///
/// ```rust
/// use amp_ssr::middleware::amp_url;
///
/// assert_eq!(amp_url("/stuff?q=thing"), "/stuff?q=thing&amp=");
/// assert_eq!(amp_url("/page.html"), "/page.html?amp=");
/// ```
pub fn amp_url(url: &str) -> String {
    let (head, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let (path, query) = head.split_once('?').unwrap_or((head, ""));

    let mut segments: Vec<&str> = Vec::new();
    let mut seen = false;
    // `/x?` has an empty query, not one empty segment.
    for segment in query.split('&').filter(|_| !query.is_empty()) {
        let key = segment.split_once('=').map_or(segment, |(k, _)| k);
        if key != AMP_PARAM {
            segments.push(segment);
        } else if !seen {
            segments.push(AMP_MARKER);
            seen = true;
        }
    }
    if !seen {
        segments.push(AMP_MARKER);
    }

    let mut out = format!("{path}?{}", segments.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use http::StatusCode;
    use http::header::ACCEPT;

    use super::*;
    use crate::error::BoxError;
    use crate::router::Router;

    struct TestTransformer;

    impl Transformer for TestTransformer {
        async fn transform_html(&self, _body: String, options: TransformOptions) -> Result<String, BoxError> {
            Ok(format!("transformed: {}", options.amp_url))
        }
    }

    /// Records what it was called with.
    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, TransformOptions)>>);

    impl Transformer for Recorder {
        async fn transform_html(&self, body: String, options: TransformOptions) -> Result<String, BoxError> {
            self.0.lock().unwrap().push((body.clone(), options));
            Ok(body.to_uppercase())
        }
    }

    struct Failing;

    impl Transformer for Failing {
        async fn transform_html(&self, _: String, _: TransformOptions) -> Result<String, BoxError> {
            Err("optimizer crashed".into())
        }
    }

    struct Slow;

    impl Transformer for Slow {
        async fn transform_html(&self, body: String, _: TransformOptions) -> Result<String, BoxError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(body)
        }
    }

    async fn original(_req: Request) -> Response {
        Response::html("original")
    }

    fn app(layer: impl Middleware) -> Router {
        Router::new()
            .fallback(original)
            .layer(layer)
    }

    /// How the client negotiates; `None` sends no `Accept` header.
    async fn fetch(app: &Router, url: &str, accept: Option<&str>) -> String {
        let mut builder = http::Request::get(url);
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        let res = app.handle(builder.body(Bytes::new()).unwrap().into()).await;
        String::from_utf8(res.body().to_vec()).unwrap()
    }

    // ── classification ────────────────────────────────────────────────────────

    #[test]
    fn classifies_amp_prefix() {
        let amp = AmpSsr::new(TestTransformer);
        assert_eq!(amp.classify("/amp/stuff?q=thing&amp"), Route::AmpPage);
        assert_eq!(amp.classify("/amp/image.jpg"), Route::AmpPage);
        assert_eq!(amp.classify("/ampersand"), Route::Transformable);
    }

    #[test]
    fn classifies_static_resources() {
        let amp = AmpSsr::new(TestTransformer);
        for url in ["/image.jpg", "/image.svg", "/script.js", "/style.css", "/IMG.JPG", "/a/b.css?v=3"] {
            assert_eq!(amp.classify(url), Route::StaticResource, "{url}");
        }
    }

    #[test]
    fn classifies_pages() {
        let amp = AmpSsr::new(TestTransformer);
        for url in ["/", "/page.html", "/stuff?q=thing", "/dir.js/page", "/search?f=a.css", "%%"] {
            assert_eq!(amp.classify(url), Route::Transformable, "{url}");
        }
    }

    #[test]
    fn custom_prefix_and_extensions() {
        let amp = AmpSsr::new(TestTransformer)
            .amp_prefix("/lite/")
            .static_extensions([".PHP"]);
        assert_eq!(amp.classify("/lite/x"), Route::AmpPage);
        assert_eq!(amp.classify("/amp/x"), Route::Transformable);
        assert_eq!(amp.classify("/index.php"), Route::StaticResource);
        assert_eq!(amp.classify("/image.jpg"), Route::Transformable);
    }

    // ── amp_url ───────────────────────────────────────────────────────────────

    #[test]
    fn amp_url_appends_marker() {
        assert_eq!(amp_url("/stuff?q=thing"), "/stuff?q=thing&amp=");
        assert_eq!(amp_url("/page.html"), "/page.html?amp=");
        assert_eq!(amp_url("/"), "/?amp=");
    }

    #[test]
    fn amp_url_merges_existing_marker() {
        assert_eq!(amp_url("/stuff?amp&q=thing"), "/stuff?amp=&q=thing");
        assert_eq!(amp_url("/stuff?amp=1&q=2&amp=3"), "/stuff?amp=&q=2");
    }

    #[test]
    fn amp_url_keeps_fragment() {
        assert_eq!(amp_url("/page?q=1#top"), "/page?q=1&amp=#top");
    }

    #[test]
    fn amp_url_keeps_everything_else_verbatim() {
        assert_eq!(amp_url("/x?q=%FF"), "/x?q=%FF&amp=");
        assert_eq!(amp_url("/x?next=/a/b"), "/x?next=/a/b&amp=");
        assert_eq!(amp_url("/a/../b?x=1"), "/a/../b?x=1&amp=");
        assert_eq!(amp_url("//evil.example/x?y=1"), "//evil.example/x?y=1&amp=");
        assert_eq!(amp_url("/x?a=1+2&b"), "/x?a=1+2&b&amp=");
    }

    #[test]
    fn amp_url_with_empty_query() {
        assert_eq!(amp_url("/x?"), "/x?amp=");
        assert_eq!(amp_url("/x?#top"), "/x?amp=#top");
    }

    #[test]
    fn amp_url_only_matches_the_whole_key() {
        assert_eq!(amp_url("/x?ampere=1&amp_id=2"), "/x?ampere=1&amp_id=2&amp=");
    }

    // ── end to end ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn transforms_urls() {
        let app = app(AmpSsr::new(TestTransformer));
        assert_eq!(
            fetch(&app, "/stuff?q=thing", Some("text/html")).await,
            "transformed: /stuff?q=thing&amp=",
        );
    }

    #[tokio::test]
    async fn skips_amp_prefix() {
        let app = app(AmpSsr::new(TestTransformer));
        assert_eq!(fetch(&app, "/amp/stuff?q=thing&amp", Some("text/html")).await, "original");
        assert_eq!(fetch(&app, "/amp/stuff?q=thing&amp", None).await, "original");
    }

    #[tokio::test]
    async fn skips_static_resources() {
        let app = app(AmpSsr::new(TestTransformer));
        for url in ["/image.jpg", "/image.svg", "/script.js", "/style.css"] {
            assert_eq!(fetch(&app, url, Some("text/html")).await, "original", "{url}");
        }
    }

    #[tokio::test]
    async fn transforms_without_accept_header() {
        let app = app(AmpSsr::new(TestTransformer));
        assert_eq!(fetch(&app, "/page.html", None).await, "transformed: /page.html?amp=");
    }

    #[tokio::test]
    async fn skips_clients_not_accepting_html() {
        let app = app(AmpSsr::new(TestTransformer));
        assert_eq!(fetch(&app, "/page.html", Some("application/json")).await, "original");
        assert_eq!(fetch(&app, "/page.html", Some("")).await, "original");
    }

    #[tokio::test]
    async fn transformer_receives_buffered_body() {
        let recorder = Arc::new(Recorder::default());
        let app = app(AmpSsr::new(Arc::clone(&recorder)));

        assert_eq!(fetch(&app, "/a?b=c", None).await, "ORIGINAL");

        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "original");
        assert_eq!(calls[0].1, TransformOptions::new("/a?b=c&amp="));
    }

    #[tokio::test]
    async fn fails_open_on_error() {
        let app = app(AmpSsr::new(Failing));
        assert_eq!(fetch(&app, "/page.html", None).await, "original");
    }

    #[tokio::test]
    async fn fails_open_on_timeout() {
        let app = app(AmpSsr::new(Slow).timeout(Duration::from_millis(20)));
        assert_eq!(fetch(&app, "/page.html", None).await, "original");
    }

    #[tokio::test]
    async fn fails_open_on_binary_body() {
        let app = Router::new()
            .fallback(|_req: Request| async {
                Response::builder().bytes(crate::ContentType::OctetStream, vec![0xff, 0xfe])
            })
            .layer(AmpSsr::new(TestTransformer));
        let res = app.handle(http::Request::get("/blob").body(Bytes::new()).unwrap().into()).await;
        assert_eq!(&res.body()[..], b"\xff\xfe");
    }

    #[tokio::test]
    async fn transforms_error_pages_too() {
        let app = Router::new()
            .fallback(|_req: Request| async {
                Response::builder().status(StatusCode::NOT_FOUND).html("original")
            })
            .layer(AmpSsr::new(TestTransformer));
        let res = app.handle(http::Request::get("/page.html").body(Bytes::new()).unwrap().into()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(&res.body()[..], b"transformed: /page.html?amp=");
    }

    #[tokio::test]
    async fn transformer_sees_raw_url() {
        let recorder = Arc::new(Recorder::default());
        let app = app(AmpSsr::new(Arc::clone(&recorder)));

        fetch(&app, "/x?next=/a/b&q=%FF", None).await;

        let calls = recorder.0.lock().unwrap();
        assert_eq!(calls[0].1, TransformOptions::new("/x?next=/a/b&q=%FF&amp="));
    }
}
