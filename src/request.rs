//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::ACCEPT;
use http::{HeaderMap, Method, Uri};
use http_body_util::BodyExt;

use crate::accept;

/// An incoming HTTP request with its body fully collected.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    /// Collects a hyper request into a [`Request`].
    pub(crate) async fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
    ) -> Result<Self, hyper::Error> {
        let (parts, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(http::Request::from_parts(parts, body).into())
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Path plus query string, as the client sent it (`/stuff?q=thing`).
    pub fn url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Header lookup. Returns `None` for absent or non-visible-ASCII values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Content negotiation against the `Accept` header.
    ///
    /// Returns `ty` back when the client accepts it, `None` otherwise. A
    /// request without an `Accept` header accepts anything.
    ///
    /// ```rust
    /// # use amp_ssr::Request;
    /// let req: Request = http::Request::get("/")
    ///     .header("accept", "application/json")
    ///     .body(bytes::Bytes::new())
    ///     .unwrap()
    ///     .into();
    /// assert_eq!(req.accepts("json"), Some("json"));
    /// assert_eq!(req.accepts("html"), None);
    /// ```
    pub fn accepts<'a>(&self, ty: &'a str) -> Option<&'a str> {
        let header = match self.headers.get(ACCEPT) {
            None => None,
            // An unreadable header is treated like one that names nothing.
            Some(v) => Some(v.to_str().unwrap_or("")),
        };
        accept::accepts(header, ty).then_some(ty)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str, accept: Option<&str>) -> Request {
        let mut builder = http::Request::get(uri);
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        builder.body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn url_keeps_query() {
        let req = get("/stuff?q=thing", None);
        assert_eq!(req.url(), "/stuff?q=thing");
        assert_eq!(req.path(), "/stuff");
        assert_eq!(req.query(), Some("q=thing"));
    }

    #[test]
    fn url_of_absolute_form_is_origin_form() {
        let req = get("http://example.com/page.html", None);
        assert_eq!(req.url(), "/page.html");
    }

    #[test]
    fn accepts_without_header() {
        assert_eq!(get("/", None).accepts("html"), Some("html"));
    }

    #[test]
    fn accepts_with_header() {
        assert_eq!(get("/", Some("text/html")).accepts("html"), Some("html"));
        assert_eq!(get("/", Some("image/png")).accepts("html"), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = get("/", Some("text/html"));
        assert_eq!(req.header("Accept"), Some("text/html"));
        assert_eq!(req.header("x-missing"), None);
    }
}
