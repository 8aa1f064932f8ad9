//! Radix-tree request router.
//!
//! One tree per HTTP method, O(path-length) lookup. Unmatched requests go to
//! the fallback handler (404 unless replaced). Every request, matched or
//! not, runs through the middleware layers.

use std::collections::HashMap;
use std::sync::Arc;

use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each builder call returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    fallback: BoxedHandler,
    layers: Arc<[BoxedMiddleware]>,
}

async fn not_found(_req: Request) -> Response {
    Response::status(StatusCode::NOT_FOUND)
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: not_found.into_boxed_handler(),
            layers: Arc::from(Vec::<BoxedMiddleware>::new()),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax, catch-alls `{*name}`:
    ///
    /// ```rust,no_run
    /// # use amp_ssr::{Request, Response, Router};
    /// # use http::Method;
    /// # async fn page(_: Request) -> Response { Response::html("") }
    /// # async fn create(_: Request) -> Response { Response::html("") }
    /// Router::new()
    ///     .on(Method::GET,  "/articles/{slug}", page)
    ///     .on(Method::POST, "/articles",        create);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics on a path `matchit` rejects or that conflicts with an earlier
    /// route. Routes are registered at startup, where a bad table is a bug.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    /// Handler for requests no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = handler.into_boxed_handler();
        self
    }

    /// Appends a middleware. The first layer added is the outermost: it sees
    /// the request first and the response last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut layers = self.layers.to_vec();
        layers.push(Arc::new(middleware));
        self.layers = layers.into();
        self
    }

    /// Runs one request through the layers and the matching handler.
    pub async fn handle(&self, mut req: Request) -> Response {
        let endpoint = match self.lookup(req.method(), req.path()) {
            Some((handler, params)) => {
                req.set_params(params);
                handler
            }
            None => Arc::clone(&self.fallback),
        };

        Next::new(Arc::clone(&self.layers), endpoint).run(req).await
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::middleware;

    fn request(method: Method, uri: &str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
            .into()
    }

    async fn article(req: Request) -> Response {
        Response::html(format!("article {}", req.param("slug").unwrap_or("?")))
    }

    #[tokio::test]
    async fn routes_by_method_and_path() {
        let app = Router::new().get("/articles/{slug}", article);

        let res = app.handle(request(Method::GET, "/articles/rust")).await;
        assert_eq!(&res.body()[..], b"article rust");

        let res = app.handle(request(Method::POST, "/articles/rust")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_fallback() {
        let app = Router::new().fallback(|_req: Request| async { "fallback" });
        let res = app.handle(request(Method::GET, "/anything")).await;
        assert_eq!(&res.body()[..], b"fallback");
    }

    #[tokio::test]
    async fn layers_run_outermost_first() {
        static ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

        async fn outer(req: Request, next: Next) -> Response {
            ORDER.lock().unwrap().push("outer in");
            let res = next.run(req).await;
            ORDER.lock().unwrap().push("outer out");
            res
        }

        async fn inner(req: Request, next: Next) -> Response {
            ORDER.lock().unwrap().push("inner in");
            let res = next.run(req).await;
            ORDER.lock().unwrap().push("inner out");
            res
        }

        let app = Router::new()
            .get("/articles/{slug}", article)
            .layer(middleware::from_fn(outer))
            .layer(middleware::from_fn(inner));

        app.handle(request(Method::GET, "/articles/x")).await;
        assert_eq!(
            *ORDER.lock().unwrap(),
            ["outer in", "inner in", "inner out", "outer out"],
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        async fn deny(_req: Request, _next: Next) -> Response {
            Response::status(StatusCode::FORBIDDEN)
        }

        let app = Router::new()
            .get("/articles/{slug}", article)
            .layer(middleware::from_fn(deny));
        let res = app.handle(request(Method::GET, "/articles/x")).await;
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }
}
