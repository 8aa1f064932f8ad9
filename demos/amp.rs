//! AMP rendering demo.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example amp
//!
//! Try:
//!   curl -H 'accept: text/html' http://localhost:3000/articles/hello
//!   curl -H 'accept: text/html' http://localhost:3000/amp/articles/hello
//!   curl -H 'accept: application/json' http://localhost:3000/articles/hello
//!   curl http://localhost:3000/logo.svg

use amp_ssr::middleware::{AmpSsr, Trace};
use amp_ssr::{
    BoxError, ContentType, Request, Response, Router, Server, TransformOptions, Transformer,
};

/// Marks documents as AMP and points them at their AMP variant.
struct Lightning;

impl Transformer for Lightning {
    async fn transform_html(
        &self,
        body: String,
        options: TransformOptions,
    ) -> Result<String, BoxError> {
        if !body.contains("</head>") {
            return Err("document has no </head>".into());
        }
        let link = format!(r#"<link rel="amphtml" href="{}">"#, options.amp_url);
        Ok(body
            .replacen("<html", "<html ⚡", 1)
            .replacen("</head>", &format!("{link}</head>"), 1))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_owned());

    let app = Router::new()
        .get("/articles/{slug}", article)
        .get("/amp/articles/{slug}", article)
        .get("/logo.svg", logo)
        .layer(Trace)
        .layer(AmpSsr::new(Lightning));

    Server::bind(addr).serve(app).await.expect("server error");
}

// GET /articles/{slug}
async fn article(req: Request) -> Response {
    let slug = req.param("slug").unwrap_or("unknown");
    Response::html(format!(
        "<html><head><title>{slug}</title></head><body><h1>{slug}</h1></body></html>"
    ))
}

// GET /logo.svg — a static resource, never transformed
async fn logo(_req: Request) -> Response {
    Response::builder().bytes(
        ContentType::Svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"/>"#,
    )
}
