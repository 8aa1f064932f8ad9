//! `Accept` header negotiation.
//!
//! A small subset of what Express' `req.accepts(type)` does: enough to ask
//! "would this client take HTML?". Media ranges are matched by specificity
//! (`text/html` beats `text/*` beats `*/*`) and the winning range's `q`
//! decides. `q=0` is an explicit refusal.

use mime::Mime;

/// Resolves a short extension (`"html"`) to its media type. Anything with a
/// `/` in it is parsed as a media type.
fn media_type(ty: &str) -> Option<Mime> {
    if ty.contains('/') {
        return ty.parse().ok();
    }
    let mime = match ty.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "html" | "htm" => mime::TEXT_HTML,
        "text" | "txt" => mime::TEXT_PLAIN,
        "json"         => mime::APPLICATION_JSON,
        "xml"          => mime::TEXT_XML,
        "css"          => mime::TEXT_CSS,
        "js"           => mime::TEXT_JAVASCRIPT,
        _              => return None,
    };
    Some(mime)
}

/// Weight of a media range. A missing or unreadable `q` counts as 1.
fn quality(range: &Mime) -> f32 {
    range
        .get_param("q")
        .and_then(|q| q.as_str().parse::<f32>().ok())
        .unwrap_or(1.0)
        .clamp(0.0, 1.0)
}

/// 2 for an exact match, 1 for `type/*`, 0 for `*/*`, `None` otherwise.
///
/// `mime` lowercases type and subtype on parse, so plain equality is
/// case-insensitive here.
fn specificity(range: &Mime, wanted: &Mime) -> Option<u8> {
    if range.type_() == mime::STAR && range.subtype() == mime::STAR {
        return Some(0);
    }
    if range.type_() != wanted.type_() {
        return None;
    }
    if range.subtype() == mime::STAR {
        return Some(1);
    }
    (range.subtype() == wanted.subtype()).then_some(2)
}

/// Returns whether a client sending `header` as its `Accept` value would take
/// a response of type `ty`.
///
/// A missing header accepts anything. An unknown short type is never
/// acceptable against a present header.
pub fn accepts(header: Option<&str>, ty: &str) -> bool {
    let Some(header) = header else {
        return true;
    };
    let Some(wanted) = media_type(ty) else {
        return false;
    };

    header
        .split(',')
        // Ranges `mime` cannot parse are skipped, like any unknown entry.
        .filter_map(|raw| raw.trim().parse::<Mime>().ok())
        .filter_map(|range| specificity(&range, &wanted).map(|s| (s, quality(&range))))
        // Most specific range wins; among equals the highest q.
        .max_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)))
        .is_some_and(|(_, q)| q > 0.0)
}
