pub mod public;
pub mod webhooks;

use axum::{body::Body, http::Request};
use tower_http::trace::{HttpMakeClassifier, TraceLayer};
use tracing::Span;

use crate::id::{is_valid_token, token_prefix};

pub type RequestTraceLayer = TraceLayer<HttpMakeClassifier, fn(&Request<Body>) -> Span>;

/// HTTP trace layer whose spans carry a redacted path and no query string.
/// Page tokens travel in paths and the webhook secret in the query.
pub fn trace_layer() -> RequestTraceLayer {
    TraceLayer::new_for_http().make_span_with(request_span as fn(&Request<Body>) -> Span)
}

fn request_span(request: &Request<Body>) -> Span {
    tracing::debug_span!(
        "request",
        method = %request.method(),
        path = %redact_path(request.uri().path()),
        version = ?request.version(),
    )
}

/// Shortens every token-shaped path segment to its log prefix.
pub fn redact_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_valid_token(segment) {
                format!("{}***", token_prefix(segment))
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
