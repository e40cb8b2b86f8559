//! Request ID assignment and log correlation.

use axum::extract::Request;
use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Layers that assign a UUID v4 request ID when absent and echo it back on
/// the response.
pub fn request_id_layer() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    let header_name = HeaderName::from_static(X_REQUEST_ID);

    (
        SetRequestIdLayer::new(header_name.clone(), MakeRequestUuid),
        PropagateRequestIdLayer::new(header_name),
    )
}

/// Span for the trace layer carrying the assigned request ID, so a rejected
/// login in the logs can be matched to the ID the client received.
pub fn span_for_request(req: &Request) -> Span {
    tracing::debug_span!(
        "request",
        method = %req.method(),
        uri = %req.uri(),
        request_id = header_request_id(req),
    )
}

fn header_request_id(req: &Request) -> &str {
    req.headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn span_uses_assigned_header() {
        let req = Request::builder()
            .uri("/auth/status")
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(header_request_id(&req), "abc-123");
    }

    #[test]
    fn missing_header_gets_placeholder() {
        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(header_request_id(&req), "-");
    }
}
