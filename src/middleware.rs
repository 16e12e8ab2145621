use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, header::HeaderName},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that tags every request with an ID and logs receipt and completion
pub async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = extract_or_generate_request_id(request.headers());

    let span = info_span!("request", request_id = %request_id);

    debug!(
        parent: &span,
        method = %request.method(),
        uri = %request.uri(),
        "request received"
    );

    // Add request ID to request extensions for use in handlers
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).instrument(span.clone()).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), header_value);
    }

    info!(
        parent: &span,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request served"
    );

    response
}

/// Generate a unique request ID
pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Extract request ID from request headers or generate a new one
pub fn extract_or_generate_request_id(headers: &HeaderMap) -> String {
    if let Some(request_id) = headers.get(REQUEST_ID_HEADER)
        && let Ok(id) = request_id.to_str()
        && !id.is_empty()
    {
        return id.to_string();
    }

    generate_request_id()
}

/// Type for storing request ID in request extensions
#[derive(Clone, Debug)]
pub struct RequestId(pub String);
