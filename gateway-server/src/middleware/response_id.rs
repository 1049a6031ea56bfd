//! Stamps every outgoing response with a fresh `x-request-id` (§4.8: "a
//! response id header added on the way out"), independent of whatever audit
//! correlation id a handler may have logged internally.

use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use gateway_core::RequestId;

pub async fn stamp_response_id(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(RequestId::generate().as_str()) {
        response.headers_mut().insert(axum::http::HeaderName::from_static("x-request-id"), value);
    }
    response
}
