//! Request-size cap and content-type whitelist for bodies that carry a
//! payload (§4.8). The 10 MiB cap itself is enforced by
//! `tower_http::limit::RequestBodyLimitLayer` in the router assembly; this
//! middleware only narrows accepted `Content-Type`s on `POST`/`PUT`.

use axum::http::{Method, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

const ALLOWED_CONTENT_TYPES: &[&str] = &["application/json"];

pub async fn content_type_whitelist(req: Request<axum::body::Body>, next: Next) -> Response {
    if matches!(*req.method(), Method::POST | Method::PUT) {
        let content_type = req.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
        let base = content_type.split(';').next().unwrap_or("").trim();
        if !base.is_empty() && !ALLOWED_CONTENT_TYPES.contains(&base) {
            return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported content type").into_response();
        }
    }
    next.run(req).await
}
