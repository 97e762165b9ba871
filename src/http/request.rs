//! Request identification.
//!
//! # Responsibilities
//! - Generate a UUID v4 request ID when the caller sent none
//! - Echo the ID back on the response
//! - Give handlers and logs a single accessor for it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing, before admission,
//!   so denials carry one too

use axum::http::{HeaderName, HeaderValue, Request};
use tower::layer::util::Stack;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId as TowerRequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<TowerRequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(TowerRequestId::new)
    }
}

/// Layer that sets `x-request-id` on the request and propagates it to the response.
pub type RequestIdLayer = Stack<PropagateRequestIdLayer, SetRequestIdLayer<UuidRequestId>>;

pub fn request_id_layer() -> RequestIdLayer {
    let header = HeaderName::from_static(X_REQUEST_ID);
    Stack::new(
        PropagateRequestIdLayer::new(header.clone()),
        SetRequestIdLayer::new(header, UuidRequestId),
    )
}

/// Access to the request ID of a request.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
