//! Axum binding for the admission pipeline.
//!
//! # Responsibilities
//! - Build a `RequestContext` from the request
//! - Run the pipeline and either forward or answer with the denial
//! - Attach `X-RateLimit-*` headers (and `Retry-After` on 429)

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::admission::context::RequestContext;
use crate::admission::decision::{Decision, Denial, QuotaMetadata};
use crate::admission::pipeline::AdmissionPipeline;
use crate::clock::rfc3339_millis;

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// JSON body of a denial.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenialBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

/// Write the quota headers onto a response.
pub fn apply_quota_headers(headers: &mut HeaderMap, quota: &QuotaMetadata) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    // A reset too far out to render is left off.
    if let Some(value) =
        rfc3339_millis(quota.reset_at).and_then(|s| HeaderValue::from_str(&s).ok())
    {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let body = DenialBody {
            success: false,
            message: self.message,
            retry_after_seconds: self.retry_after_secs,
        };
        let mut response = (self.status, Json(body)).into_response();

        if let Some(quota) = &self.quota {
            apply_quota_headers(response.headers_mut(), quota);
        }
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Admission middleware. Install with
/// `axum::middleware::from_fn_with_state(pipeline, admission_middleware)`.
pub async fn admission_middleware(
    State(pipeline): State<Arc<AdmissionPipeline>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let trust_proxy = pipeline.policy().trust_proxy;
    let ctx = RequestContext::from_request(&request, trust_proxy);

    match pipeline.admit(&ctx).await {
        Decision::Allow { quota } => {
            let mut response = next.run(request).await;
            if let Some(quota) = quota {
                apply_quota_headers(response.headers_mut(), &quota);
            }
            response
        }
        Decision::Deny(denial) => denial.into_response(),
    }
}
