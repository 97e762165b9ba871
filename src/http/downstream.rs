//! Placeholder downstream for admitted requests.
//!
//! The gatekeeper is meant to sit in front of real handlers; when run as a
//! standalone binary, admitted requests land here and get a JSON echo.

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use crate::admission::AuthenticatedIdentity;
use crate::http::request::RequestIdExt;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittedResponse {
    pub success: bool,
    pub method: String,
    pub path: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
}

pub async fn admitted_handler(request: Request<Body>) -> impl IntoResponse {
    tracing::debug!(
        request_id = %request.request_id(),
        method = %request.method(),
        path = %request.uri().path(),
        "Serving admitted request"
    );

    Json(AdmittedResponse {
        success: true,
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        request_id: request.request_id().to_string(),
        identity: request
            .extensions()
            .get::<AuthenticatedIdentity>()
            .map(|id| id.0.clone()),
    })
}
