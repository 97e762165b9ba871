use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::http::server::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Whether `authorization` is `Bearer <api_key>`.
///
/// Both sides are reduced to an HMAC tag keyed by `api_key` and compared in
/// constant time, so neither the key's length nor its prefix leak.
fn bearer_matches(authorization: &str, api_key: &str) -> bool {
    let Some(token) = authorization.strip_prefix("Bearer ") else {
        return false;
    };
    if api_key.is_empty() {
        return false;
    }
    let Ok(mac) = HmacSha256::new_from_slice(api_key.as_bytes()) else {
        return false;
    };

    let mut expected = mac.clone();
    expected.update(api_key.as_bytes());
    let expected = expected.finalize().into_bytes();

    let mut presented = mac;
    presented.update(token.as_bytes());
    presented.verify_slice(&expected).is_ok()
}

/// Require `Authorization: Bearer <admin.api_key>`.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let config = state.config.load();

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|value| bearer_matches(value, &config.admin.api_key));

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected admin request");
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_matches_exact_key_only() {
        assert!(bearer_matches("Bearer s3cret", "s3cret"));
        assert!(!bearer_matches("Bearer s3cre", "s3cret"));
        assert!(!bearer_matches("Bearer s3cretx", "s3cret"));
        assert!(!bearer_matches("bearer s3cret", "s3cret"));
        assert!(!bearer_matches("s3cret", "s3cret"));
        assert!(!bearer_matches("Bearer ", ""));
    }
}
