use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tenderdesk_core::AppError;

use crate::error::HttpAppError;

#[derive(Clone)]
pub struct AuthState {
    /// Shared key clients present as `Authorization: Bearer <key>`. When unset
    /// every protected request is refused.
    pub master_api_key: Option<String>,
}

impl AuthState {
    pub fn new(master_api_key: Option<String>) -> Self {
        Self { master_api_key }
    }
}

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|t| !t.is_empty())
}

fn unauthorized(message: &str) -> Response {
    HttpAppError(AppError::Unauthorized(message.to_string())).into_response()
}

pub async fn auth_middleware(
    State(auth_state): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth_state.master_api_key.as_deref() else {
        tracing::warn!(path = %request.uri().path(), "Rejected request: no API key configured");
        return unauthorized("API authentication is not configured");
    };

    let Some(token) = bearer_token(&request) else {
        tracing::debug!(path = %request.uri().path(), "Missing or malformed authorization header");
        return unauthorized("Missing or invalid authorization header");
    };

    if !secure_compare(token, expected) {
        tracing::warn!(path = %request.uri().path(), "Invalid API key");
        return unauthorized("Invalid API key");
    }

    next.run(request).await
}
