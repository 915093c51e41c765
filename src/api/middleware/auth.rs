//! Bearer token authentication middleware
//!
//! Resolves the caller's [`Access`] and stores it as a request extension.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// What the caller may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Admin,
    Viewer,
}

impl Access {
    pub fn is_read_only(&self) -> bool {
        matches!(self, Access::Viewer)
    }
}

/// Configured bearer tokens. With neither set every caller is an admin.
#[derive(Debug, Clone, Default)]
pub struct AccessTokens {
    pub admin: Option<String>,
    pub viewer: Option<String>,
}

impl AccessTokens {
    fn is_open(&self) -> bool {
        self.admin.is_none() && self.viewer.is_none()
    }

    fn resolve(&self, token: &str) -> Option<Access> {
        if self.admin.as_deref() == Some(token) {
            Some(Access::Admin)
        } else if self.viewer.as_deref() == Some(token) {
            Some(Access::Viewer)
        } else {
            None
        }
    }
}

/// Authentication middleware
///
/// Checks for a Bearer token in the Authorization header
pub async fn access_middleware(
    State(tokens): State<Arc<AccessTokens>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let access = if tokens.is_open() {
        Access::Admin
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidFormat)?;

        tokens.resolve(token.trim()).ok_or(AuthError::InvalidToken)?
    };

    request.extensions_mut().insert(access);
    Ok(next.run(request).await)
}

/// Authentication errors
#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingToken => (StatusCode::UNAUTHORIZED, "Missing Authorization header"),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "Invalid Authorization format (expected: Bearer <token>)",
            ),
            AuthError::InvalidToken => (StatusCode::FORBIDDEN, "Invalid token"),
        };

        (status, message).into_response()
    }
}
