use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request::Parts,
        HeaderName, HeaderValue, Method,
    },
};
use axum_extra::extract::CookieJar;
use subtle::ConstantTimeEq;
use tower_http::cors::CorsLayer;

use crate::api::AppState;
use crate::auth::{extract_bearer_token, AuthError, UserRole};
use crate::models::User;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Authenticated caller resolved from a bearer header or the access cookie
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
}

/// Authenticated caller whose CSRF cookie matches the `X-CSRF-Token` header
#[derive(Debug, Clone)]
pub struct CsrfProtected(pub CurrentUser);

/// Bearer header first, then the `access_token` cookie.
pub fn token_from_parts(parts: &Parts) -> Result<String, AuthError> {
    if let Some(header) = parts.headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        if let Ok(token) = extract_bearer_token(header) {
            return Ok(token.to_string());
        }
    }

    let jar = CookieJar::from_headers(&parts.headers);
    match jar.get(ACCESS_TOKEN_COOKIE) {
        Some(cookie) if !cookie.value().is_empty() => Ok(cookie.value().to_string()),
        _ => Err(AuthError::NotAuthenticated),
    }
}

/// Double-submit check: cookie and header must both be present and equal.
pub fn verify_csrf(parts: &Parts) -> Result<(), AuthError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let cookie = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());
    let header = parts
        .headers
        .get(CSRF_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    match (cookie, header) {
        (Some(cookie), Some(header)) if !cookie.is_empty() && bool::from(cookie.as_bytes().ct_eq(header.as_bytes())) => {
            Ok(())
        }
        _ => Err(AuthError::CsrfMismatch),
    }
}

async fn resolve_user(state: &AppState, token: &str) -> Result<User, AuthError> {
    let claims = state.jwt.validate_token(token)?;
    let user_id = claims.user_id()?;

    state.auth.find_user(user_id).await?.ok_or(AuthError::UserNotFound)
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)?;
        let user = resolve_user(state, &token).await?;

        Ok(CurrentUser { user })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CsrfProtected {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts)?;
        // Signature and expiry are checked before CSRF so an anonymous caller sees 401.
        state.jwt.validate_token(&token)?;
        verify_csrf(parts)?;

        let user = resolve_user(state, &token).await?;
        Ok(CsrfProtected(CurrentUser { user }))
    }
}

/// Role gate used by coach-only and athlete-only endpoints
pub fn require_role(user: &User, role: UserRole) -> Result<(), AuthError> {
    if user.role == role {
        Ok(())
    } else {
        Err(AuthError::RoleRequired(role))
    }
}

/// CORS for the configured frontend origin; credentials are allowed so the
/// origin must be explicit.
pub fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER),
            HeaderName::from_static("x-signature"),
            HeaderName::from_static("x-timestamp"),
        ])
        .allow_credentials(true);

    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            tracing::warn!("Invalid CORS origin {:?}, cross-origin requests will be rejected", origin);
            layer
        }
    }
}

/// Security headers middleware
pub fn security_headers_layer() -> tower_http::set_header::SetResponseHeaderLayer<HeaderValue> {
    tower_http::set_header::SetResponseHeaderLayer::overriding(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::{header::COOKIE, Request};

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let parts = parts(&[
            ("authorization", "Bearer header-token"),
            ("cookie", "access_token=cookie-token"),
        ]);

        assert_eq!(token_from_parts(&parts).unwrap(), "header-token");
    }

    #[test]
    fn test_cookie_fallback() {
        let parts = parts(&[(COOKIE.as_str(), "csrf_token=abc; access_token=cookie-token")]);

        assert_eq!(token_from_parts(&parts).unwrap(), "cookie-token");
    }

    #[test]
    fn test_missing_token() {
        assert_matches!(token_from_parts(&parts(&[])), Err(AuthError::NotAuthenticated));
        assert_matches!(
            token_from_parts(&parts(&[("authorization", "Basic abc")])),
            Err(AuthError::NotAuthenticated)
        );
    }

    #[test]
    fn test_csrf_double_submit() {
        let ok = parts(&[("cookie", "csrf_token=abc123"), ("x-csrf-token", "abc123")]);
        assert!(verify_csrf(&ok).is_ok());

        let mismatch = parts(&[("cookie", "csrf_token=abc123"), ("x-csrf-token", "abc124")]);
        assert_matches!(verify_csrf(&mismatch), Err(AuthError::CsrfMismatch));

        let no_header = parts(&[("cookie", "csrf_token=abc123")]);
        assert_matches!(verify_csrf(&no_header), Err(AuthError::CsrfMismatch));

        let no_cookie = parts(&[("x-csrf-token", "abc123")]);
        assert_matches!(verify_csrf(&no_cookie), Err(AuthError::CsrfMismatch));
    }

    #[test]
    fn test_csrf_rejects_prefix_and_empty_values() {
        let prefix = parts(&[("cookie", "csrf_token=abc123"), ("x-csrf-token", "abc")]);
        assert_matches!(verify_csrf(&prefix), Err(AuthError::CsrfMismatch));

        let longer = parts(&[("cookie", "csrf_token=abc"), ("x-csrf-token", "abc123")]);
        assert_matches!(verify_csrf(&longer), Err(AuthError::CsrfMismatch));

        let empty = parts(&[("cookie", "csrf_token="), ("x-csrf-token", "")]);
        assert_matches!(verify_csrf(&empty), Err(AuthError::CsrfMismatch));
    }
}
