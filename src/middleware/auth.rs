use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::Value;

use crate::config::SecurityConfig;
use crate::database::{document_id, Document};
use crate::error::ApiError;
use crate::database::models::user;
use crate::services::auth_service::AuthError;
use crate::state::AppState;

/// Name of the session cookie.
pub const JWT_COOKIE: &str = "jwt";

/// Value written over the session cookie on logout.
pub const LOGGED_OUT: &str = "loggedout";

/// The user behind a valid session token (bearer header or `jwt` cookie).
///
/// ```ignore
/// async fn handler(Authenticated(user): Authenticated) -> ApiResult<Value> { ... }
/// ```
#[derive(Debug, Clone)]
pub struct Authenticated(pub Document);

impl Authenticated {
    pub fn id(&self) -> &str {
        document_id(&self.0).unwrap_or_default()
    }

    pub fn role(&self) -> &str {
        user::role(&self.0)
    }

    /// Fails with Forbidden unless the user's role is one of `roles`.
    pub fn require_role(&self, roles: &[&str]) -> Result<(), ApiError> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(AuthError::Forbidden.into())
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<Authenticated>() {
            return Ok(user.clone());
        }

        let token = extract_jwt_from_headers(&parts.headers).or_else(|| jwt_cookie(&parts.headers));
        let user = state.auth().authenticate(token.as_deref()).await?;

        let authenticated = Authenticated(user);
        parts.extensions.insert(authenticated.clone());
        Ok(authenticated)
    }
}

/// The logged-in user for page rendering, from the cookie only. Never fails.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<Document>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = jwt_cookie(&parts.headers) else {
            return Ok(OptionalUser(None));
        };
        let user = state.auth().authenticate(Some(&token)).await.ok();
        Ok(OptionalUser(user))
    }
}

impl OptionalUser {
    /// Client representation of the user, or `null`.
    pub fn present(&self) -> Value {
        match &self.0 {
            Some(doc) => user::collection().present(doc.clone(), None),
            None => Value::Null,
        }
    }
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Option<String> {
    let auth_str = headers.get("authorization")?.to_str().ok()?;
    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn jwt_cookie(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(JWT_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Session cookie carrying `token`.
pub fn session_cookie(token: &str, security: &SecurityConfig) -> Cookie<'static> {
    let max_age = i64::try_from(security.cookie_expiry_days)
        .ok()
        .and_then(|days| days.checked_mul(86_400))
        .map(time::Duration::seconds)
        .unwrap_or(time::Duration::MAX);
    Cookie::build((JWT_COOKIE, token.to_string()))
        .path("/")
        .max_age(max_age)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.require_https)
        .build()
}

/// Overwrites the session cookie with a short-lived placeholder.
pub fn logout_cookie(security: &SecurityConfig) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .path("/")
        .max_age(time::Duration::seconds(10))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.require_https)
        .build()
}
