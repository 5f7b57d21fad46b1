use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

use crate::database::models::user;
use crate::database::Document;
use crate::error::ApiError;
use crate::middleware::auth::{logout_cookie, session_cookie};
use crate::middleware::{ApiResponse, Authenticated, DocumentBody, JsonBody};
use crate::services::auth_service::Session;
use crate::state::AppState;

type SessionResponse = Result<(CookieJar, ApiResponse<Value>), ApiError>;

/// Sets the session cookie and returns `{ token, data: { user } }`.
fn send_session(state: &AppState, jar: CookieJar, session: Session, status: StatusCode) -> SessionResponse {
    let jar = jar.add(session_cookie(&session.token, &state.config.security));
    let user = user::collection().present(session.user, None);
    Ok((jar, ApiResponse::with_status(json!({ "user": user }), status).with_token(session.token)))
}

fn field<'a>(body: &'a Document, name: &str) -> Option<&'a str> {
    body.get(name).and_then(Value::as_str)
}

pub async fn signup(State(state): State<AppState>, jar: CookieJar, JsonBody(body): DocumentBody) -> SessionResponse {
    let session = state.auth().signup(body).await?;
    send_session(&state, jar, session, StatusCode::CREATED)
}

pub async fn login(State(state): State<AppState>, jar: CookieJar, JsonBody(body): DocumentBody) -> SessionResponse {
    let session = state.auth().login(field(&body, "email"), field(&body, "password")).await?;
    send_session(&state, jar, session, StatusCode::OK)
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    (jar.add(logout_cookie(&state.config.security)), ApiResponse::ok())
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(body): DocumentBody,
) -> Result<ApiResponse<()>, ApiError> {
    let origin = request_origin(&headers, state.config.security.require_https);
    state.auth().forgot_password(field(&body, "email"), &origin).await?;
    Ok(ApiResponse::message("Token sent to email!"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    JsonBody(body): DocumentBody,
) -> SessionResponse {
    let session = state.auth().reset_password(&token, body).await?;
    send_session(&state, jar, session, StatusCode::OK)
}

pub async fn update_my_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Authenticated(user): Authenticated,
    JsonBody(body): DocumentBody,
) -> SessionResponse {
    let session = state.auth().update_password(&user, body).await?;
    send_session(&state, jar, session, StatusCode::OK)
}

/// `{scheme}://{host}` of the incoming request.
fn request_origin(headers: &HeaderMap, require_https: bool) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(if require_https { "https" } else { "http" });
    format!("{}://{}", scheme, host)
}
