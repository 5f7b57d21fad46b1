// HTTP API Error Types
use axum::extract::rejection::JsonRejection;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::{PasswordError, TokenError};
use crate::database::StoreError;
use crate::services::auth_service::AuthError;
use crate::services::email::MailError;

/// Client-facing failure. Every handler error funnels through this type and is
/// rendered once by the error normalization middleware.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 413 Payload Too Large
    PayloadTooLarge(String),

    // 500, anticipated by application logic; the message is shown to clients
    Operational(String),

    // 500, unexpected; the detail never leaves the server in production
    Internal { kind: &'static str, detail: String },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::Operational(_) | ApiError::Internal { .. } => 500,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// `fail` for client errors, `error` otherwise.
    pub fn status_label(&self) -> &'static str {
        if (400..500).contains(&self.status_code()) {
            "fail"
        } else {
            "error"
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Internal { .. })
    }

    /// Message as raised. For internal failures this is the diagnostic detail.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Operational(msg) => msg,
            ApiError::Internal { detail, .. } => detail,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Unauthorized(_) => "Unauthorized",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::PayloadTooLarge(_) => "PayloadTooLarge",
            ApiError::Operational(_) => "Internal",
            ApiError::Internal { kind, .. } => kind,
        }
    }

    /// Production body: operational messages verbatim, everything else generic.
    pub fn to_json(&self) -> Value {
        let message = if self.is_operational() {
            self.message()
        } else {
            "Something went very wrong!"
        };
        json!({
            "status": self.status_label(),
            "message": message,
        })
    }

    /// Development body: full detail including the diagnostic trace.
    pub fn to_dev_json(&self) -> Value {
        json!({
            "status": self.status_label(),
            "error": {
                "kind": self.kind(),
                "statusCode": self.status_code(),
                "status": self.status_label(),
                "isOperational": self.is_operational(),
            },
            "message": self.message(),
            "stack": format!("{}: {}", self.kind(), self.message()),
        })
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn operational(message: impl Into<String>) -> Self {
        ApiError::Operational(message.into())
    }

    pub fn internal(kind: &'static str, detail: impl Into<String>) -> Self {
        ApiError::Internal { kind, detail: detail.into() }
    }

    pub fn no_document() -> Self {
        ApiError::not_found("No document found with that ID")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
                ApiError::bad_request(format!("Invalid input data. {}", messages.join(". ")))
            }
            StoreError::Duplicate { value, .. } => {
                ApiError::bad_request(format!("Duplicate field value: \"{}\". Please use another value!", value))
            }
            StoreError::Cast { field, value } => ApiError::bad_request(format!("Invalid {}: {}.", field, value)),
            StoreError::UnsupportedOperator { field, op } => {
                ApiError::bad_request(format!("Invalid {}: {}.", field, op))
            }
            StoreError::Backend(msg) => ApiError::internal("StoreError", msg),
            StoreError::Sqlx(e) => ApiError::internal("DatabaseError", e.to_string()),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => ApiError::unauthorized("Invalid token. Please log in again!"),
            TokenError::Expired => ApiError::unauthorized("Your token has expired! Please log in again."),
            TokenError::Generation(msg) => ApiError::internal("TokenError", msg),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal("PasswordError", err.to_string())
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::internal("MailError", err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::ResetTokenInvalid => ApiError::bad_request(err.to_string()),
            AuthError::IncorrectCredentials
            | AuthError::NotLoggedIn
            | AuthError::UserGone
            | AuthError::PasswordChanged
            | AuthError::WrongCurrentPassword => ApiError::unauthorized(err.to_string()),
            AuthError::Forbidden => ApiError::forbidden(err.to_string()),
            AuthError::UnknownEmail => ApiError::not_found(err.to_string()),
            AuthError::ResetMailFailed(_) => ApiError::operational(err.to_string()),
            AuthError::Token(e) => e.into(),
            AuthError::Store(e) => e.into(),
            AuthError::Password(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::PayloadTooLarge(rejection.body_text()),
            _ => ApiError::bad_request(rejection.body_text()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::internal("SerializationError", err.to_string())
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Renders the production API shape and attaches the error so the
// normalization middleware can re-render it per surface and environment.
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status(), Json(self.to_json())).into_response();
        response.extensions_mut().insert(self);
        response
    }
}
