use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;

/// Success envelope: `{ status: "success", results?, token?, message?, data? }`.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: Option<T>,
    pub results: Option<usize>,
    pub token: Option<String>,
    pub message: Option<String>,
    pub status_code: Option<StatusCode>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a successful API response with default 200 status
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            results: None,
            token: None,
            message: None,
            status_code: None,
        }
    }

    /// Create an API response with custom status code
    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self {
            status_code: Some(status_code),
            ..Self::success(data)
        }
    }

    /// Create a 201 Created response
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }

    /// Adds the `results` count of a list response.
    pub fn with_results(mut self, results: usize) -> Self {
        self.results = Some(results);
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

impl ApiResponse<()> {
    /// Create a 204 No Content response
    pub fn no_content() -> Self {
        Self {
            data: None,
            results: None,
            token: None,
            message: None,
            status_code: Some(StatusCode::NO_CONTENT),
        }
    }

    /// `{ status: "success", message }` without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::ok()
        }
    }

    /// `{ status: "success" }` without a payload.
    pub fn ok() -> Self {
        Self {
            data: None,
            results: None,
            token: None,
            message: None,
            status_code: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);

        // For 204 No Content, return empty response
        if status == StatusCode::NO_CONTENT {
            return status.into_response();
        }

        let mut envelope = json!({ "status": "success" });
        if let Some(results) = self.results {
            envelope["results"] = json!(results);
        }
        if let Some(token) = self.token {
            envelope["token"] = Value::String(token);
        }
        if let Some(message) = self.message {
            envelope["message"] = Value::String(message);
        }
        if let Some(data) = self.data {
            match serde_json::to_value(&data) {
                Ok(value) => envelope["data"] = value,
                Err(e) => return ApiError::from(e).into_response(),
            }
        }

        (status, Json(envelope)).into_response()
    }
}

/// `{ data: <value> }`, the payload shape of single-document responses.
pub fn wrap_data(value: Value) -> Value {
    json!({ "data": value })
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_envelope_carries_results() {
        let response = ApiResponse::success(wrap_data(json!([1, 2]))).with_results(2).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(response).await, json!({ "status": "success", "results": 2, "data": { "data": [1, 2] } }));
    }

    #[tokio::test]
    async fn created_with_token() {
        let response = ApiResponse::created(json!({ "user": {} })).with_token("t").into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body(response).await["token"], json!("t"));
    }

    #[tokio::test]
    async fn no_content_has_empty_body() {
        let response = ApiResponse::no_content().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}
