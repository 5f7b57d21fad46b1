use axum::{
    extract::{Request, State},
    http::Uri,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};

use crate::config::Environment;
use crate::error::ApiError;
use crate::state::AppState;

/// Which client a failing request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Api,
    Page,
}

impl Surface {
    pub fn of(path: &str) -> Self {
        if path == "/api" || path.starts_with("/api/") {
            Surface::Api
        } else {
            Surface::Page
        }
    }
}

/// Single normalization point: re-renders any response that carries an
/// [`ApiError`] for the request's surface and the running environment.
pub async fn normalize_errors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(error) = response.extensions().get::<ApiError>().cloned() else {
        return response;
    };

    log_error(&error, &path);
    render(&error, Surface::of(&path), state.config.environment)
}

fn log_error(error: &ApiError, path: &str) {
    if !error.is_operational() || error.status_code() >= 500 {
        tracing::error!(
            path,
            kind = error.kind(),
            status = error.status_code(),
            operational = error.is_operational(),
            "{}",
            error.message()
        );
    } else {
        tracing::debug!(path, status = error.status_code(), "{}", error.message());
    }
}

pub fn render(error: &ApiError, surface: Surface, environment: Environment) -> Response {
    let body = match (surface, environment) {
        (Surface::Api, Environment::Development) => error.to_dev_json(),
        (Surface::Api, _) => error.to_json(),
        (Surface::Page, Environment::Development) => page_body(error.message()),
        (Surface::Page, _) if error.is_operational() => page_body(error.message()),
        (Surface::Page, _) => page_body("Please try again later."),
    };
    (error.status(), Json(body)).into_response()
}

fn page_body(msg: &str) -> Value {
    json!({
        "template": "error",
        "title": "Something went wrong!",
        "msg": msg,
    })
}

/// Fallback for routes nothing else matched.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::http::StatusCode;

    async fn body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn surfaces() {
        assert_eq!(Surface::of("/api/v1/tours"), Surface::Api);
        assert_eq!(Surface::of("/tour/the-forest-hiker"), Surface::Page);
        assert_eq!(Surface::of("/apiary"), Surface::Page);
    }

    #[tokio::test]
    async fn production_api_hides_internal_detail() {
        let error = ApiError::internal("DatabaseError", "connection refused");
        let response = render(&error, Surface::Api, Environment::Production);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(response).await, json!({ "status": "error", "message": "Something went very wrong!" }));
    }

    #[tokio::test]
    async fn development_api_shows_detail_and_stack() {
        let error = ApiError::internal("DatabaseError", "connection refused");
        let body = body(render(&error, Surface::Api, Environment::Development)).await;
        assert_eq!(body["message"], json!("connection refused"));
        assert_eq!(body["error"]["isOperational"], json!(false));
        assert!(body["stack"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn production_page_keeps_operational_message() {
        let response = render(&ApiError::no_document(), Surface::Page, Environment::Production);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(response).await,
            json!({ "template": "error", "title": "Something went wrong!", "msg": "No document found with that ID" })
        );

        let hidden = body(render(&ApiError::internal("Boom", "stack"), Surface::Page, Environment::Production)).await;
        assert_eq!(hidden["msg"], json!("Please try again later."));
    }

    #[tokio::test]
    async fn client_errors_are_fail() {
        let body = body(render(&ApiError::bad_request("nope"), Surface::Api, Environment::Production)).await;
        assert_eq!(body, json!({ "status": "fail", "message": "nope" }));
    }
}
