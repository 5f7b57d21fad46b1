use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::handlers::{health, reviews, tours, users, views};
use crate::middleware::{normalize_errors, not_found};
use crate::state::AppState;

/// Full application router.
///
/// Stage order, outermost first: request tracing, CORS, error normalization,
/// then routing. The body size cap is enforced by the body extractors, so an
/// oversized request fails inside the normalizer like any other rejection.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/api/v1/tours", tours::routes())
        .nest("/api/v1/reviews", reviews::routes())
        .nest("/api/v1/users", users::routes());

    let router = Router::new()
        .route("/health", get(health::health))
        .merge(views::routes())
        .merge(api)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(cors_layer(&state.config.api))
                .layer(from_fn_with_state(state.clone(), normalize_errors))
                .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes)),
        );

    let router = if state.config.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn cors_layer(api: &ApiConfig) -> CorsLayer {
    if api.cors_origins.is_empty() || api.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
}
