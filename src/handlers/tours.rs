use axum::{
    extract::{Path, RawQuery, State},
    routing::get,
    Router,
};
use serde_json::Value;

use super::factory;
use crate::database::models::tour;
use crate::middleware::{ApiResult, Authenticated, DocumentBody, JsonBody};
use crate::state::AppState;

/// Roles allowed to change the tour catalogue.
const EDITORS: &[&str] = &["admin", "lead-guide"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
        .nest("/:id/reviews", super::reviews::nested_routes())
}

async fn list(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    factory::get_all(&state, tour::collection(), None, query.as_deref()).await
}

async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    factory::get_one(&state, tour::collection(), &id, &[tour::reviews_expansion()]).await
}

async fn create(State(state): State<AppState>, user: Authenticated, JsonBody(attrs): DocumentBody) -> ApiResult<Value> {
    user.require_role(EDITORS)?;
    factory::create_one(&state, tour::collection(), attrs).await
}

async fn update(
    State(state): State<AppState>,
    user: Authenticated,
    Path(id): Path<String>,
    JsonBody(patch): DocumentBody,
) -> ApiResult<Value> {
    user.require_role(EDITORS)?;
    factory::update_one(&state, tour::collection(), &id, patch).await
}

async fn remove(State(state): State<AppState>, user: Authenticated, Path(id): Path<String>) -> ApiResult<()> {
    user.require_role(EDITORS)?;
    factory::delete_one(&state, tour::collection(), &id).await
}
