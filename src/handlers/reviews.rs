use axum::{
    extract::{Path, RawQuery, State},
    routing::get,
    Router,
};
use serde_json::Value;

use super::factory;
use crate::database::models::review;
use crate::database::Document;
use crate::filter::Condition;
use crate::middleware::{ApiResult, Authenticated, DocumentBody, JsonBody};
use crate::state::AppState;

const AUTHORS: &[&str] = &["user"];
const MODERATORS: &[&str] = &["user", "admin"];

/// `/api/v1/reviews`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
}

/// `/api/v1/tours/:id/reviews`
pub fn nested_routes() -> Router<AppState> {
    Router::new().route("/", get(list_for_tour).post(create_for_tour))
}

async fn list(State(state): State<AppState>, _user: Authenticated, RawQuery(query): RawQuery) -> ApiResult<Value> {
    factory::get_all(&state, review::collection(), None, query.as_deref()).await
}

async fn list_for_tour(
    State(state): State<AppState>,
    _user: Authenticated,
    Path(tour_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    let parent = Condition::eq("tour", tour_id);
    factory::get_all(&state, review::collection(), Some(parent), query.as_deref()).await
}

async fn create(State(state): State<AppState>, user: Authenticated, JsonBody(attrs): DocumentBody) -> ApiResult<Value> {
    user.require_role(AUTHORS)?;
    let attrs = with_tour_and_user(attrs, None, &user);
    factory::create_one(&state, review::collection(), attrs).await
}

async fn create_for_tour(
    State(state): State<AppState>,
    user: Authenticated,
    Path(tour_id): Path<String>,
    JsonBody(attrs): DocumentBody,
) -> ApiResult<Value> {
    user.require_role(AUTHORS)?;
    let attrs = with_tour_and_user(attrs, Some(tour_id), &user);
    factory::create_one(&state, review::collection(), attrs).await
}

async fn show(State(state): State<AppState>, _user: Authenticated, Path(id): Path<String>) -> ApiResult<Value> {
    factory::get_one(&state, review::collection(), &id, &[]).await
}

async fn update(
    State(state): State<AppState>,
    user: Authenticated,
    Path(id): Path<String>,
    JsonBody(patch): DocumentBody,
) -> ApiResult<Value> {
    user.require_role(MODERATORS)?;
    factory::update_one(&state, review::collection(), &id, patch).await
}

async fn remove(State(state): State<AppState>, user: Authenticated, Path(id): Path<String>) -> ApiResult<()> {
    user.require_role(MODERATORS)?;
    factory::delete_one(&state, review::collection(), &id).await
}

/// Missing `tour` comes from the path, missing `user` from the session.
fn with_tour_and_user(mut attrs: Document, tour_id: Option<String>, user: &Authenticated) -> Document {
    if !attrs.contains_key("tour") {
        if let Some(tour_id) = tour_id {
            attrs.insert("tour".to_string(), Value::String(tour_id));
        }
    }
    if !attrs.contains_key("user") {
        attrs.insert("user".to_string(), Value::String(user.id().to_string()));
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::document;
    use serde_json::json;

    #[test]
    fn fills_tour_and_user_only_when_missing() {
        let user = Authenticated(document(json!({ "id": "me", "role": "user" })));

        let filled = with_tour_and_user(document(json!({ "review": "ok" })), Some("t1".into()), &user);
        assert_eq!(filled["tour"], json!("t1"));
        assert_eq!(filled["user"], json!("me"));

        let kept = with_tour_and_user(document(json!({ "tour": "t2", "user": "other" })), Some("t1".into()), &user);
        assert_eq!(kept["tour"], json!("t2"));
        assert_eq!(kept["user"], json!("other"));
    }
}
