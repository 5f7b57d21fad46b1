use axum::{
    extract::{Path, RawQuery, State},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::{json, Value};

use super::{auth, factory};
use crate::database::models::user::{self, CREDENTIAL_FIELDS, SELF_EDITABLE};
use crate::database::{document, Document};
use crate::error::ApiError;
use crate::middleware::{wrap_data, ApiResponse, ApiResult, Authenticated, DocumentBody, JsonBody};
use crate::state::AppState;

const ADMIN: &[&str] = &["admin"];

/// `/api/v1/users`
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        .route("/updateMyPassword", patch(auth::update_my_password))
        .route("/me", get(me))
        .route("/updateMe", patch(update_me))
        .route("/deleteMe", delete(delete_me))
        .route("/", get(list).post(create))
        .route("/:id", get(show).patch(update).delete(remove))
}

async fn me(State(state): State<AppState>, user: Authenticated) -> ApiResult<Value> {
    factory::get_one(&state, user::collection(), user.id(), &[]).await
}

async fn update_me(State(state): State<AppState>, user: Authenticated, JsonBody(body): DocumentBody) -> ApiResult<Value> {
    if body.keys().any(|key| CREDENTIAL_FIELDS.contains(&key.as_str())) {
        return Err(ApiError::bad_request(factory::PASSWORD_ROUTE_MESSAGE));
    }

    let patch = self_editable(body);
    let updated = state
        .store
        .update_by_id(user::collection(), user.id(), patch)
        .await?
        .ok_or_else(ApiError::no_document)?;

    Ok(ApiResponse::success(json!({ "user": user::collection().present(updated, None) })))
}

async fn delete_me(State(state): State<AppState>, user: Authenticated) -> ApiResult<()> {
    state
        .store
        .update_by_id(user::collection(), user.id(), document(json!({ "active": false })))
        .await?;
    tracing::info!(user = user.id(), "account deactivated");
    Ok(ApiResponse::no_content())
}

async fn list(State(state): State<AppState>, user: Authenticated, RawQuery(query): RawQuery) -> ApiResult<Value> {
    user.require_role(ADMIN)?;
    factory::get_all(&state, user::collection(), None, query.as_deref()).await
}

async fn show(State(state): State<AppState>, user: Authenticated, Path(id): Path<String>) -> ApiResult<Value> {
    user.require_role(ADMIN)?;
    factory::get_one(&state, user::collection(), &id, &[]).await
}

/// Admin creation goes through the credential path so the password is hashed.
async fn create(State(state): State<AppState>, user: Authenticated, JsonBody(body): DocumentBody) -> ApiResult<Value> {
    user.require_role(ADMIN)?;
    let created = state.auth().create_user(body).await?;
    Ok(ApiResponse::created(wrap_data(user::collection().present(created, None))))
}

async fn update(
    State(state): State<AppState>,
    user: Authenticated,
    Path(id): Path<String>,
    JsonBody(patch): DocumentBody,
) -> ApiResult<Value> {
    user.require_role(ADMIN)?;
    factory::update_one(&state, user::collection(), &id, patch).await
}

async fn remove(State(state): State<AppState>, user: Authenticated, Path(id): Path<String>) -> ApiResult<()> {
    user.require_role(ADMIN)?;
    factory::delete_one(&state, user::collection(), &id).await
}

fn self_editable(mut body: Document) -> Document {
    body.retain(|key, _| SELF_EDITABLE.contains(&key.as_str()));
    body
}
