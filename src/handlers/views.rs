//! Page payloads for the server-rendered surface. Each response names the
//! template to render and carries its data; failures on these paths are
//! rendered with the page error template.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::config::QueryConfig;
use crate::database::expand::expand;
use crate::database::models::tour;
use crate::error::ApiError;
use crate::filter::{Condition, QuerySpecBuilder};
use crate::middleware::{Authenticated, OptionalUser};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(overview))
        .route("/tour/:slug", get(tour_page))
        .route("/login", get(login))
        .route("/me", get(account))
}

async fn overview(State(state): State<AppState>, user: OptionalUser) -> Result<Json<Value>, ApiError> {
    let unbounded = QueryConfig { default_limit: u32::MAX, max_limit: None };
    let spec = QuerySpecBuilder::new(tour::collection().base_filter.clone(), &unbounded).build();
    let tours: Vec<Value> = state
        .store
        .find(tour::collection(), &spec)
        .await?
        .into_iter()
        .map(|doc| tour::collection().present(doc, None))
        .collect();

    Ok(Json(json!({
        "template": "overview",
        "title": "All Tours",
        "user": user.present(),
        "tours": tours,
    })))
}

async fn tour_page(
    State(state): State<AppState>,
    user: OptionalUser,
    Path(slug): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let doc = state
        .store
        .find_one(tour::collection(), &[Condition::eq("slug", slug)])
        .await?
        .ok_or_else(|| ApiError::not_found("There is no tour with that name."))?;

    let mut docs = [doc];
    expand(state.store.as_ref(), tour::collection(), &mut docs, &[tour::reviews_expansion()]).await?;
    let [doc] = docs;
    let tour = tour::collection().present(doc, None);
    let title = format!("{} Tour", tour["name"].as_str().unwrap_or_default());

    Ok(Json(json!({
        "template": "tour",
        "title": title,
        "user": user.present(),
        "tour": tour,
    })))
}

async fn login(user: OptionalUser) -> Json<Value> {
    Json(json!({
        "template": "login",
        "title": "Log into your account",
        "user": user.present(),
    }))
}

async fn account(user: Authenticated) -> Json<Value> {
    let user = OptionalUser(Some(user.0));
    Json(json!({
        "template": "account",
        "title": "Your account",
        "user": user.present(),
    }))
}
