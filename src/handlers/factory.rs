//! Generic list / get-one / create / update / delete over any collection.
//!
//! Route handlers stay thin: they check roles, pick the collection and hand
//! over to these functions.

use serde_json::Value;

use crate::database::expand::expand;
use crate::database::models::{Collection, Expansion};
use crate::database::{Document, StoreError};
use crate::error::ApiError;
use crate::filter::{Condition, QueryParams, QuerySpecBuilder};
use crate::middleware::{wrap_data, ApiResponse, ApiResult};
use crate::state::AppState;

pub const PASSWORD_ROUTE_MESSAGE: &str = "This route is not for password updates. Please use /updateMyPassword.";

pub async fn get_all(
    state: &AppState,
    collection: &'static Collection,
    parent: Option<Condition>,
    raw_query: Option<&str>,
) -> ApiResult<Value> {
    let params = QueryParams::parse(raw_query.unwrap_or_default());

    let mut builder = QuerySpecBuilder::new(collection.base_filter.clone(), &state.config.query);
    if let Some(parent) = parent {
        builder = builder.with_condition(parent);
    }
    let spec = builder
        .filter(&params)
        .sort(&params)
        .limit_fields(&params)
        .paginate(&params)
        .build();

    let mut docs = state.store.find(collection, &spec).await?;
    expand(state.store.as_ref(), collection, &mut docs, &[]).await?;

    let docs: Vec<Value> = docs
        .into_iter()
        .map(|doc| collection.present(doc, Some(&spec.projection)))
        .collect();
    let results = docs.len();
    Ok(ApiResponse::success(wrap_data(Value::Array(docs))).with_results(results))
}

/// Single document with its expansions, unwrapped.
pub async fn find_one(
    state: &AppState,
    collection: &'static Collection,
    id: &str,
    extra: &[Expansion],
) -> Result<Value, ApiError> {
    let doc = state
        .store
        .find_by_id(collection, id)
        .await?
        .ok_or_else(ApiError::no_document)?;

    let mut docs = [doc];
    expand(state.store.as_ref(), collection, &mut docs, extra).await?;
    let [doc] = docs;
    Ok(collection.present(doc, None))
}

pub async fn get_one(
    state: &AppState,
    collection: &'static Collection,
    id: &str,
    extra: &[Expansion],
) -> ApiResult<Value> {
    let doc = find_one(state, collection, id, extra).await?;
    Ok(ApiResponse::success(wrap_data(doc)))
}

pub async fn create_one(state: &AppState, collection: &'static Collection, attrs: Document) -> ApiResult<Value> {
    let doc = state.store.create(collection, attrs).await?;
    after_write(state, collection, &doc, None).await?;
    tracing::info!(collection = collection.name, id = crate::database::document_id(&doc), "document created");
    Ok(ApiResponse::created(wrap_data(collection.present(doc, None))))
}

pub async fn update_one(
    state: &AppState,
    collection: &'static Collection,
    id: &str,
    patch: Document,
) -> ApiResult<Value> {
    if patch.keys().any(|key| collection.write_protected.contains(&key.as_str())) {
        return Err(ApiError::bad_request(PASSWORD_ROUTE_MESSAGE));
    }

    let previous = if collection.hook.is_some() {
        state.store.find_by_id(collection, id).await?
    } else {
        None
    };
    let doc = state
        .store
        .update_by_id(collection, id, patch)
        .await?
        .ok_or_else(ApiError::no_document)?;
    after_write(state, collection, &doc, previous.as_ref()).await?;

    let mut docs = [doc];
    expand(state.store.as_ref(), collection, &mut docs, &[]).await?;
    let [doc] = docs;
    Ok(ApiResponse::success(wrap_data(collection.present(doc, None))))
}

pub async fn delete_one(state: &AppState, collection: &'static Collection, id: &str) -> ApiResult<()> {
    let doc = state
        .store
        .delete_by_id(collection, id)
        .await?
        .ok_or_else(ApiError::no_document)?;
    after_write(state, collection, &doc, None).await?;
    tracing::info!(collection = collection.name, id, "document deleted");
    Ok(ApiResponse::no_content())
}

async fn after_write(
    state: &AppState,
    collection: &Collection,
    doc: &Document,
    previous: Option<&Document>,
) -> Result<(), StoreError> {
    match &collection.hook {
        Some(hook) => hook.after_write(state.store.as_ref(), doc, previous).await,
        None => Ok(()),
    }
}
