use futures::future::try_join_all;
use serde_json::Value;

use crate::config::QueryConfig;
use crate::database::models::{self, Collection, Expansion};
use crate::database::store::{Document, Store, StoreError};
use crate::filter::{Condition, Projection, QuerySpecBuilder};

/// Applies the collection's own expansions plus `extra` to every document.
pub async fn expand(
    store: &dyn Store,
    collection: &Collection,
    docs: &mut [Document],
    extra: &[Expansion],
) -> Result<(), StoreError> {
    for expansion in collection.expansions.iter().chain(extra) {
        match expansion {
            Expansion::Reference { .. } => expand_reference(store, expansion, docs).await?,
            Expansion::Related { path, collection: related, foreign_field } => {
                let Some(related) = models::collection(related) else { continue };
                for doc in docs.iter_mut() {
                    let Some(id) = doc.get("id").and_then(Value::as_str).map(str::to_string) else { continue };
                    let children = related_documents(store, related, foreign_field, &id).await?;
                    doc.insert(path.to_string(), Value::Array(children));
                }
            }
        }
    }
    Ok(())
}

/// Replaces stored ids at the expansion path with the referenced documents.
async fn expand_reference(store: &dyn Store, expansion: &Expansion, docs: &mut [Document]) -> Result<(), StoreError> {
    let Expansion::Reference { path, collection, fields } = expansion else { return Ok(()) };
    let Some(target) = models::collection(collection) else { return Ok(()) };
    let projection = Projection::Include(fields.iter().map(|f| f.to_string()).collect());

    for doc in docs.iter_mut() {
        let Some(value) = doc.get(*path).cloned() else { continue };
        let expanded = match value {
            Value::String(id) => match store.find_by_id(target, &id).await? {
                Some(found) => target.present(found, Some(&projection)),
                None => Value::Null,
            },
            Value::Array(ids) => {
                let lookups = ids
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|id| store.find_by_id(target, id));
                let found = try_join_all(lookups).await?;
                Value::Array(
                    found
                        .into_iter()
                        .flatten()
                        .map(|d| target.present(d, Some(&projection)))
                        .collect(),
                )
            }
            other => other,
        };
        doc.insert(path.to_string(), expanded);
    }
    Ok(())
}

/// Every visible document of `related` pointing at `id`, with its reference expansions applied.
async fn related_documents(
    store: &dyn Store,
    related: &Collection,
    foreign_field: &str,
    id: &str,
) -> Result<Vec<Value>, StoreError> {
    let unbounded = QueryConfig { default_limit: u32::MAX, max_limit: None };
    let spec = QuerySpecBuilder::new(related.base_filter.clone(), &unbounded)
        .with_condition(Condition::eq(foreign_field, id))
        .build();

    let mut children = store.find(related, &spec).await?;
    for expansion in related.expansions.iter().filter(|e| matches!(e, Expansion::Reference { .. })) {
        expand_reference(store, expansion, &mut children).await?;
    }
    Ok(children.into_iter().map(|child| related.present(child, None)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{review, tour, user};
    use crate::database::{document, document_id, MemoryStore};
    use serde_json::json;

    async fn seed(store: &MemoryStore) -> (String, String) {
        let guide = store
            .create(
                user::collection(),
                document(json!({ "name": "Guide", "email": "guide@example.com", "password": "hashed-password", "role": "guide" })),
            )
            .await
            .unwrap();
        let guide_id = document_id(&guide).unwrap().to_string();

        let tour = store
            .create(
                tour::collection(),
                document(json!({
                    "name": "The Forest Hiker",
                    "duration": 5,
                    "maxGroupSize": 10,
                    "difficulty": "easy",
                    "price": 397,
                    "summary": "Hike",
                    "imageCover": "cover.jpg",
                    "guides": [guide_id],
                })),
            )
            .await
            .unwrap();
        (guide_id, document_id(&tour).unwrap().to_string())
    }

    #[tokio::test]
    async fn guides_are_replaced_by_user_summaries() {
        let store = MemoryStore::new();
        let (guide_id, tour_id) = seed(&store).await;

        let mut docs = vec![store.find_by_id(tour::collection(), &tour_id).await.unwrap().unwrap()];
        expand(&store, tour::collection(), &mut docs, &[]).await.unwrap();

        let guides = docs[0]["guides"].as_array().unwrap();
        assert_eq!(guides.len(), 1);
        assert_eq!(guides[0]["id"], json!(guide_id));
        assert_eq!(guides[0]["role"], json!("guide"));
        assert!(guides[0].get("password").is_none());
    }

    #[tokio::test]
    async fn related_reviews_carry_their_author() {
        let store = MemoryStore::new();
        let (guide_id, tour_id) = seed(&store).await;
        store
            .create(
                review::collection(),
                document(json!({ "review": "Lovely", "rating": 5, "tour": tour_id, "user": guide_id })),
            )
            .await
            .unwrap();

        let mut docs = vec![store.find_by_id(tour::collection(), &tour_id).await.unwrap().unwrap()];
        expand(&store, tour::collection(), &mut docs, &[tour::reviews_expansion()]).await.unwrap();

        let reviews = docs[0]["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0]["user"]["name"], json!("Guide"));
        assert!(reviews[0]["user"].get("email").is_none());
    }
}
