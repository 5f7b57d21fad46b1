use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::database::models::Collection;
use crate::database::query::{matches, sort_documents, typed_conditions};
use crate::database::store::{document_id, Document, Store, StoreError};
use crate::filter::{Condition, QuerySpec};

/// Process-local store. Documents are kept per collection in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn visible(&self, collection: &Collection, conditions: &[Condition]) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections
            .get(collection.name)
            .map(|docs| docs.iter().filter(|doc| matches(doc, conditions)).cloned().collect())
            .unwrap_or_default()
    }

    fn base_with_id(collection: &Collection, id: &str) -> Result<Vec<Condition>, StoreError> {
        let mut conditions = typed_conditions(collection, &collection.base_filter)?;
        conditions.extend(typed_conditions(collection, &[Condition::eq("id", id)])?);
        Ok(conditions)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, collection: &Collection, spec: &QuerySpec) -> Result<Vec<Document>, StoreError> {
        let started = Instant::now();
        let conditions = typed_conditions(collection, spec.conditions())?;

        let mut docs = self.visible(collection, &conditions).await;
        sort_documents(&mut docs, &spec.sort);

        let skip = usize::try_from(spec.pagination.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(spec.pagination.limit).unwrap_or(usize::MAX);
        let page: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

        tracing::debug!(
            collection = collection.name,
            returned = page.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "memory find"
        );
        Ok(page)
    }

    async fn find_one(&self, collection: &Collection, conditions: &[Condition]) -> Result<Option<Document>, StoreError> {
        let conditions = typed_conditions(collection, collection.base_filter.iter().chain(conditions))?;
        Ok(self.visible(collection, &conditions).await.into_iter().next())
    }

    async fn find_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let conditions = Self::base_with_id(collection, id)?;
        Ok(self.visible(collection, &conditions).await.into_iter().next())
    }

    async fn create(&self, collection: &Collection, attrs: Document) -> Result<Document, StoreError> {
        let doc = collection.prepare_create(attrs)?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        if let Some(duplicate) = collection.find_duplicate(&doc, docs.iter()) {
            return Err(duplicate);
        }
        docs.push(doc.clone());

        tracing::debug!(collection = collection.name, id = document_id(&doc), "memory create");
        Ok(doc)
    }

    async fn update_by_id(&self, collection: &Collection, id: &str, patch: Document) -> Result<Option<Document>, StoreError> {
        let conditions = Self::base_with_id(collection, id)?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        let Some(index) = docs.iter().position(|doc| matches(doc, &conditions)) else {
            return Ok(None);
        };

        let mut updated = collection.prepare_update(&docs[index], patch)?;
        if let Some(duplicate) = collection.find_duplicate(&updated, docs.iter()) {
            return Err(duplicate);
        }
        let version = updated.get("__v").and_then(Value::as_i64).unwrap_or(0);
        updated.insert("__v".to_string(), Value::from(version + 1));
        docs[index] = updated.clone();

        tracing::debug!(collection = collection.name, id, "memory update");
        Ok(Some(updated))
    }

    async fn delete_by_id(&self, collection: &Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let conditions = Self::base_with_id(collection, id)?;

        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.name).or_default();
        let index = docs.iter().position(|doc| matches(doc, &conditions));
        let removed = index.map(|index| docs.remove(index));

        tracing::debug!(collection = collection.name, id, found = removed.is_some(), "memory delete");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueryConfig;
    use crate::database::models::{tour, user};
    use crate::database::store::document;
    use crate::filter::{QueryParams, QuerySpecBuilder};
    use serde_json::json;

    fn tour_attrs(name: &str, price: i64) -> Document {
        document(json!({
            "name": name,
            "duration": 5,
            "maxGroupSize": 10,
            "difficulty": "easy",
            "price": price,
            "summary": "A summary",
            "imageCover": "cover.jpg",
        }))
    }

    fn list_spec(query: &str) -> QuerySpec {
        let params = QueryParams::parse(query);
        let config = QueryConfig { default_limit: 100, max_limit: None };
        QuerySpecBuilder::new(tour::collection().base_filter.clone(), &config)
            .filter(&params)
            .sort(&params)
            .limit_fields(&params)
            .paginate(&params)
            .build()
    }

    #[tokio::test]
    async fn sorted_page_of_prices() {
        let store = MemoryStore::new();
        for (i, price) in [10, 30, 20, 50, 40].into_iter().enumerate() {
            store.create(tour::collection(), tour_attrs(&format!("Tour number {i}"), price)).await.unwrap();
        }

        let docs = store.find(tour::collection(), &list_spec("sort=-price&limit=2&page=1")).await.unwrap();
        let prices: Vec<i64> = docs.iter().map(|d| d["price"].as_i64().unwrap()).collect();
        assert_eq!(prices, vec![50, 40]);
    }

    #[tokio::test]
    async fn secret_tours_stay_hidden() {
        let store = MemoryStore::new();
        let mut secret = tour_attrs("The Secret Tour", 10);
        secret.insert("secretTour".into(), json!(true));
        let secret = store.create(tour::collection(), secret).await.unwrap();
        store.create(tour::collection(), tour_attrs("The Public Tour", 20)).await.unwrap();

        let docs = store.find(tour::collection(), &list_spec("secretTour=true")).await.unwrap();
        assert!(docs.is_empty());

        let id = document_id(&secret).unwrap();
        assert!(store.find_by_id(tour::collection(), id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let store = MemoryStore::new();
        store.create(tour::collection(), tour_attrs("The Forest Hiker", 10)).await.unwrap();
        let err = store.create(tour::collection(), tour_attrs("The Forest Hiker", 20)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { ref value, .. } if value == "The Forest Hiker"));
    }

    #[tokio::test]
    async fn update_revalidates_and_bumps_version() {
        let store = MemoryStore::new();
        let created = store.create(tour::collection(), tour_attrs("The Forest Hiker", 10)).await.unwrap();
        let id = document_id(&created).unwrap().to_string();

        let updated = store
            .update_by_id(tour::collection(), &id, document(json!({ "price": "25" })))
            .await
            .unwrap()
            .expect("tour exists");
        assert_eq!(updated["price"], json!(25));
        assert_eq!(updated["__v"], json!(1));

        let err = store
            .update_by_id(tour::collection(), &id, document(json!({ "difficulty": "extreme" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_twice_finds_nothing_the_second_time() {
        let store = MemoryStore::new();
        let created = store.create(tour::collection(), tour_attrs("The Forest Hiker", 10)).await.unwrap();
        let id = document_id(&created).unwrap().to_string();

        assert!(store.delete_by_id(tour::collection(), &id).await.unwrap().is_some());
        assert!(store.delete_by_id(tour::collection(), &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_id_is_a_cast_failure() {
        let store = MemoryStore::new();
        let err = store.find_by_id(tour::collection(), "123").await.unwrap_err();
        assert!(matches!(err, StoreError::Cast { ref field, .. } if field == "id"));
    }

    #[tokio::test]
    async fn inactive_users_are_invisible() {
        let store = MemoryStore::new();
        let attrs = document(json!({ "name": "Gone", "email": "gone@example.com", "password": "pass1234", "active": false }));
        let created = store.create(user::collection(), attrs).await.unwrap();
        let found = store
            .find_one(user::collection(), &[Condition::eq("email", "gone@example.com")])
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(store.find_by_id(user::collection(), document_id(&created).unwrap()).await.unwrap().is_none());
    }
}
