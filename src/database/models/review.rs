use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

use super::schema::{now_value, FieldRule, FieldType, Schema};
use super::{Collection, Expansion, WriteHook};
use crate::config::QueryConfig;
use crate::database::store::{document, Document, Store, StoreError};
use crate::filter::{Condition, QuerySpecBuilder};

pub const NAME: &str = "reviews";

static REVIEWS: Lazy<Collection> = Lazy::new(|| {
    let schema = Schema::new(vec![
        FieldRule::string("review").required("Review cannot be empty"),
        FieldRule::number("rating").min(1.0, None).max(5.0, None),
        FieldRule::timestamp("createdAt").default_value(now_value),
        FieldRule::new("tour", FieldType::Reference(super::tour::NAME)).required("Review must belong to a tour."),
        FieldRule::new("user", FieldType::Reference(super::user::NAME)).required("Review must belong to a user."),
    ]);

    let mut reviews = Collection::new(NAME, schema);
    reviews.unique = &[&["tour", "user"]];
    reviews.expansions = vec![Expansion::Reference {
        path: "user",
        collection: super::user::NAME,
        fields: &["name", "photo"],
    }];
    reviews.hook = Some(Arc::new(TourRatings));
    reviews
});

pub fn collection() -> &'static Collection {
    &REVIEWS
}

/// Keeps `ratingsQuantity` / `ratingsAverage` of the reviewed tour in step with its reviews.
pub struct TourRatings;

const DEFAULT_AVERAGE: f64 = 4.5;

#[async_trait]
impl WriteHook for TourRatings {
    async fn after_write(
        &self,
        store: &dyn Store,
        doc: &Document,
        previous: Option<&Document>,
    ) -> Result<(), StoreError> {
        let current = doc.get("tour").and_then(Value::as_str);
        let moved_from = previous
            .and_then(|prev| prev.get("tour"))
            .and_then(Value::as_str)
            .filter(|prev| Some(*prev) != current);

        for tour_id in current.into_iter().chain(moved_from) {
            recalculate(store, tour_id).await?;
        }
        Ok(())
    }
}

async fn recalculate(store: &dyn Store, tour_id: &str) -> Result<(), StoreError> {
    let query = QueryConfig { default_limit: u32::MAX, max_limit: None };
    let spec = QuerySpecBuilder::new(collection().base_filter.clone(), &query)
        .with_condition(Condition::eq("tour", tour_id))
        .build();
    let reviews = store.find(collection(), &spec).await?;

    let ratings: Vec<f64> = reviews.iter().filter_map(|r| r.get("rating").and_then(Value::as_f64)).collect();
    let (quantity, average) = if ratings.is_empty() {
        (0, DEFAULT_AVERAGE)
    } else {
        (ratings.len(), ratings.iter().sum::<f64>() / ratings.len() as f64)
    };

    tracing::debug!(tour = tour_id, quantity, average, "recalculated tour ratings");

    store
        .update_by_id(
            super::tour::collection(),
            tour_id,
            document(json!({ "ratingsQuantity": quantity, "ratingsAverage": average })),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn review_needs_tour_and_user() {
        let err = collection().prepare_create(document(json!({ "review": "Great!" }))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed: Review must belong to a tour.. Review must belong to a user."
        );
    }

    #[test]
    fn pair_of_tour_and_user_is_unique() {
        let tour = Uuid::new_v4().to_string();
        let user = Uuid::new_v4().to_string();
        let first = collection()
            .prepare_create(document(json!({ "review": "Great!", "rating": 5, "tour": tour, "user": user })))
            .unwrap();
        let second = collection()
            .prepare_create(document(json!({ "review": "Again", "rating": 4, "tour": tour, "user": user })))
            .unwrap();

        let existing = [first];
        match collection().find_duplicate(&second, existing.iter()) {
            Some(StoreError::Duplicate { field, .. }) => assert_eq!(field, "tour, user"),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn moving_a_review_recalculates_both_tours() {
        let store = crate::database::MemoryStore::new();
        let mut tour_ids = Vec::new();
        for name in ["The Forest Hiker", "The Sea Explorer"] {
            let tour = store
                .create(
                    super::super::tour::collection(),
                    document(json!({
                        "name": name,
                        "duration": 5,
                        "maxGroupSize": 10,
                        "difficulty": "easy",
                        "price": 100,
                        "summary": "A day out",
                        "imageCover": "cover.jpg",
                    })),
                )
                .await
                .unwrap();
            tour_ids.push(tour["id"].as_str().unwrap().to_string());
        }
        let (from, to) = (&tour_ids[0], &tour_ids[1]);

        let user = Uuid::new_v4().to_string();
        let review = store
            .create(
                collection(),
                document(json!({ "review": "Great", "rating": 2, "tour": from, "user": user })),
            )
            .await
            .unwrap();
        TourRatings.after_write(&store, &review, None).await.unwrap();

        let id = review["id"].as_str().unwrap();
        let moved = store
            .update_by_id(collection(), id, document(json!({ "tour": to })))
            .await
            .unwrap()
            .unwrap();
        TourRatings.after_write(&store, &moved, Some(&review)).await.unwrap();

        let tours = super::super::tour::collection();
        let old = store.find_by_id(tours, from).await.unwrap().unwrap();
        let new = store.find_by_id(tours, to).await.unwrap().unwrap();
        assert_eq!(old["ratingsQuantity"].as_f64(), Some(0.0));
        assert_eq!(old["ratingsAverage"].as_f64(), Some(4.5));
        assert_eq!(new["ratingsQuantity"].as_f64(), Some(1.0));
        assert_eq!(new["ratingsAverage"].as_f64(), Some(2.0));
    }

    #[test]
    fn rejects_malformed_references() {
        let err = collection()
            .prepare_create(document(json!({ "review": "Nice", "tour": "not-an-id", "user": Uuid::new_v4().to_string() })))
            .unwrap_err();
        assert!(err.to_string().contains("Cast to ObjectId failed for value \"not-an-id\""));
    }
}
