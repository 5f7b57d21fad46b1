//! Sample data for local development (`--seed`).

use serde_json::json;

use crate::database::models::tour;
use crate::database::{document, Store, StoreError};

/// Inserts a handful of tours. Returns how many were created.
pub async fn sample_tours(store: &dyn Store) -> Result<usize, StoreError> {
    let tours = [
        json!({
            "name": "The Forest Hiker",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startDates": ["2027-04-25T09:00:00Z", "2027-07-20T09:00:00Z"]
        }),
        json!({
            "name": "The Sea Explorer",
            "duration": 7,
            "maxGroupSize": 15,
            "difficulty": "medium",
            "price": 497,
            "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
            "imageCover": "tour-2-cover.jpg",
            "startDates": ["2027-06-19T09:00:00Z"]
        }),
        json!({
            "name": "The Snow Adventurer",
            "duration": 4,
            "maxGroupSize": 10,
            "difficulty": "difficult",
            "price": 997,
            "summary": "Exciting adventure in the snow with snowboarding and skiing",
            "imageCover": "tour-3-cover.jpg",
            "startDates": ["2027-01-05T10:00:00Z"]
        }),
    ];

    let mut created = 0;
    for tour_doc in tours {
        match store.create(tour::collection(), document(tour_doc)).await {
            Ok(_) => created += 1,
            Err(StoreError::Duplicate { field, value }) => {
                tracing::debug!(%field, %value, "sample tour already present");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}
