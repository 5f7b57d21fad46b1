mod common;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use common::spawn_app;

#[tokio::test]
async fn nested_reviews_update_tour_ratings() -> Result<()> {
    let app = spawn_app().await?;
    let tour_id = app.insert_tour("The Park Camper", 250).await?;
    let (alice, _) = app.signup("Alice Walker", "alice@example.com").await?;
    let (bob, _) = app.signup("Bob Rambler", "bob@example.com").await?;
    let reviews_url = app.url(&format!("/api/v1/tours/{}/reviews", tour_id));

    for (token, rating) in [(&alice, 5), (&bob, 2)] {
        let resp = app
            .client
            .post(&reviews_url)
            .bearer_auth(token)
            .json(&json!({ "review": "Worth it", "rating": rating }))
            .send()
            .await?;
        assert_eq!(resp.status(), 201);
    }

    let tour: Value = app
        .client
        .get(app.url(&format!("/api/v1/tours/{}", tour_id)))
        .send()
        .await?
        .json()
        .await?;
    let tour = &tour["data"]["data"];
    assert_eq!(tour["ratingsQuantity"].as_f64(), Some(2.0));
    assert_eq!(tour["ratingsAverage"].as_f64(), Some(3.5));

    let reviews = tour["reviews"].as_array().context("reviews not expanded")?;
    assert_eq!(reviews.len(), 2);
    assert!(reviews.iter().any(|r| r["user"]["name"] == "Alice Walker"));
    assert!(reviews.iter().all(|r| r["user"].get("email").is_none()));

    let listed: Value = app.client.get(&reviews_url).bearer_auth(&alice).send().await?.json().await?;
    assert_eq!(listed["results"], 2);
    Ok(())
}

#[tokio::test]
async fn one_review_per_user_and_tour() -> Result<()> {
    let app = spawn_app().await?;
    let tour_id = app.insert_tour("The Wine Taster", 180).await?;
    let (token, _) = app.signup("Repeat Reviewer", "repeat@example.com").await?;
    let url = app.url(&format!("/api/v1/tours/{}/reviews", tour_id));

    let first = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&json!({ "review": "Lovely", "rating": 4 }))
        .send()
        .await?;
    assert_eq!(first.status(), 201);

    let second = app
        .client
        .post(&url)
        .bearer_auth(&token)
        .json(&json!({ "review": "Still lovely", "rating": 5 }))
        .send()
        .await?;
    assert_eq!(second.status(), 400);
    let body: Value = second.json().await?;
    assert!(body["message"].as_str().unwrap().starts_with("Duplicate field value"));
    Ok(())
}

#[tokio::test]
async fn reviews_need_a_rating_in_range() -> Result<()> {
    let app = spawn_app().await?;
    let tour_id = app.insert_tour("The City Wanderer", 90).await?;
    let (token, _) = app.signup("Harsh Critic", "critic@example.com").await?;

    let resp = app
        .client
        .post(app.url("/api/v1/reviews"))
        .bearer_auth(&token)
        .json(&json!({ "review": "Off the scale", "rating": 9, "tour": tour_id }))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    Ok(())
}

#[tokio::test]
async fn only_plain_users_write_reviews() -> Result<()> {
    let app = spawn_app().await?;
    let tour_id = app.insert_tour("The Northern Lights", 1200).await?;
    let (guide, _) = app.signup_as("guide", "guide@example.com").await?;

    let resp = app
        .client
        .post(app.url(&format!("/api/v1/tours/{}/reviews", tour_id)))
        .bearer_auth(&guide)
        .json(&json!({ "review": "Biased", "rating": 5 }))
        .send()
        .await?;
    assert_eq!(resp.status(), 403);
    Ok(())
}

#[tokio::test]
async fn deleting_a_review_recomputes_ratings() -> Result<()> {
    let app = spawn_app().await?;
    let tour_id = app.insert_tour("The Island Hopper", 640).await?;
    let (token, _) = app.signup("Changed Mind", "changed@example.com").await?;

    let created: Value = app
        .client
        .post(app.url(&format!("/api/v1/tours/{}/reviews", tour_id)))
        .bearer_auth(&token)
        .json(&json!({ "review": "Meh", "rating": 1 }))
        .send()
        .await?
        .json()
        .await?;
    let review_id = created["data"]["data"]["id"].as_str().context("review id")?.to_string();

    let deleted = app
        .client
        .delete(app.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(deleted.status(), 204);

    let tour: Value = app
        .client
        .get(app.url(&format!("/api/v1/tours/{}", tour_id)))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(tour["data"]["data"]["ratingsQuantity"].as_f64(), Some(0.0));
    assert_eq!(tour["data"]["data"]["ratingsAverage"].as_f64(), Some(4.5));
    Ok(())
}

#[tokio::test]
async fn moving_a_review_updates_both_tours() -> Result<()> {
    let app = spawn_app().await?;
    let first_tour = app.insert_tour("The Desert Crossing", 700).await?;
    let second_tour = app.insert_tour("The River Paddler", 300).await?;
    let (token, _) = app.signup("Wrong Tour Reviewer", "wrongtour@example.com").await?;

    let created: Value = app
        .client
        .post(app.url(&format!("/api/v1/tours/{}/reviews", first_tour)))
        .bearer_auth(&token)
        .json(&json!({ "review": "Filed under the wrong tour", "rating": 3 }))
        .send()
        .await?
        .json()
        .await?;
    let review_id = created["data"]["data"]["id"].as_str().context("review id")?.to_string();

    let moved = app
        .client
        .patch(app.url(&format!("/api/v1/reviews/{}", review_id)))
        .bearer_auth(&token)
        .json(&json!({ "tour": second_tour }))
        .send()
        .await?;
    assert_eq!(moved.status(), 200);

    for (tour_id, quantity, average) in [(&first_tour, 0.0, 4.5), (&second_tour, 1.0, 3.0)] {
        let tour: Value = app
            .client
            .get(app.url(&format!("/api/v1/tours/{}", tour_id)))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(tour["data"]["data"]["ratingsQuantity"].as_f64(), Some(quantity));
        assert_eq!(tour["data"]["data"]["ratingsAverage"].as_f64(), Some(average));
    }
    Ok(())
}
