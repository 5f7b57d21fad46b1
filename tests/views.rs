mod common;

use anyhow::Result;
use serde_json::{json, Value};

use common::spawn_app;

#[tokio::test]
async fn overview_lists_tours_for_anonymous_visitors() -> Result<()> {
    let app = spawn_app().await?;
    app.insert_tour("The Forest Hiker", 397).await?;

    let body: Value = app.client.get(app.url("/")).send().await?.json().await?;
    assert_eq!(body["template"], "overview");
    assert_eq!(body["user"], Value::Null);
    assert_eq!(body["tours"].as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn tour_page_is_found_by_slug() -> Result<()> {
    let app = spawn_app().await?;
    app.insert_tour("The Forest Hiker", 397).await?;

    let resp = app.client.get(app.url("/tour/the-forest-hiker")).send().await?;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await?;
    assert_eq!(body["title"], "The Forest Hiker Tour");
    assert_eq!(body["tour"]["reviews"], json!([]));
    Ok(())
}

#[tokio::test]
async fn page_failures_render_the_error_template() -> Result<()> {
    let app = spawn_app().await?;

    let missing = app.client.get(app.url("/tour/no-such-tour")).send().await?;
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await?;
    assert_eq!(
        body,
        json!({ "template": "error", "title": "Something went wrong!", "msg": "There is no tour with that name." })
    );

    let account = app.client.get(app.url("/me")).send().await?;
    assert_eq!(account.status(), 401);
    let body: Value = account.json().await?;
    assert_eq!(body["template"], "error");
    Ok(())
}

#[tokio::test]
async fn pages_see_the_cookie_session() -> Result<()> {
    let app = spawn_app().await?;
    let (token, _) = app.signup("Cookie Monster", "cookie@example.com").await?;

    let body: Value = app
        .client
        .get(app.url("/me"))
        .header("cookie", format!("jwt={}", token))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["template"], "account");
    assert_eq!(body["user"]["name"], "Cookie Monster");

    let logged_out: Value = app
        .client
        .get(app.url("/login"))
        .header("cookie", "jwt=loggedout")
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(logged_out["user"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let app = spawn_app().await?;
    let body: Value = app.client.get(app.url("/health")).send().await?.json().await?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["store"], "ok");
    Ok(())
}
