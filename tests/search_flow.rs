mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, TestApp};
use serde_json::{json, Value};

fn hits(body: &Value) -> Vec<(String, String)> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|hit| {
            (
                hit["type"].as_str().unwrap().to_string(),
                hit["title"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}

#[tokio::test]
async fn search_matches_across_types_in_fixed_order() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    app.create("/api/notes", &json!({ "title": "Project Plan" }), &token)
        .await?;
    app.create(
        "/api/links",
        &json!({ "url": "https://example.com", "title": "Unrelated" }),
        &token,
    )
    .await?;
    app.create(
        "/api/files",
        &json!({
            "title": "Budget",
            "original_name": "project-budget.xlsx",
            "storage_key": "files/budget",
            "url": "https://cdn.example.com/files/budget",
        }),
        &token,
    )
    .await?;
    app.create(
        "/api/links",
        &json!({ "url": "https://proj.example.com", "title": "Tracker" }),
        &token,
    )
    .await?;

    let response = app.get("/api/search?q=proj", Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(
        hits(&body),
        vec![
            ("note".to_string(), "Project Plan".to_string()),
            ("link".to_string(), "Tracker".to_string()),
            ("file".to_string(), "Budget".to_string()),
        ]
    );
    assert_eq!(body["meta"]["query"], "proj");
    assert_eq!(body["meta"]["total"], 3);
    assert_eq!(body["data"][1]["url"], "https://proj.example.com");
    assert!(body["data"][0].get("url").is_none());

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn empty_query_is_rejected() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    for path in ["/api/search", "/api/search?q=", "/api/search?q=%20%20"] {
        let response = app.get(path, Some(&token)).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let body = body_json(response).await?;
        assert_eq!(body["error"]["message"], "search query is required");
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn archived_records_match_but_trashed_do_not() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;
    let other = app.user_token("bob").await?;

    let archived = app
        .create("/api/notes", &json!({ "title": "Recipe archive" }), &token)
        .await?;
    let trashed = app
        .create("/api/notes", &json!({ "title": "Recipe draft" }), &token)
        .await?;
    app.create("/api/notes", &json!({ "title": "Recipe of bob" }), &other)
        .await?;

    let archived_id = archived["id"].as_str().unwrap();
    let trashed_id = trashed["id"].as_str().unwrap();
    app.put_json(
        &format!("/api/notes/{archived_id}"),
        &json!({ "is_archived": true }),
        Some(&token),
    )
    .await?;
    app.delete(&format!("/api/notes/{trashed_id}"), Some(&token))
        .await?;

    let body = body_json(app.get("/api/search?q=recipe", Some(&token)).await?).await?;
    assert_eq!(
        hits(&body),
        vec![("note".to_string(), "Recipe archive".to_string())]
    );

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn wildcards_in_the_query_match_literally() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    app.create("/api/notes", &json!({ "title": "100% done" }), &token)
        .await?;
    app.create("/api/notes", &json!({ "title": "1000 items" }), &token)
        .await?;

    let body = body_json(app.get("/api/search?q=100%25", Some(&token)).await?).await?;
    assert_eq!(hits(&body), vec![("note".to_string(), "100% done".to_string())]);

    app.cleanup().await?;
    Ok(())
}
