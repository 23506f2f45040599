mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{acquire_db_lock, body_json, ids_of, TestApp};
use serde_json::json;

#[tokio::test]
async fn note_create_get_update_roundtrip() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    let created = app
        .create(
            "/api/notes",
            &json!({ "title": "Groceries", "body": "milk, eggs" }),
            &token,
        )
        .await?;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["color"], "#ffffff");
    assert_eq!(created["is_pinned"], false);
    assert_eq!(created["labels"], json!([]));
    assert!(created.get("deleted_at").is_none());

    let response = app.get(&format!("/api/notes/{id}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await?;
    assert_eq!(fetched["data"], created);
    assert_eq!(fetched["data"]["is_trashed"], false);
    assert!(fetched["data"]["created_at"].is_string());
    assert_eq!(fetched["data"]["title"], "Groceries");
    assert_eq!(fetched["data"]["body"], "milk, eggs");

    let response = app
        .put_json(
            &format!("/api/notes/{id}"),
            &json!({ "is_pinned": true, "color": "#ff0000" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await?;
    assert_eq!(updated["message"], "Note updated successfully");
    assert_eq!(updated["data"]["is_pinned"], true);
    assert_eq!(updated["data"]["color"], "#ff0000");
    assert_eq!(updated["data"]["title"], "Groceries");

    let response = app
        .put_json(
            &format!("/api/notes/{id}"),
            &json!({ "color": "red" }),
            Some(&token),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn trash_and_restore_are_repeatable() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    let created = app
        .create("/api/notes", &json!({ "title": "Draft" }), &token)
        .await?;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app.delete(&format!("/api/notes/{id}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["message"], "Note moved to trash");

    let trashed = body_json(app.get("/api/notes?trashed=true", Some(&token)).await?).await?;
    assert_eq!(ids_of(&trashed), vec![id.clone()]);
    let default = body_json(app.get("/api/notes", Some(&token)).await?).await?;
    assert!(ids_of(&default).is_empty());

    for _ in 0..2 {
        let response = app
            .put(&format!("/api/notes/{id}/restore"), Some(&token))
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let default = body_json(app.get("/api/notes", Some(&token)).await?).await?;
    assert_eq!(ids_of(&default), vec![id.clone()]);

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn list_filters_follow_supplied_flags() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    let mut ids = Vec::new();
    for title in ["plain", "archived", "trashed", "both"] {
        let note = app.create("/api/notes", &json!({ "title": title }), &token).await?;
        ids.push(note["id"].as_str().unwrap().to_string());
    }
    let (plain, archived, trashed, both) = (&ids[0], &ids[1], &ids[2], &ids[3]);

    for id in [archived, both] {
        let response = app
            .put_json(
                &format!("/api/notes/{id}"),
                &json!({ "is_archived": true }),
                Some(&token),
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }
    for id in [trashed, both] {
        let response = app.delete(&format!("/api/notes/{id}"), Some(&token)).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let sorted = |mut v: Vec<String>| {
        v.sort();
        v
    };

    assert_eq!(sorted_ids(&app, &token, "").await?, vec![plain.clone()]);
    assert_eq!(
        sorted_ids(&app, &token, "?trashed=true").await?,
        sorted(vec![trashed.clone(), both.clone()])
    );
    assert_eq!(
        sorted_ids(&app, &token, "?archived=true").await?,
        sorted(vec![archived.clone(), both.clone()])
    );
    assert_eq!(
        sorted_ids(&app, &token, "?archived=true&trashed=false").await?,
        vec![archived.clone()]
    );
    assert_eq!(
        sorted_ids(&app, &token, "?trashed=false").await?,
        sorted(vec![plain.clone(), archived.clone()])
    );

    let body = body_json(app.get("/api/notes?search=ARCH&archived=true", Some(&token)).await?).await?;
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(ids_of(&body), vec![archived.clone()]);

    app.cleanup().await?;
    Ok(())
}

async fn sorted_ids(app: &TestApp, token: &str, query: &str) -> Result<Vec<String>> {
    let body = body_json(app.get(&format!("/api/notes{query}"), Some(token)).await?).await?;
    let mut ids = ids_of(&body);
    ids.sort();
    Ok(ids)
}

#[tokio::test]
async fn permanent_delete_hides_the_note_everywhere() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    let created = app
        .create("/api/notes", &json!({ "title": "Old" }), &token)
        .await?;
    let id = created["id"].as_str().unwrap().to_string();
    app.delete(&format!("/api/notes/{id}"), Some(&token)).await?;

    let response = app
        .delete(&format!("/api/notes/{id}/permanent"), Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await?["message"], "Note permanently deleted");

    let response = app.get(&format!("/api/notes/{id}"), Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let trashed = body_json(app.get("/api/notes?trashed=true", Some(&token)).await?).await?;
    assert!(ids_of(&trashed).is_empty());

    for response in [
        app.put(&format!("/api/notes/{id}/restore"), Some(&token)).await?,
        app.delete(&format!("/api/notes/{id}"), Some(&token)).await?,
        app.delete(&format!("/api/notes/{id}/permanent"), Some(&token)).await?,
    ] {
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    app.cleanup().await?;
    Ok(())
}

#[tokio::test]
async fn sorting_uses_allow_listed_keys() -> Result<()> {
    let _lock = acquire_db_lock().await;
    let app = TestApp::new().await?;
    let token = app.user_token("alice").await?;

    for title in ["banana", "apple", "cherry"] {
        app.create("/api/notes", &json!({ "title": title }), &token).await?;
    }

    let titles = |body: &serde_json::Value| -> Vec<String> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["title"].as_str().unwrap().to_string())
            .collect()
    };

    let body = body_json(app.get("/api/notes?sort_by=title&sort_order=asc", Some(&token)).await?).await?;
    assert_eq!(titles(&body), ["apple", "banana", "cherry"]);

    let body = body_json(app.get("/api/notes?sort_by=title", Some(&token)).await?).await?;
    assert_eq!(titles(&body), ["cherry", "banana", "apple"]);

    let response = app
        .get("/api/notes?sort_by=title;DROP%20TABLE%20notes", Some(&token))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["meta"]["total"], 3);

    app.cleanup().await?;
    Ok(())
}
