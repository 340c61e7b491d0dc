use axum::http::{Method, StatusCode};
use edu_media::MediaKind;
use edu_notify::new_lesson_subject;
use edu_testsupport::{id_token_for, FakeMediaStore, FilePart, TestApp};
use serde_json::{json, Value};

const OWNER: &str = "instructor-1";

fn owner_token() -> String {
    id_token_for(OWNER, "instructor@example.com")
}

async fn new_serie(app: &TestApp) -> Value {
    app.send_json(
        Method::POST,
        "/api/v1/series",
        Some(&owner_token()),
        &json!({"serie_title": "Guitar", "isPublish": true}),
    )
    .await
    .json()
}

async fn lesson_with_media(app: &TestApp, serie_id: &str, title: &str) -> Value {
    let response = app
        .send_multipart(
            Method::POST,
            &format!("/api/v1/series/{serie_id}/lessons"),
            Some(&owner_token()),
            &[("lesson_title", title), ("lesson_content", "Chords")],
            &[
                FilePart {
                    field: "lesson_video",
                    file_name: "intro.mp4",
                    content_type: "video/mp4",
                    bytes: b"fake video",
                },
                FilePart {
                    field: "lesson_documents",
                    file_name: "tabs.pdf",
                    content_type: "application/pdf",
                    bytes: b"%PDF-1.4",
                },
                FilePart {
                    field: "lesson_documents",
                    file_name: "notes.pdf",
                    content_type: "application/pdf",
                    bytes: b"%PDF-1.4",
                },
            ],
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());
    response.json()
}

#[tokio::test]
async fn lesson_creation_uploads_media_and_announces() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let serie_id = serie["_id"].as_str().unwrap();

    let lesson = lesson_with_media(&app, serie_id, "First chords").await;
    assert_eq!(lesson["lesson_title"], "First chords");
    assert_eq!(lesson["lesson_serie"], serie_id);
    assert_eq!(
        lesson["lesson_video"],
        FakeMediaStore::url_for(MediaKind::Video, OWNER, "intro.mp4")
    );
    assert_eq!(
        lesson["lesson_documents"],
        json!([
            FakeMediaStore::url_for(MediaKind::Document, OWNER, "tabs.pdf"),
            FakeMediaStore::url_for(MediaKind::Document, OWNER, "notes.pdf"),
        ])
    );

    let fetched = app.get(&format!("/api/v1/series/{serie_id}"), None).await.json();
    assert_eq!(fetched["serie_lessons"], json!([lesson["_id"].clone()]));

    let publications = app
        .notifier
        .publications(serie["serie_sns"].as_str().unwrap());
    assert_eq!(publications.len(), 1);
    assert_eq!(publications[0].subject, new_lesson_subject("Guitar"));

    let metrics = app.get("/metrics", None).await.text();
    assert!(metrics.contains("edu_lessons_created_total 1"));
}

#[tokio::test]
async fn failed_video_upload_still_creates_the_lesson() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    app.media.fail_uploads(true);

    let lesson = lesson_with_media(&app, serie["_id"].as_str().unwrap(), "No video").await;
    assert_eq!(lesson["lesson_video"], "");
    assert_eq!(lesson["lesson_documents"], json!([]));
}

#[tokio::test]
async fn lesson_creation_is_guarded() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let uri = format!("/api/v1/series/{}/lessons", serie["_id"].as_str().unwrap());

    let untitled = app
        .send_json(Method::POST, &uri, Some(&owner_token()), &json!({"lesson_content": "x"}))
        .await;
    assert_eq!(untitled.status, StatusCode::BAD_REQUEST);
    assert_eq!(untitled.json()["message"], "lesson_title is required");

    let stranger = id_token_for("someone", "someone@example.com");
    let denied = app
        .send_json(Method::POST, &uri, Some(&stranger), &json!({"lesson_title": "x"}))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let missing = app
        .send_json(
            Method::POST,
            "/api/v1/series/nope/lessons",
            Some(&owner_token()),
            &json!({"lesson_title": "x"}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lesson_reads_are_cached_with_etags() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let serie_id = serie["_id"].as_str().unwrap();
    let token = owner_token();
    let lesson = lesson_with_media(&app, serie_id, "One").await;
    let list_uri = format!("/api/v1/series/{serie_id}/lessons");

    let anonymous = app.get(&list_uri, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let first = app.get(&list_uri, Some(&token)).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.header("cache-control"), Some("private, max-age=300"));
    assert_eq!(first.json().as_array().unwrap().len(), 1);
    let etag = first.header("etag").unwrap().to_string();

    let unchanged = app.get_if_none_match(&list_uri, &token, &etag).await;
    assert_eq!(unchanged.status, StatusCode::NOT_MODIFIED);
    assert!(unchanged.body.is_empty());
    assert_eq!(unchanged.header("etag"), Some(etag.as_str()));

    lesson_with_media(&app, serie_id, "Two").await;
    let changed = app.get_if_none_match(&list_uri, &token, &etag).await;
    assert_eq!(changed.status, StatusCode::OK);
    assert_ne!(changed.header("etag"), Some(etag.as_str()));
    let body = changed.json();
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["lesson_title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["One", "Two"]);

    let single_uri = format!("/api/v1/series/{serie_id}/lessons/{}", lesson["_id"].as_str().unwrap());
    let single = app.get(&single_uri, Some(&token)).await;
    assert_eq!(single.status, StatusCode::OK);
    assert_eq!(single.json()["lesson_title"], "One");

    let unknown = app
        .get(&format!("/api/v1/series/{serie_id}/lessons/nope"), Some(&token))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json()["message"], "Lesson not found");

    let empty = app.get("/api/v1/series/nope/lessons", Some(&token)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.json(), json!([]));
}

#[tokio::test]
async fn lesson_update_replaces_media_and_text() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let serie_id = serie["_id"].as_str().unwrap();
    let lesson = lesson_with_media(&app, serie_id, "Draft title").await;
    let uri = format!("/api/v1/series/{serie_id}/lessons/{}", lesson["_id"].as_str().unwrap());
    let old_video = lesson["lesson_video"].as_str().unwrap().to_string();

    let updated = app
        .send_multipart(
            Method::PATCH,
            &uri,
            Some(&owner_token()),
            &[("lesson_title", "Final title")],
            &[FilePart {
                field: "lesson_video",
                file_name: "take2.mp4",
                content_type: "video/mp4",
                bytes: b"better video",
            }],
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.text());
    let updated = updated.json();
    assert_eq!(updated["lesson_title"], "Final title");
    assert_eq!(updated["lesson_content"], "Chords");
    assert_eq!(
        updated["lesson_video"],
        FakeMediaStore::url_for(MediaKind::Video, OWNER, "take2.mp4")
    );
    assert_eq!(updated["lesson_documents"], lesson["lesson_documents"]);
    assert!(app.media.deleted().contains(&old_video));

    let unknown = app
        .send_json(
            Method::PATCH,
            &format!("/api/v1/series/{serie_id}/lessons/nope"),
            Some(&owner_token()),
            &json!({"lesson_title": "x"}),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.json()["message"], "Lesson not found");
}

#[tokio::test]
async fn documents_can_be_removed_one_by_one() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let serie_id = serie["_id"].as_str().unwrap();
    let lesson = lesson_with_media(&app, serie_id, "Docs").await;
    let lesson_uri = format!("/api/v1/series/{serie_id}/lessons/{}", lesson["_id"].as_str().unwrap());
    let uri = format!("{lesson_uri}/documents");
    let doc = lesson["lesson_documents"][0].as_str().unwrap().to_string();

    let removed = app
        .send_json(Method::DELETE, &uri, Some(&owner_token()), &json!({"docUrl": doc}))
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(
        removed.json(),
        json!({"success": true, "message": "Document deleted successfully"})
    );
    assert!(app.media.deleted().contains(&doc));

    let again = app
        .send_json(Method::DELETE, &uri, Some(&owner_token()), &json!({"docUrl": doc}))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.json()["message"], "Document not found in lesson");

    let missing = app
        .send_json(Method::DELETE, &uri, Some(&owner_token()), &json!({}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["message"], "docUrl is required");

    let remaining = app.get(&lesson_uri, Some(&owner_token())).await.json();
    assert_eq!(
        remaining["lesson_documents"],
        json!([lesson["lesson_documents"][1].clone()])
    );
}

#[tokio::test]
async fn deleting_a_lesson_cleans_up_media() {
    let app = TestApp::spawn().await.unwrap();
    let serie = new_serie(&app).await;
    let serie_id = serie["_id"].as_str().unwrap();
    let lesson = lesson_with_media(&app, serie_id, "Temporary").await;
    let uri = format!("/api/v1/series/{serie_id}/lessons/{}", lesson["_id"].as_str().unwrap());

    let stranger = id_token_for("someone", "someone@example.com");
    let denied = app.send_empty(Method::DELETE, &uri, Some(&stranger)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let deleted = app.send_empty(Method::DELETE, &uri, Some(&owner_token())).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(
        deleted.json(),
        json!({"success": true, "message": "Lesson deleted successfully"})
    );

    let deleted_media = app.media.deleted();
    assert!(deleted_media.contains(&lesson["lesson_video"].as_str().unwrap().to_string()));
    assert_eq!(deleted_media.len(), 3);

    let gone = app.get(&uri, Some(&owner_token())).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let serie = app.get(&format!("/api/v1/series/{serie_id}"), None).await.json();
    assert_eq!(serie["serie_lessons"], json!([]));

    let again = app.send_empty(Method::DELETE, &uri, Some(&owner_token())).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
