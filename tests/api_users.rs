use axum::http::{Method, StatusCode};
use edu_testsupport::{expired_token_for, id_token_for, TestApp};
use serde_json::json;

#[tokio::test]
async fn service_endpoints_are_public() {
    let app = TestApp::spawn().await.unwrap();

    let root = app.get("/", None).await;
    assert_eq!(root.status, StatusCode::OK);
    assert_eq!(root.json()["message"], "Welcome to EduConnect API");

    let health = app.get("/health", None).await;
    assert_eq!(health.json(), json!({"status": "ok"}));

    let doc = app.get("/openapi.json", None).await;
    assert_eq!(doc.status, StatusCode::OK);
    assert!(doc.json()["paths"]["/api/v1/series"].is_object());

    let metrics = app.get("/metrics", None).await;
    assert_eq!(metrics.status, StatusCode::OK);
    assert!(metrics.text().contains("edu_http_requests_total"));
}

#[tokio::test]
async fn authentication_failures_carry_a_code() {
    let app = TestApp::spawn().await.unwrap();

    let missing = app.get("/api/me-test", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        missing.json(),
        json!({
            "success": false,
            "message": "No authentication token provided",
            "error": "unauthorized"
        })
    );

    let expired = app
        .get("/api/me-test", Some(&expired_token_for("u1", "u1@example.com")))
        .await;
    assert_eq!(expired.status, StatusCode::FORBIDDEN);
    assert_eq!(expired.json()["error"], "token_expired");

    let garbage = app.get("/api/me-test", Some("not-a-jwt")).await;
    assert_eq!(garbage.status, StatusCode::FORBIDDEN);
    assert_eq!(garbage.json()["error"], "invalid_token");

    let ok = app
        .get("/api/me-test", Some(&id_token_for("u1", "u1@example.com")))
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["status"], "authenticated");
    assert_eq!(ok.json()["user"]["user_id"], "u1");
    assert_eq!(ok.json()["user"]["email"], "u1@example.com");

    let metrics = app.get("/metrics", None).await.text();
    assert!(metrics.contains("edu_auth_failures_total"));
}

#[tokio::test]
async fn profile_is_created_on_first_visit() {
    let app = TestApp::spawn().await.unwrap();
    let token = id_token_for("u1", "u1@example.com");

    let first = app.get("/api/v1/users/profile", Some(&token)).await;
    assert_eq!(first.status, StatusCode::CREATED);
    let body = first.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "User profile created automatically");
    assert_eq!(body["data"]["userId"], "u1");
    assert_eq!(body["data"]["email"], "u1@example.com");
    assert_eq!(body["data"]["role"], "student");

    let second = app.get("/api/v1/users/profile", Some(&token)).await;
    assert_eq!(second.status, StatusCode::OK);
    assert!(second.json().get("message").is_none());
}

#[tokio::test]
async fn explicit_profile_creation() {
    let app = TestApp::spawn().await.unwrap();
    let token = id_token_for("admin", "admin@example.com");

    let missing = app
        .send_json(Method::POST, "/api/v1/users/profile", Some(&token), &json!({"name": "X"}))
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.json()["message"], "userId is required");

    let body = json!({"userId": "u2", "name": "Minh", "email": "minh@example.com"});
    let created = app
        .send_json(Method::POST, "/api/v1/users/profile", Some(&token), &body)
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["message"], "User profile created successfully");
    assert_eq!(created.json()["data"]["name"], "Minh");

    let duplicate = app
        .send_json(Method::POST, "/api/v1/users/profile", Some(&token), &body)
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.json()["message"], "User profile already exists");
}

#[tokio::test]
async fn users_may_only_edit_themselves() {
    let app = TestApp::spawn().await.unwrap();
    let me = id_token_for("u1", "u1@example.com");
    let other = id_token_for("u2", "u2@example.com");
    app.get("/api/v1/users/profile", Some(&me)).await;
    app.get("/api/v1/users/profile", Some(&other)).await;

    let update = json!({"gender": "female", "birthdate": "2000-01-01"});
    let ok = app
        .send_json(Method::PUT, "/api/v1/users/u1", Some(&me), &update)
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["message"], "User updated successfully");
    assert_eq!(ok.json()["data"]["gender"], "female");

    let forbidden = app
        .send_json(Method::PUT, "/api/v1/users/u2", Some(&me), &update)
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.json()["message"], "You can only update your own profile");

    let fetched = app.get("/api/v1/users/u2", Some(&me)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json()["data"]["userId"], "u2");

    let missing = app.get("/api/v1/users/ghost", Some(&me)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json(), json!({"success": false, "message": "User not found"}));
}

#[tokio::test]
async fn sync_prefers_token_identity() {
    let app = TestApp::spawn().await.unwrap();
    let token = id_token_for("u1", "u1@example.com");

    let synced = app
        .send_json(
            Method::POST,
            "/api/v1/users/sync",
            Some(&token),
            &json!({"name": "Body Name", "avatar": "https://cdn/me.png"}),
        )
        .await;
    assert_eq!(synced.status, StatusCode::OK);
    let body = synced.json();
    assert_eq!(body["message"], "User synced successfully");
    assert_eq!(body["data"]["name"], "User u1");
    assert_eq!(body["data"]["email"], "u1@example.com");
    assert_eq!(body["data"]["avatar"], "https://cdn/me.png");
}
