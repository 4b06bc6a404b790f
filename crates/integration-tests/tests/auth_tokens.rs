//! Registration, login, logout, and token resolution through the router.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use pizza_integration_tests::TestApp;

#[tokio::test]
async fn test_registered_user_is_exactly_a_diner() {
    let app = TestApp::spawn().await;
    let (user, token) = app.register("Pat", "pat@jwt.com", "a").await;

    assert_eq!(user["roles"], json!([{ "role": "diner" }]));
    assert!(user.get("password").is_none());

    let me = app.get("/user/me", Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["id"], user["id"]);
    assert_eq!(me.body["roles"], json!([{ "role": "diner" }]));
}

#[tokio::test]
async fn test_register_requires_all_fields() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/auth", None, json!({ "name": "Pat", "email": "pat@jwt.com" }))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        "name, email, and password are required"
    );
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::spawn().await;
    app.register("Pat", "pat@jwt.com", "a").await;

    let response = app
        .post(
            "/auth",
            None,
            json!({ "name": "Other Pat", "email": "PAT@jwt.com", "password": "b" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::spawn().await;
    let response = app
        .request(
            axum::http::Method::POST,
            "/auth",
            None,
            Some(serde_json::Value::String("not an object".into())),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["message"].is_string());
}

#[tokio::test]
async fn test_login_issues_independent_tokens() {
    let app = TestApp::spawn().await;
    let (_, first) = app.register("Pat", "pat@jwt.com", "secret").await;
    let (_, second) = app.login("pat@jwt.com", "secret").await;
    assert_ne!(first, second);

    // Logging out one session leaves the other intact
    let logout = app.delete("/auth", Some(&first)).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(app.get("/user/me", Some(&first)).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/user/me", Some(&second)).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unknown_user() {
    let app = TestApp::spawn().await;
    app.register("Pat", "pat@jwt.com", "secret").await;

    for (email, password) in [("pat@jwt.com", "wrong"), ("nobody@jwt.com", "secret")] {
        let response = app
            .put("/auth", None, json!({ "email": email, "password": password }))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body["message"], "unknown user");
    }

    let snapshot = app.telemetry.metrics().snapshot();
    assert_eq!(snapshot.auth_failure, 2);
    assert_eq!(snapshot.auth_success, 1);
}

#[tokio::test]
async fn test_revoked_token_never_resolves_again() {
    let app = TestApp::spawn().await;
    let (_, token) = app.register("Pat", "pat@jwt.com", "a").await;

    let logout = app.delete("/auth", Some(&token)).await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(logout.body, json!({ "message": "logout successful" }));

    for _ in 0..2 {
        let me = app.get("/user/me", Some(&token)).await;
        assert_eq!(me.status, StatusCode::UNAUTHORIZED);
        assert_eq!(me.body["message"], "unauthorized");
    }
    assert_eq!(app.delete("/auth", Some(&token)).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_or_garbage_token_is_unauthorized() {
    let app = TestApp::spawn().await;

    assert_eq!(app.get("/user/me", None).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/user/me", Some("not-a-real-token")).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.get("/order", None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_can_update_self_but_not_others() {
    let app = TestApp::spawn().await;
    let (pat, pat_token) = app.register("Pat", "pat@jwt.com", "a").await;
    let (sam, _) = app.register("Sam", "sam@jwt.com", "b").await;

    let updated = app
        .put(
            &format!("/auth/{}", pat["id"]),
            Some(&pat_token),
            json!({ "email": "pat2@jwt.com", "password": "new" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["email"], "pat2@jwt.com");

    // New credentials work, old ones don't
    app.login("pat2@jwt.com", "new").await;
    let old = app
        .put("/auth", None, json!({ "email": "pat@jwt.com", "password": "a" }))
        .await;
    assert_eq!(old.status, StatusCode::NOT_FOUND);

    let forbidden = app
        .put(
            &format!("/auth/{}", sam["id"]),
            Some(&pat_token),
            json!({ "name": "Hacked" }),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["message"], "unauthorized");
}

#[tokio::test]
async fn test_admin_can_update_any_user() {
    let app = TestApp::spawn().await;
    let (_, admin_token) = app.admin("admin@jwt.com").await;
    let (pat, _) = app.register("Pat", "pat@jwt.com", "a").await;

    let updated = app
        .put(
            &format!("/auth/{}", pat["id"]),
            Some(&admin_token),
            json!({ "name": "Patricia" }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["name"], "Patricia");
    assert_eq!(updated.body["email"], "pat@jwt.com");
}

#[tokio::test]
async fn test_update_to_taken_email_conflicts() {
    let app = TestApp::spawn().await;
    let (pat, pat_token) = app.register("Pat", "pat@jwt.com", "a").await;
    app.register("Sam", "sam@jwt.com", "b").await;

    let response = app
        .put(
            &format!("/auth/{}", pat["id"]),
            Some(&pat_token),
            json!({ "email": "sam@jwt.com" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}
