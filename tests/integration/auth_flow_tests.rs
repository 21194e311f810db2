// ============================
// tests/integration/auth_flow_tests.rs
// ============================
//! End-to-end auth flows through the full router.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, Method, StatusCode};
use backend_lib::{
    error::AppError,
    notifications::{ChangeToken, NotificationHub},
    storage::{InMemoryUserStore, UserStore},
    AppState,
};
use pinboard_common::PrincipalId;

use crate::test_utils::*;

#[tokio::test]
async fn test_signup_then_check() {
    let (app, _state) = test_app();

    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(cookie_count(&response, "session_id"), 1);

    let set_cookie = set_cookie_header(&response, "session_id").unwrap();
    assert!(set_cookie.contains("; Path=/"));
    assert!(set_cookie.contains("; HttpOnly"));
    assert!(set_cookie.contains("; SameSite=Lax"));
    assert!(!set_cookie.contains("Secure"));
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let cookie = cookie_pair(&response, "session_id").unwrap();
    let body = body_json(response).await;
    assert_eq!(body["username"], "TestUsername");
    assert!(body["id"].as_i64().is_some());

    let response = send(&app, empty_request(Method::GET, "/auth/check", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (app, _state) = test_app();
    let cookie = signup_default(&app).await;

    let response = send(&app, empty_request(Method::POST, "/auth/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let expired = set_cookie_header(&response, "session_id").unwrap();
    assert!(expired.starts_with("session_id=;"));
    assert!(expired.contains("Expires="));

    let response = send(&app, empty_request(Method::GET, "/auth/check", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // a second logout with the dead cookie is refused by the auth gate
    let response = send(&app, empty_request(Method::POST, "/auth/logout", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_after_logout() {
    let (app, state) = test_app();
    let first = signup_default(&app).await;
    send(&app, empty_request(Method::POST, "/auth/logout", Some(&first))).await;

    let response = send(&app, json_request(Method::POST, "/auth/login", LOGIN_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(cookie_count(&response, "session_id"), 1);
    let second = cookie_pair(&response, "session_id").unwrap();
    assert_ne!(first, second);

    let response = send(&app, empty_request(Method::GET, "/auth/check", Some(&second))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(state.sessions.active_count(), 1);
}

#[tokio::test]
async fn test_login_failures() {
    let (app, state) = test_app();
    let cookie = signup_default(&app).await;
    send(&app, empty_request(Method::POST, "/auth/logout", Some(&cookie))).await;

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            r#"{"username":"TestUsername","password":"wrong"}"#,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(cookie_pair(&response, "session_id").is_none());

    let response = send(
        &app,
        json_request(
            Method::POST,
            "/auth/login",
            r#"{"username":"Ghost","password":"anything"}"#,
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(cookie_pair(&response, "session_id").is_none());
    assert_eq!(state.sessions.active_count(), 0);
}

#[tokio::test]
async fn test_duplicate_signup() {
    let (app, state) = test_app();
    signup_default(&app).await;

    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(cookie_pair(&response, "session_id").is_none());
    assert_eq!(state.sessions.active_count(), 1);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "DUP_001");
}

#[tokio::test]
async fn test_malformed_json() {
    let (app, state) = test_app();
    let garbage = r#"{"username": "TestUsername, password":}"#;

    let response = send(&app, json_request(Method::POST, "/auth/signup", garbage, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.sessions.active_count(), 0);

    let bytes = body_bytes(response).await;
    let text = String::from_utf8(bytes).unwrap();
    assert!(!text.contains("TestUsername"));
    let body: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(body["error"]["code"], "VAL_001");
}

#[tokio::test]
async fn test_anonymous_routes_forbid_authenticated_callers() {
    let (app, state) = test_app();
    let cookie = signup_default(&app).await;

    let response = send(
        &app,
        json_request(Method::POST, "/auth/login", LOGIN_BODY, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        json_request(Method::POST, "/auth/signup", SIGNUP_BODY, Some(&cookie)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(state.sessions.active_count(), 1);
}

#[tokio::test]
async fn test_check_without_cookie() {
    let (app, _state) = test_app();
    let response = send(&app, empty_request(Method::GET, "/auth/check", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTH_001");
}

#[tokio::test]
async fn test_password_length_boundary() {
    let (app, _state) = test_app();

    let seven = r#"{"username":"seven","email":"seven@example.com","password":"1234567"}"#;
    let response = send(&app, json_request(Method::POST, "/auth/signup", seven, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(cookie_pair(&response, "session_id").is_none());

    let eight = r#"{"username":"eight","email":"eight@example.com","password":"12345678"}"#;
    let response = send(&app, json_request(Method::POST, "/auth/signup", eight, None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_username_rules() {
    let (app, _state) = test_app();

    let too_long = "a".repeat(43);
    for username in ["", "bad;name", "spaced name", too_long.as_str()] {
        let body = serde_json::json!({
            "username": username,
            "email": "someone@example.com",
            "password": "thisisapassword",
        })
        .to_string();
        let response = send(&app, json_request(Method::POST, "/auth/signup", &body, None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "username {username:?}");
    }

    let body = serde_json::json!({
        "username": "a".repeat(42),
        "email": "someone@example.com",
        "password": "thisisapassword",
    })
    .to_string();
    let response = send(&app, json_request(Method::POST, "/auth/signup", &body, None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_bad_email_is_rejected() {
    let (app, _state) = test_app();
    let body = r#"{"username":"mailless","email":"not-an-email","password":"thisisapassword"}"#;
    let response = send(&app, json_request(Method::POST, "/auth/signup", body, None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_login_round_trip_ids() {
    let (app, state) = test_app();

    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    let signup_cookie = cookie_pair(&response, "session_id").unwrap();
    let registered_id = body_json(response).await["id"].as_i64().unwrap();
    send(&app, empty_request(Method::POST, "/auth/logout", Some(&signup_cookie))).await;

    let response = send(&app, json_request(Method::POST, "/auth/login", LOGIN_BODY, None)).await;
    let cookie = cookie_pair(&response, "session_id").unwrap();
    let token = cookie.trim_start_matches("session_id=");

    let session = state.auth.resolve(token).unwrap();
    assert_eq!(session.principal.id, registered_id);
}

#[tokio::test]
async fn test_concurrent_duplicate_signups() {
    let (app, state) = test_app();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None))
                .await
                .status()
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            status => assert_eq!(status, StatusCode::CONFLICT),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(state.sessions.active_count(), 1);
}

#[tokio::test]
async fn test_delete_profile() {
    let (app, state) = test_app();
    let cookie = signup_default(&app).await;

    let response = send(&app, empty_request(Method::DELETE, "/profile", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(set_cookie_header(&response, "session_id")
        .unwrap()
        .starts_with("session_id=;"));

    assert_eq!(state.sessions.active_count(), 0);
    assert!(state.users.get_by_username("TestUsername").await.is_err());

    let response = send(&app, json_request(Method::POST, "/auth/login", LOGIN_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // the name is free again
    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_health() {
    let (app, _state) = test_app();
    let response = send(&app, empty_request(Method::GET, "/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"Healthy");
}

struct FailingNotifier;

#[async_trait]
impl ChangeToken for FailingNotifier {
    async fn change_token(
        &self,
        _principal_id: PrincipalId,
        _token: Option<&str>,
    ) -> Result<(), AppError> {
        Err(AppError::Internal("notification transport unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_rebinder_failure_keeps_user_logged_in() {
    let users: Arc<dyn UserStore> = Arc::new(InMemoryUserStore::new());
    let state = AppState::with_notifier(
        users,
        test_settings(),
        Arc::new(NotificationHub::new()),
        Arc::new(FailingNotifier),
    )
    .unwrap();
    let app = backend_lib::create_router(state.clone());

    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let cookie = cookie_pair(&response, "session_id").unwrap();

    // the user exists and the session is live
    assert!(state.users.get_by_username("TestUsername").await.is_ok());
    let response = send(&app, empty_request(Method::GET, "/auth/check", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_flat_file_users_survive_restart() {
    let (app, state, temp_dir) = flat_file_app();
    signup_default(&app).await;
    drop(app);
    drop(state);

    let users = Arc::new(backend_lib::storage::FlatFileUserStore::new(temp_dir.path()).unwrap());
    let state = AppState::new(users, test_settings()).unwrap();
    let app = backend_lib::create_router(state);

    let response = send(&app, json_request(Method::POST, "/auth/login", LOGIN_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
