//! Auth flows with the CSRF gate switched on.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use backend_lib::storage::UserStore;

use crate::test_utils::*;

const CSRF_HEADER: &str = "x-csrf-token";

fn with_csrf(method: Method, uri: &str, body: &str, cookie: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("cookie", cookie)
        .header(CSRF_HEADER, token)
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Fetch an anonymous token and its cookie pair from a safe request
async fn anonymous_token(app: &axum::Router) -> (String, String) {
    let response = send(app, empty_request(Method::GET, "/health", None)).await;
    let token = response.headers()[CSRF_HEADER].to_str().unwrap().to_string();
    let cookie = cookie_pair(&response, "csrf_token").unwrap();
    (token, cookie)
}

#[tokio::test]
async fn test_signup_without_token_is_forbidden() {
    let (app, state) = test_app_with(csrf_settings());

    let response = send(&app, json_request(Method::POST, "/auth/signup", SIGNUP_BODY, None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(state.users.get_by_username("TestUsername").await.is_err());

    // the rejection still hands out a token to retry with
    assert!(response.headers().contains_key(CSRF_HEADER));
}

#[tokio::test]
async fn test_full_flow_with_csrf() {
    let (app, state) = test_app_with(csrf_settings());
    let (token, csrf_cookie) = anonymous_token(&app).await;

    let response = send(
        &app,
        with_csrf(Method::POST, "/auth/signup", SIGNUP_BODY, &csrf_cookie, &token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    // the session adopts the token the client already holds
    assert_eq!(response.headers()[CSRF_HEADER], token.as_str());
    let session = cookie_pair(&response, "session_id").unwrap();
    let id = body_json(response).await["id"].as_i64().unwrap();

    // the rebinder saw the header token
    assert_eq!(state.notifications.bound_token(id), Some(token.clone()));

    let cookies = format!("{session}; {csrf_cookie}");

    // authenticated, but no token: still forbidden
    let response = send(&app, empty_request(Method::POST, "/auth/logout", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        with_csrf(Method::POST, "/auth/logout", "", &cookies, "not-the-token"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(&app, with_csrf(Method::POST, "/auth/logout", "", &cookies, &token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, empty_request(Method::GET, "/auth/check", Some(&cookies))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_after_logout_with_csrf() {
    let (app, _state) = test_app_with(csrf_settings());
    let (token, csrf_cookie) = anonymous_token(&app).await;

    let response = send(
        &app,
        with_csrf(Method::POST, "/auth/signup", SIGNUP_BODY, &csrf_cookie, &token),
    )
    .await;
    let session = cookie_pair(&response, "session_id").unwrap();
    let cookies = format!("{session}; {csrf_cookie}");
    send(&app, with_csrf(Method::POST, "/auth/logout", "", &cookies, &token)).await;

    let response = send(
        &app,
        with_csrf(Method::POST, "/auth/login", LOGIN_BODY, &csrf_cookie, &token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let session = cookie_pair(&response, "session_id").unwrap();

    // the session-bound token is now what unsafe requests must carry
    let cookies = format!("{session}; {csrf_cookie}");
    let response = send(&app, with_csrf(Method::DELETE, "/profile", "", &cookies, &token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_safe_requests_pass_without_token() {
    let (app, _state) = test_app_with(csrf_settings());
    let response = send(&app, empty_request(Method::GET, "/auth/check", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(cookie_pair(&response, "csrf_token").is_some());
}
