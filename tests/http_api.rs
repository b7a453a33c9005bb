//! Router-level tests exercising the HTTP surface end to end.

mod common;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Request, Response, StatusCode,
    },
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{harness, Harness};
use gardi::handlers::router;
use gardi::identity::{IdentityUpdate, Role};
use gardi::store::IdentityStore;
use gardi::token::now_unix;

fn app(harness: &Harness) -> Router {
    router(harness.service.clone())
}

fn json_request(method: &str, uri: &str, body: Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))?)
}

async fn response_json(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sign up a fixture identity through the router and return the session
/// token from the response body.
async fn signup(app: &Router, email: &str) -> Result<String> {
    let request = json_request(
        "POST",
        "/api/v1/users/signup",
        json!({
            "name": "Alice",
            "email": email,
            "password": "longenough1",
            "passwordConfirm": "longenough1",
        }),
    )?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("signup response should carry a token")
}

#[tokio::test]
async fn signup_sets_cookie_and_returns_envelope() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);

    let request = json_request(
        "POST",
        "/api/v1/users/signup",
        json!({
            "name": "Alice",
            "email": "a@x.com",
            "password": "longenough1",
            "passwordConfirm": "longenough1",
        }),
    )?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("expected a session cookie")?
        .to_str()?
        .to_string();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    // Plain-http request, so no Secure attribute.
    assert!(!cookie.contains("Secure"));

    let body = response_json(response).await?;
    assert_eq!(body["status"], "success");
    assert!(body["token"].as_str().is_some_and(|token| !token.is_empty()));
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    assert_eq!(body["data"]["user"]["role"], "standard");
    let user = body["data"]["user"]
        .as_object()
        .context("user should be an object")?;
    assert!(!user.keys().any(|key| key.to_lowercase().contains("password")));
    Ok(())
}

#[tokio::test]
async fn login_round_trip() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    signup(&app, "a@x.com").await?;

    let request = json_request(
        "POST",
        "/api/v1/users/login",
        json!({ "email": "a@x.com", "password": "longenough1" }),
    )?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user"]["email"], "a@x.com");

    let request = json_request(
        "POST",
        "/api/v1/users/login",
        json!({ "email": "a@x.com", "password": "wrongpassword" }),
    )?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await?;
    assert_eq!(body["status"], "fail");
    Ok(())
}

#[tokio::test]
async fn me_requires_a_session() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    let token = signup(&app, "a@x.com").await?;

    let anonymous = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .body(Body::empty())?;
    let response = app.clone().oneshot(anonymous).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await?;
    assert_eq!(body["status"], "fail");

    let authenticated = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = app.oneshot(authenticated).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    Ok(())
}

#[tokio::test]
async fn session_probe_never_errors() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    let token = signup(&app, "a@x.com").await?;

    let anonymous = Request::builder()
        .method("GET")
        .uri("/api/v1/users/session")
        .body(Body::empty())?;
    let response = app.clone().oneshot(anonymous).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Garbage cookie also resolves to "no session", not an error.
    let garbage = Request::builder()
        .method("GET")
        .uri("/api/v1/users/session")
        .header(COOKIE, "jwt=garbage")
        .body(Body::empty())?;
    let response = app.clone().oneshot(garbage).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let with_cookie = Request::builder()
        .method("GET")
        .uri("/api/v1/users/session")
        .header(COOKIE, format!("jwt={token}"))
        .body(Body::empty())?;
    let response = app.oneshot(with_cookie).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    Ok(())
}

#[tokio::test]
async fn logout_overwrites_the_cookie() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/users/logout")
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .context("expected a logout cookie")?
        .to_str()?;
    assert!(cookie.starts_with("jwt=loggedout"));
    assert!(cookie.contains("Max-Age=10"));
    Ok(())
}

#[tokio::test]
async fn role_endpoint_is_administrator_only() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    let caller_token = signup(&app, "admin@x.com").await?;
    let subject_token = signup(&app, "subject@x.com").await?;

    let subject = harness
        .service
        .tokens()
        .verify(&subject_token)?
        .subject;

    let mut forbidden = json_request(
        "PATCH",
        &format!("/api/v1/users/{subject}/role"),
        json!({ "role": "operator" }),
    )?;
    forbidden
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {caller_token}").parse()?);
    let response = app.clone().oneshot(forbidden).await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Promote the caller out of band, then the same request succeeds.
    let caller = harness.service.tokens().verify(&caller_token)?.subject;
    harness
        .store
        .update(
            caller,
            IdentityUpdate {
                role: Some(Role::Administrator),
                ..IdentityUpdate::default()
            },
        )
        .await?;

    let mut allowed = json_request(
        "PATCH",
        &format!("/api/v1/users/{subject}/role"),
        json!({ "role": "operator" }),
    )?;
    allowed
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {caller_token}").parse()?);
    let response = app.oneshot(allowed).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    assert_eq!(body["data"]["user"]["role"], "operator");
    Ok(())
}

#[tokio::test]
async fn forgot_password_reports_unknown_email() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);

    let request = json_request(
        "POST",
        "/api/v1/users/forgot-password",
        json!({ "email": "nobody@x.com" }),
    )?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = response_json(response).await?;
    assert_eq!(body["status"], "fail");
    Ok(())
}

#[tokio::test]
async fn update_password_issues_a_fresh_session() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    let token = signup(&app, "a@x.com").await?;
    let subject = harness.service.tokens().verify(&token)?.subject;
    // Backdated so it is unambiguously older than the coming watermark.
    let old_token = harness.service.tokens().issue_at(subject, now_unix() - 30)?;

    let mut wrong_current = json_request(
        "PATCH",
        "/api/v1/users/update-password",
        json!({
            "passwordCurrent": "wrongcurrent",
            "password": "newpassword1",
            "passwordConfirm": "newpassword1",
        }),
    )?;
    wrong_current
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {token}").parse()?);
    let response = app.clone().oneshot(wrong_current).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = json_request(
        "PATCH",
        "/api/v1/users/update-password",
        json!({
            "passwordCurrent": "longenough1",
            "password": "newpassword1",
            "passwordConfirm": "newpassword1",
        }),
    )?;
    request
        .headers_mut()
        .insert(AUTHORIZATION, format!("Bearer {token}").parse()?);
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await?;
    let fresh = body["token"].as_str().context("expected a fresh token")?;

    // The pre-change token is now stale; the fresh one resolves.
    let stale = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .header(AUTHORIZATION, format!("Bearer {old_token}"))
        .body(Body::empty())?;
    let response = app.clone().oneshot(stale).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let current = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .header(AUTHORIZATION, format!("Bearer {fresh}"))
        .body(Body::empty())?;
    let response = app.oneshot(current).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn deactivate_me_invalidates_the_session() -> Result<()> {
    let harness = harness()?;
    let app = app(&harness);
    let token = signup(&app, "a@x.com").await?;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/users/me")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = app.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The identity is gone from default lookups, so the token stops working.
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/users/me")
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())?;
    let response = app.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
