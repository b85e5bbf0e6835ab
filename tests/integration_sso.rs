//! End-to-end tests for the authentication core and its HTTP surface.
//!
//! The manager is exercised directly against both bundled backends, then the
//! whole API is driven in-process through the router.

use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Request, StatusCode},
};
use http_body_util::BodyExt;
use keygate::{
    error::AuthError,
    http::{app, AppState, OriginPolicy},
    manager::{LoginManager, TokenOptions, VerifyOptions},
    store::{JsonFileStore, MemoryStore},
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread;
use tower::ServiceExt;

fn memory_manager() -> LoginManager<Value> {
    LoginManager::new(Arc::new(MemoryStore::new()))
}

#[test]
fn full_user_lifecycle_in_memory() -> Result<()> {
    let manager = memory_manager();
    let profile = json!({"age": 30, "email": "alice@example.com"});

    manager.register("alice", "correcthorse", profile.clone())?;
    assert_eq!(manager.load("alice")?, profile);

    let jwt = manager.login("alice", "correcthorse", &TokenOptions::default())?;
    let (_, claims) = manager.verify(&jwt)?;
    assert_eq!(claims.aud, "alice");
    assert!(claims.exp > claims.iat);

    manager.update_profile("alice", json!({"age": 31, "email": "alice@example.com"}))?;
    assert_eq!(
        manager.load("alice")?.get("age").and_then(Value::as_i64),
        Some(31)
    );

    manager.drop_user("alice")?;
    assert!(matches!(manager.load("alice"), Err(AuthError::UserNotFound)));
    Ok(())
}

#[test]
fn full_user_lifecycle_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store: JsonFileStore<Value> = JsonFileStore::new(dir.path())?;
    let manager: LoginManager<Value> = LoginManager::new(Arc::new(store));

    manager.register("bob@example.com", "hunter2hunter2", json!({"tier": "free"}))?;
    let jwt = manager.login("bob@example.com", "hunter2hunter2", &TokenOptions::default())?;
    let (_, claims) = manager.verify(&jwt)?;
    assert_eq!(claims.aud, "bob@example.com");

    // The record is a plain JSON file named after the id.
    assert!(dir.path().join("bob@example.com.json").exists());

    manager.update_password("bob@example.com", "betterpassword")?;
    assert!(matches!(
        manager.verify(&jwt),
        Err(AuthError::AccessDenied)
    ));
    assert!(manager
        .login("bob@example.com", "betterpassword", &TokenOptions::default())
        .is_ok());
    Ok(())
}

#[test]
fn logout_revokes_exactly_the_presented_token() -> Result<()> {
    let manager = memory_manager();
    manager.register("alice", "correcthorse", json!({}))?;

    let first = manager.login("alice", "correcthorse", &TokenOptions::default())?;
    let second = manager.login("alice", "correcthorse", &TokenOptions::default())?;

    manager.verify_with(
        &first,
        VerifyOptions {
            allow_sso: false,
            logout: true,
        },
    )?;

    assert!(matches!(manager.verify(&first), Err(AuthError::AccessDenied)));
    // The sibling token keeps working.
    assert!(manager.verify(&second).is_ok());
    Ok(())
}

#[test]
fn renewed_tokens_outlive_a_logout_of_the_original() -> Result<()> {
    let manager = memory_manager();
    manager.register("alice", "correcthorse", json!({}))?;

    let original = manager.login("alice", "correcthorse", &TokenOptions::default())?;
    let renewed = manager.renew("alice", &TokenOptions::default())?;

    manager.verify_with(
        &original,
        VerifyOptions {
            allow_sso: false,
            logout: true,
        },
    )?;
    assert!(manager.verify(&renewed).is_ok());
    Ok(())
}

#[test]
fn concurrent_registrations_of_distinct_ids_all_succeed() -> Result<()> {
    let manager = Arc::new(memory_manager());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                manager.register(&format!("user-{i}"), "correcthorse", json!({"n": i}))
            })
        })
        .collect();

    for handle in handles {
        match handle.join() {
            Ok(result) => result?,
            Err(_) => anyhow::bail!("registration thread panicked"),
        }
    }
    for i in 0..8 {
        assert!(manager
            .login(&format!("user-{i}"), "correcthorse", &TokenOptions::default())
            .is_ok());
    }
    Ok(())
}

#[test]
fn concurrent_registration_has_one_winner() -> Result<()> {
    let manager = Arc::new(memory_manager());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.register("alice", "correcthorse", json!({"attempt": i})))
        })
        .collect();

    let mut wins = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => wins += 1,
            Ok(Err(AuthError::DuplicateUser)) => duplicates += 1,
            Ok(Err(err)) => return Err(err.into()),
            Err(_) => anyhow::bail!("registration thread panicked"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(duplicates, 7);
    Ok(())
}

fn api_state() -> AppState {
    AppState::new(Arc::new(memory_manager())).with_origins(OriginPolicy::new(
        vec!["app.example.com".to_string()],
        vec!["evil.example.com".to_string()],
    ))
}

async fn post_json(state: AppState, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    Ok((status, serde_json::from_slice(&bytes)?))
}

#[tokio::test]
async fn api_signup_returns_a_working_token() -> Result<()> {
    let state = api_state();

    let (status, body) = post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse", "profile": {"age": 30}}),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let jwt = body
        .get("jwt")
        .and_then(Value::as_str)
        .context("missing jwt")?
        .to_string();

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/renew")
                .header(AUTHORIZATION, format!("Bearer {jwt}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn api_login_failures_are_generic_401s() -> Result<()> {
    let state = api_state();
    post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;

    let (status, body) = post_json(
        state.clone(),
        "/api/login",
        json!({"id": "alice", "password": "wrongpassword"}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body.get("error").and_then(Value::as_str),
        Some("authentication failed")
    );

    // Unknown user: indistinguishable from a bad password.
    let (status, body) = post_json(
        state,
        "/api/login",
        json!({"id": "charlie", "password": "wrongpassword"}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body.get("error").and_then(Value::as_str),
        Some("authentication failed")
    );
    Ok(())
}

#[tokio::test]
async fn api_duplicate_signup_is_a_conflict() -> Result<()> {
    let state = api_state();
    post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;

    let (status, _) = post_json(
        state,
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn api_logout_then_modpass_requires_a_live_token() -> Result<()> {
    let state = api_state();
    let (_, body) = post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;
    let jwt = body
        .get("jwt")
        .and_then(Value::as_str)
        .context("missing jwt")?
        .to_string();

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/logout")
                .header(AUTHORIZATION, format!("Bearer {jwt}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // The revoked token no longer authorizes a password change.
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/modpass")
                .header(AUTHORIZATION, format!("Bearer {jwt}"))
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"password": "newpassword"}).to_string()))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn api_rejects_blocked_and_unlisted_origins() -> Result<()> {
    let state = api_state();

    for origin in ["https://evil.example.com", "https://stranger.example.com"] {
        let response = app(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/login")
                    .header("Origin", origin)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"id": "alice", "password": "correcthorse"}).to_string(),
                    ))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    // The allow-listed origin reaches the handler.
    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reg")
                .header("Origin", "https://app.example.com")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"id": "alice", "password": "correcthorse"}).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn api_default_policy_is_same_origin() -> Result<()> {
    // No lists configured: the Origin host must match the request Host.
    let state = AppState::new(Arc::new(memory_manager()));

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reg")
                .header("Host", "app.example.com")
                .header("Origin", "https://evil.example.com")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"id": "alice", "password": "correcthorse"}).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reg")
                .header("Host", "app.example.com")
                .header("Origin", "https://app.example.com")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"id": "alice", "password": "correcthorse"}).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn api_health_is_open() -> Result<()> {
    let response = app(api_state())
        .oneshot(Request::builder().uri("/health").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await?.to_bytes();
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body.get("name").and_then(Value::as_str), Some("keygate"));
    Ok(())
}

#[tokio::test]
async fn api_profile_update_round_trips() -> Result<()> {
    let state = api_state();
    let (_, body) = post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse", "profile": {"age": 30}}),
    )
    .await?;
    let jwt = body
        .get("jwt")
        .and_then(Value::as_str)
        .context("missing jwt")?
        .to_string();

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/update")
                .header(AUTHORIZATION, format!("Bearer {jwt}"))
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({"profile": {"age": 31}}).to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        state
            .manager
            .load("alice")?
            .get("age")
            .and_then(Value::as_i64),
        Some(31)
    );
    Ok(())
}

#[tokio::test]
async fn api_drop_closes_the_account() -> Result<()> {
    let state = api_state();
    let (_, body) = post_json(
        state.clone(),
        "/api/reg",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;
    let jwt = body
        .get("jwt")
        .and_then(Value::as_str)
        .context("missing jwt")?
        .to_string();

    let response = app(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/drop")
                .header(AUTHORIZATION, format!("Bearer {jwt}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = post_json(
        state,
        "/api/login",
        json!({"id": "alice", "password": "correcthorse"}),
    )
    .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}
