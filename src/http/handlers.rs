//! Request handlers for the authentication API.
//!
//! Every denial that is not a format or throttling problem collapses into a
//! generic 401 so the surface leaks nothing about which check failed.

use axum::{
    extract::State,
    http::{
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;
use utoipa::ToSchema;

use crate::error::AuthError;
use crate::http::AppState;
use crate::manager::VerifyOptions;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Signup {
    pub id: String,
    pub password: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub profile: Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Credentials {
    pub id: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Secret {
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProfileUpdate {
    #[schema(value_type = Object)]
    pub profile: Value,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenReply {
    pub jwt: String,
}

/// Map a manager error onto the wire.
///
/// Format and throttling failures are safe to describe; everything else is
/// an undifferentiated authentication failure with a challenge header.
fn deny(realm: &str, err: &AuthError) -> Response {
    match err {
        AuthError::InvalidCredentialFormat(_) | AuthError::RateLimited(_) => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
        AuthError::DuplicateUser => (
            StatusCode::CONFLICT,
            Json(json!({"error": err.to_string()})),
        )
            .into_response(),
        _ => {
            let mut headers = HeaderMap::new();
            if let Ok(challenge) = format!("Basic realm=\"{realm}\"").parse() {
                headers.insert(WWW_AUTHENTICATE, challenge);
            }
            (
                StatusCode::UNAUTHORIZED,
                headers,
                Json(json!({"error": "authentication failed"})),
            )
                .into_response()
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", content_type = "application/json"),
    ),
    tag = "health"
)]
pub async fn health() -> impl IntoResponse {
    let body = Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }));

    let mut headers = HeaderMap::new();
    if let Ok(app) = format!("{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")).parse() {
        headers.insert("X-App", app);
    }

    (headers, body)
}

#[utoipa::path(
    post,
    path = "/api/reg",
    request_body = Signup,
    responses(
        (status = 201, description = "Registration successful, token issued", body = TokenReply),
        (status = 403, description = "Credential rejected by policy"),
        (status = 409, description = "User already exists"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register(State(state): State<AppState>, Json(signup): Json<Signup>) -> Response {
    if let Err(err) = state
        .manager
        .register(&signup.id, &signup.password, signup.profile)
    {
        return deny(&state.realm, &err);
    }
    match state
        .manager
        .login(&signup.id, &signup.password, &state.token_options)
    {
        Ok(jwt) => (StatusCode::CREATED, Json(TokenReply { jwt })).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/login",
    request_body = Credentials,
    responses(
        (status = 200, description = "Token issued", body = TokenReply),
        (status = 401, description = "Authentication failed"),
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, Json(creds): Json<Credentials>) -> Response {
    match state
        .manager
        .login(&creds.id, &creds.password, &state.token_options)
    {
        Ok(jwt) => Json(TokenReply { jwt }).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/renew",
    responses(
        (status = 200, description = "Fresh token issued", body = TokenReply),
        (status = 401, description = "Authentication failed"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn renew(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(jwt) = bearer(&headers) else {
        return deny(&state.realm, &AuthError::AccessDenied);
    };
    let claims = match state.manager.verify(jwt) {
        Ok((_, claims)) => claims,
        Err(err) => return deny(&state.realm, &err),
    };
    match state.manager.renew(&claims.aud, &state.token_options) {
        Ok(jwt) => Json(TokenReply { jwt }).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/logout",
    responses(
        (status = 200, description = "Token revoked"),
        (status = 401, description = "Authentication failed"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(jwt) = bearer(&headers) else {
        return deny(&state.realm, &AuthError::AccessDenied);
    };
    let options = VerifyOptions {
        allow_sso: false,
        logout: true,
    };
    match state.manager.verify_with(jwt, options) {
        Ok(_) => Json(json!({"ok": true})).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/update",
    request_body = ProfileUpdate,
    responses(
        (status = 200, description = "Profile replaced"),
        (status = 401, description = "Authentication failed"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ProfileUpdate>,
) -> Response {
    let Some(jwt) = bearer(&headers) else {
        return deny(&state.realm, &AuthError::AccessDenied);
    };
    let claims = match state.manager.verify(jwt) {
        Ok((_, claims)) => claims,
        Err(err) => return deny(&state.realm, &err),
    };
    match state.manager.update_profile(&claims.aud, request.profile) {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/modpass",
    request_body = Secret,
    responses(
        (status = 200, description = "Password changed, outstanding tokens revoked"),
        (status = 401, description = "Authentication failed"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn modpass(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<Secret>,
) -> Response {
    let Some(jwt) = bearer(&headers) else {
        return deny(&state.realm, &AuthError::AccessDenied);
    };
    let claims = match state.manager.verify(jwt) {
        Ok((_, claims)) => claims,
        Err(err) => return deny(&state.realm, &err),
    };
    match state.manager.update_password(&claims.aud, &request.password) {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}

#[utoipa::path(
    post,
    path = "/api/drop",
    responses(
        (status = 200, description = "User removed"),
        (status = 401, description = "Authentication failed"),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn drop(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(jwt) = bearer(&headers) else {
        return deny(&state.realm, &AuthError::AccessDenied);
    };
    let claims = match state.manager.verify(jwt) {
        Ok((_, claims)) => claims,
        Err(err) => return deny(&state.realm, &err),
    };
    match state.manager.drop_user(&claims.aud) {
        Ok(()) => Json(json!({"ok": true})).into_response(),
        Err(err) => deny(&state.realm, &err),
    }
}
