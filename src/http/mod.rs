//! HTTP adapter exposing the login manager as a small JSON API.

use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::manager::{LoginManager, TokenOptions};

pub mod csrf;
pub mod handlers;

pub use csrf::OriginPolicy;

/// Shared state for the API handlers. The HTTP surface fixes the profile
/// type to loosely structured JSON; embedders wanting typed profiles use
/// [`LoginManager`] directly.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<LoginManager<Value>>,
    pub realm: String,
    pub origins: Arc<OriginPolicy>,
    pub token_options: TokenOptions,
}

impl AppState {
    #[must_use]
    pub fn new(manager: Arc<LoginManager<Value>>) -> Self {
        Self {
            manager,
            realm: env!("CARGO_PKG_NAME").to_string(),
            origins: Arc::new(OriginPolicy::default()),
            token_options: TokenOptions::default(),
        }
    }

    #[must_use]
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    #[must_use]
    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = Arc::new(origins);
        self
    }

    #[must_use]
    pub fn with_token_options(mut self, token_options: TokenOptions) -> Self {
        self.token_options = token_options;
        self
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::register,
        handlers::login,
        handlers::renew,
        handlers::logout,
        handlers::update,
        handlers::modpass,
        handlers::drop,
    ),
    components(schemas(
        handlers::Signup,
        handlers::Credentials,
        handlers::Secret,
        handlers::ProfileUpdate,
        handlers::TokenReply,
    )),
    tags(
        (name = "keygate", description = "Single-sign-on authentication API")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Assemble the application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/reg", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route("/api/renew", post(handlers::renew))
        .route("/api/logout", post(handlers::logout))
        .route("/api/update", post(handlers::update))
        .route("/api/modpass", post(handlers::modpass))
        .route("/api/drop", post(handlers::drop))
        .layer(middleware::from_fn_with_state(state.clone(), csrf::enforce))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Uuid::new_v4().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .with_state(state)
}

/// Start serving the API.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    info!("Listening on 0.0.0.0:{}", port);

    axum::serve(listener, app(state).into_make_service()).await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
