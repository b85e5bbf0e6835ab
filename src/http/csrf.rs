//! Origin screening for state-changing requests.
//!
//! Browsers attach an `Origin` header to cross-site POSTs; non-browser
//! clients usually send none. Requests that carry an `Origin` must match the
//! request's own `Host` by default; an allow list replaces that same-origin
//! rule, and a block list vetoes either way.

use axum::{
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::warn;

use crate::http::AppState;

/// Host-based allow/block lists for the `Origin` header.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    allowed: Vec<String>,
    blocked: Vec<String>,
}

impl OriginPolicy {
    #[must_use]
    pub fn new(allowed: Vec<String>, blocked: Vec<String>) -> Self {
        Self { allowed, blocked }
    }

    /// Decide on the host part of an `Origin` header, if one was sent,
    /// against the request's `Host` header.
    ///
    /// Block list wins over everything. An empty allow list means
    /// same-origin: the `Origin` host must equal the `Host` host. A
    /// non-empty allow list replaces the same-origin rule.
    #[must_use]
    pub fn permits(&self, origin: Option<&str>, host: Option<&str>) -> bool {
        let Some(origin) = origin else {
            return true;
        };
        let Some(origin_host) = host_of(origin) else {
            return false;
        };
        if self.blocked.iter().any(|blocked| blocked == origin_host) {
            return false;
        }
        if self.allowed.is_empty() {
            return host
                .and_then(host_of)
                .is_some_and(|request_host| request_host == origin_host);
        }
        self.allowed.iter().any(|allowed| allowed == origin_host)
    }
}

/// Host part of an origin or `Host` value such as
/// `https://app.example.com:8443` or `app.example.com:8443`.
fn host_of(origin: &str) -> Option<&str> {
    let rest = origin.split_once("://").map_or(origin, |(_, rest)| rest);
    let host = rest.split('/').next()?.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

/// Reject cross-origin POSTs whose `Origin` host fails the policy.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::POST {
        let origin = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok());
        let host = request
            .headers()
            .get("host")
            .and_then(|value| value.to_str().ok());
        if !state.origins.permits(origin, host) {
            warn!(origin, "rejected cross-origin request");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({"error": "origin not allowed"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: Option<&str> = Some("api.example.com");

    #[test]
    fn no_origin_is_always_permitted() {
        let policy = OriginPolicy::new(vec!["app.example.com".to_string()], vec![]);
        assert!(policy.permits(None, HOST));
        assert!(OriginPolicy::default().permits(None, None));
    }

    #[test]
    fn allow_list_restricts_hosts() {
        let policy = OriginPolicy::new(vec!["app.example.com".to_string()], vec![]);
        assert!(policy.permits(Some("https://app.example.com"), HOST));
        assert!(policy.permits(Some("https://app.example.com:8443/path"), HOST));
        assert!(!policy.permits(Some("https://evil.example.com"), HOST));
    }

    #[test]
    fn block_list_wins_over_allow_list() {
        let policy = OriginPolicy::new(
            vec!["app.example.com".to_string()],
            vec!["app.example.com".to_string()],
        );
        assert!(!policy.permits(Some("https://app.example.com"), HOST));
    }

    #[test]
    fn default_policy_enforces_same_origin() {
        let policy = OriginPolicy::default();
        assert!(policy.permits(
            Some("https://app.example.com"),
            Some("app.example.com")
        ));
        // Ports are ignored on both sides; only hosts are compared.
        assert!(policy.permits(
            Some("https://app.example.com:8443"),
            Some("app.example.com:80")
        ));
        assert!(!policy.permits(
            Some("https://evil.example.com"),
            Some("app.example.com")
        ));
        // Without a Host to compare against, a cross-site Origin cannot pass.
        assert!(!policy.permits(Some("https://app.example.com"), None));
    }

    #[test]
    fn block_list_also_vetoes_same_origin() {
        let policy = OriginPolicy::new(vec![], vec!["app.example.com".to_string()]);
        assert!(!policy.permits(
            Some("https://app.example.com"),
            Some("app.example.com")
        ));
    }

    #[test]
    fn malformed_origins_are_rejected() {
        let policy = OriginPolicy::default();
        assert!(!policy.permits(Some("https://"), HOST));
        assert!(!policy.permits(Some(""), HOST));
    }

    #[test]
    fn host_extraction_strips_scheme_port_and_path() {
        assert_eq!(host_of("https://a.example.com:8443/login"), Some("a.example.com"));
        assert_eq!(host_of("a.example.com"), Some("a.example.com"));
        assert_eq!(host_of("null"), Some("null"));
    }
}
