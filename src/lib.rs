//! # Keygate (Pluggable Single-Sign-On Core)
//!
//! `keygate` is a single-sign-on authentication core built around a
//! [`manager::LoginManager`] that orchestrates credential shadowing, token
//! issuance and verification, and ticket-based revocation over pluggable
//! storage backends.
//!
//! ## Credentials
//!
//! Passwords are never stored. Each user record carries a random salt and a
//! shadow derived from the password and salt; login recomputes the shadow and
//! compares. Changing a password rotates the salt, which doubles as the token
//! signing key, so a password change revokes every outstanding token at once.
//!
//! ## Tokens
//!
//! Tokens are compact HMAC-signed JWTs keyed per user. Verification is
//! deny-list based: a token is good until it expires or its ticket is banned
//! by an explicit logout. Foreign issuers are rejected unless a verification
//! explicitly opts into single-sign-on trust.
//!
//! ## Backends
//!
//! Storage is behind the [`store::UserStore`] trait; the crate ships an
//! in-memory backend and a file-per-record JSON backend, plus schema helpers
//! for relational implementations. Audit events flow through
//! [`events::EventSink`], and abuse protection hooks through
//! [`policy::RateLimiter`].

pub mod cli;
pub mod credential;
pub mod error;
pub mod events;
pub mod http;
pub mod manager;
pub mod policy;
pub mod record;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use manager::LoginManager;
pub use record::UserRecord;

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
