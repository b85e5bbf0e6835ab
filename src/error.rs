//! Error taxonomy shared across the authentication core.

use thiserror::Error;

use crate::store::StoreError;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The id or password violates the quality-control policy.
    #[error("invalid credential format: {0}")]
    InvalidCredentialFormat(String),

    #[error("encryption failure")]
    EncryptionFailure,

    #[error("digestion failure")]
    DigestionFailure,

    /// Deliberately carries no detail: the caller cannot tell an unknown
    /// user from a wrong password or a revoked token.
    #[error("access denied")]
    AccessDenied,

    #[error("malformed token: {0}")]
    TokenMalformed(String),

    #[error("duplicate user")]
    DuplicateUser,

    #[error("user not found")]
    UserNotFound,

    #[error("store operation failure: {0}")]
    StoreOperationFailure(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("rate limited: {0}")]
    RateLimited(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate => Self::DuplicateUser,
            StoreError::NotFound => Self::UserNotFound,
            other => Self::StoreOperationFailure(other.to_string()),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            // A bad signature is an authorization outcome, not a format one.
            TokenError::InvalidSignature => Self::AccessDenied,
            other => Self::TokenMalformed(other.to_string()),
        }
    }
}
