//! Pluggable quality-control and rate-limiting hooks.
//!
//! Both contracts default to permissive implementations; deployments inject
//! stricter policies at composition time. Hooks run outside the manager's
//! store lock, so an implementation may itself consult the store.

use regex::Regex;

use crate::error::AuthError;
use crate::record::UserRecord;

/// Validates ids and passwords before any sensitive operation.
pub trait QualityControl: Send + Sync {
    /// # Errors
    ///
    /// Returns `InvalidCredentialFormat` when the id violates policy.
    fn good_enough_id(&self, id: &str) -> Result<(), AuthError>;

    /// # Errors
    ///
    /// Returns `InvalidCredentialFormat` when the password violates policy.
    fn good_enough_password(&self, password: &str) -> Result<(), AuthError>;
}

/// Default policy: length bounds for both credentials plus a URL-safe
/// charset check on ids. Ids are validated rather than re-encoded, so the
/// value used as a store key is exactly what the caller registered.
#[derive(Debug, Clone)]
pub struct LengthPolicy {
    pub min: usize,
    pub max: usize,
}

impl Default for LengthPolicy {
    fn default() -> Self {
        Self { min: 5, max: 80 }
    }
}

fn url_safe(id: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9@._+-]+$").is_ok_and(|regex| regex.is_match(id))
}

impl QualityControl for LengthPolicy {
    fn good_enough_id(&self, id: &str) -> Result<(), AuthError> {
        let count = id.chars().count();
        if count < self.min || count > self.max {
            return Err(AuthError::InvalidCredentialFormat(format!(
                "id length must be within {}..={}",
                self.min, self.max
            )));
        }
        if !url_safe(id) {
            return Err(AuthError::InvalidCredentialFormat(
                "id contains characters outside the URL-safe set".to_string(),
            ));
        }
        Ok(())
    }

    fn good_enough_password(&self, password: &str) -> Result<(), AuthError> {
        let count = password.chars().count();
        if count < self.min || count > self.max {
            return Err(AuthError::InvalidCredentialFormat(format!(
                "password length must be within {}..={}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// One hook per sensitive operation; any hook may reject with `RateLimited`.
/// Record-aware hooks run after the record has been fetched, enabling
/// policies such as "max concurrent sessions".
#[allow(unused_variables)]
pub trait RateLimiter<P>: Send + Sync {
    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_attempt_register(&self, id: &str) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_attempt_login(&self, id: &str) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_login(&self, record: &UserRecord<P>) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_attempt_token(&self, id: &str) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_renew_token(&self, record: &UserRecord<P>) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_update(&self, record: &UserRecord<P>) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_update_password(&self, id: &str) -> Result<(), AuthError> {
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `RateLimited` to reject the operation.
    fn on_deletion(&self, id: &str) -> Result<(), AuthError> {
        Ok(())
    }
}

/// The no-op default limiter.
#[derive(Debug, Clone, Default)]
pub struct Unlimited;

impl<P> RateLimiter<P> for Unlimited {}
