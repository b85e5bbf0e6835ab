//! The durable user record shared by every storage backend.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Bound for application profile payloads. The core never inspects the
/// profile beyond (de)serializing it.
pub trait Profile: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Profile for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// A stored user: id, salt, password shadow, and an opaque profile.
///
/// The salt doubles as the token signing key, so rotating it (password
/// update) invalidates every token previously issued for the user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRecord<P> {
    pub id: String,
    pub salt: String,
    pub shadow: String,
    pub profile: P,
}

impl<P> UserRecord<P> {
    pub fn new(id: impl Into<String>, salt: impl Into<String>, shadow: impl Into<String>, profile: P) -> Self {
        Self {
            id: id.into(),
            salt: salt.into(),
            shadow: shadow.into(),
            profile,
        }
    }
}
