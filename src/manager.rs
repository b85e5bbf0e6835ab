//! The login manager: orchestrates credential shadowing, token lifecycle,
//! revocation, and the policy hooks around a storage backend.
//!
//! One instance per process/service. The manager keeps no per-session state;
//! issued tokens are the session state. A single mutex gates store-visiting
//! sequences so that insert-uniqueness and read-modify-write updates cannot
//! interleave; the lock is never held across a policy hook, which may itself
//! touch the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::credential::{self, DigestAlg};
use crate::error::AuthError;
use crate::events::{ConsoleSink, EventSink, LogLevel, LoginEvent};
use crate::policy::{LengthPolicy, QualityControl, RateLimiter, Unlimited};
use crate::record::{Profile, UserRecord};
use crate::store::{StoreError, UserStore};
use crate::token::{self, Algorithm, Claims, Header};

/// Default token lifetime in seconds.
pub const DEFAULT_TOKEN_TIMEOUT: i64 = 600;

/// Immutable per-manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Digest used to derive the credential cipher key from the salt.
    pub digest: DigestAlg,
    /// Raw salt length in bytes before hex encoding.
    pub salt_length: usize,
    /// Token signature algorithm.
    pub algorithm: Algorithm,
    /// Token lifetime applied when a call does not override it.
    pub token_timeout: i64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            digest: DigestAlg::default(),
            salt_length: 16,
            algorithm: Algorithm::default(),
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }
}

/// Per-call token issuance options.
#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    pub subject: String,
    /// Lifetime in seconds; the manager default applies when `None`.
    pub timeout: Option<i64>,
    /// Extra JWT header fields, carried verbatim.
    pub headers: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    /// Accept tokens from foreign issuers, trusting them for signature and
    /// expiry only (issuer and deny-list checks are skipped).
    pub allow_sso: bool,
    /// Ban this token's ticket after a successful verification.
    pub logout: bool,
}

pub struct LoginManager<P> {
    config: ManagerConfig,
    manager_id: String,
    store: Arc<dyn UserStore<P>>,
    sink: Arc<dyn EventSink>,
    limiter: Arc<dyn RateLimiter<P>>,
    quality: Arc<dyn QualityControl>,
    gate: Mutex<()>,
}

impl<P: Profile> LoginManager<P> {
    pub fn new(store: Arc<dyn UserStore<P>>) -> Self {
        Self {
            config: ManagerConfig::default(),
            manager_id: Uuid::new_v4().to_string(),
            store,
            sink: Arc::new(ConsoleSink),
            limiter: Arc::new(Unlimited),
            quality: Arc::new(LengthPolicy::default()),
            gate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter<P>>) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_quality_control(mut self, quality: Arc<dyn QualityControl>) -> Self {
        self.quality = quality;
        self
    }

    /// The manager's process-lifetime issuer id.
    pub fn id(&self) -> &str {
        &self.manager_id
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self, user_id: &str, level: LogLevel, event: LoginEvent, message: &str) {
        self.sink.report(user_id, level, event, message);
    }

    fn check_id(&self, id: &str, event: LoginEvent) -> Result<(), AuthError> {
        if let Err(err) = self.quality.good_enough_id(id) {
            self.audit(
                "unknown",
                LogLevel::Warning,
                event,
                &format!("invalid id in request: {err}"),
            );
            return Err(err);
        }
        Ok(())
    }

    fn check_password(&self, id: &str, password: &str, event: LoginEvent) -> Result<(), AuthError> {
        if let Err(err) = self.quality.good_enough_password(password) {
            self.audit(
                id,
                LogLevel::Warning,
                event,
                &format!("invalid password in request: {err}"),
            );
            return Err(err);
        }
        Ok(())
    }

    fn check_limit(
        &self,
        id: &str,
        event: LoginEvent,
        outcome: Result<(), AuthError>,
    ) -> Result<(), AuthError> {
        if let Err(err) = outcome {
            self.audit(id, LogLevel::Warning, event, &format!("overrated: {err}"));
            return Err(err);
        }
        Ok(())
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// `InvalidCredentialFormat`/`RateLimited` on policy rejection,
    /// `DuplicateUser` when the id is taken, crypto and store failures
    /// otherwise.
    pub fn register(&self, id: &str, password: &str, profile: P) -> Result<(), AuthError> {
        self.check_id(id, LoginEvent::Registration)?;
        self.check_password(id, password, LoginEvent::Registration)?;
        self.check_limit(
            id,
            LoginEvent::Registration,
            self.limiter.on_attempt_register(id),
        )?;

        let salt = credential::generate_salt(self.config.salt_length);
        let shadow = match credential::compute_shadow(password, &salt, self.config.digest) {
            Ok(shadow) => shadow,
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Critical,
                    LoginEvent::Registration,
                    &format!("unable to register: {err}"),
                );
                return Err(err);
            }
        };

        let record = UserRecord::new(id, salt, shadow, profile);
        let inserted = {
            let _guard = self.lock();
            self.store.insert(&record)
        };
        if let Err(err) = inserted {
            self.audit(
                id,
                LogLevel::Critical,
                LoginEvent::Registration,
                &format!("unable to register: {err}"),
            );
            return Err(err.into());
        }

        self.audit(id, LogLevel::Event, LoginEvent::Registration, "user registered");
        Ok(())
    }

    /// Authenticate and mint a token.
    ///
    /// Unknown user and wrong password surface the same `AccessDenied`; the
    /// audit log distinguishes them.
    ///
    /// # Errors
    ///
    /// `AccessDenied` on credential mismatch, policy errors on rejection,
    /// crypto failures otherwise.
    pub fn login(&self, id: &str, password: &str, options: &TokenOptions) -> Result<String, AuthError> {
        self.check_id(id, LoginEvent::Login)?;
        self.check_password(id, password, LoginEvent::Login)?;
        self.check_limit(id, LoginEvent::Login, self.limiter.on_attempt_login(id))?;

        let record = {
            let _guard = self.lock();
            self.store.select(id)
        };
        let record = match record {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                self.audit(
                    id,
                    LogLevel::Warning,
                    LoginEvent::Login,
                    "unregistered user record",
                );
                return Err(AuthError::AccessDenied);
            }
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Critical,
                    LoginEvent::Login,
                    &format!("store failure: {err}"),
                );
                return Err(err.into());
            }
        };

        let matched =
            match credential::verify_password(password, &record.salt, &record.shadow, self.config.digest)
            {
                Ok(matched) => matched,
                Err(err) => {
                    self.audit(
                        id,
                        LogLevel::Critical,
                        LoginEvent::Login,
                        &format!("crypto failure: {err}"),
                    );
                    return Err(err);
                }
            };
        if !matched {
            self.audit(id, LogLevel::Warning, LoginEvent::Login, "access denied");
            return Err(AuthError::AccessDenied);
        }

        // Record-aware hook, outside the store lock.
        self.check_limit(id, LoginEvent::Login, self.limiter.on_login(&record))?;

        let jwt = self.issue_token(&record, options, LoginEvent::Login)?;
        self.audit(id, LogLevel::Event, LoginEvent::Login, "user logged");
        Ok(jwt)
    }

    /// Mint a fresh token for an already-authenticated user.
    ///
    /// # Errors
    ///
    /// Policy errors on rejection, `UserNotFound` when the record vanished,
    /// signing failures otherwise.
    pub fn renew(&self, id: &str, options: &TokenOptions) -> Result<String, AuthError> {
        self.check_id(id, LoginEvent::Renewal)?;
        self.check_limit(id, LoginEvent::Renewal, self.limiter.on_attempt_token(id))?;

        let record = {
            let _guard = self.lock();
            self.store.select(id)
        };
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Warning,
                    LoginEvent::Renewal,
                    &format!("unable to renew: {err}"),
                );
                return Err(err.into());
            }
        };

        self.check_limit(id, LoginEvent::Renewal, self.limiter.on_renew_token(&record))?;

        let jwt = self.issue_token(&record, options, LoginEvent::Renewal)?;
        self.audit(id, LogLevel::Event, LoginEvent::Renewal, "token renewed");
        Ok(jwt)
    }

    fn issue_token(
        &self,
        record: &UserRecord<P>,
        options: &TokenOptions,
        event: LoginEvent,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let timeout = options.timeout.unwrap_or(self.config.token_timeout);
        let claims = Claims {
            iss: self.manager_id.clone(),
            sub: options.subject.clone(),
            aud: record.id.clone(),
            exp: now + timeout,
            nbf: now,
            iat: now,
            jit: Uuid::new_v4().to_string(),
        };
        token::sign(
            self.config.algorithm,
            record.salt.as_bytes(),
            &claims,
            options.headers.clone(),
        )
        .map_err(|err| {
            self.audit(
                &record.id,
                LogLevel::Critical,
                event,
                &format!("token signature failure: {err}"),
            );
            AuthError::from(err)
        })
    }

    /// Verify a presented token with default options (local issuers only,
    /// no logout).
    ///
    /// # Errors
    ///
    /// See [`LoginManager::verify_with`].
    pub fn verify(&self, presented: &str) -> Result<(Header, Claims), AuthError> {
        self.verify_with(presented, VerifyOptions::default())
    }

    /// Verify a presented token.
    ///
    /// The `aud` claim is untrusted input used only to select the
    /// verification key (that user's salt); nothing is authorized until the
    /// signature check passes.
    ///
    /// # Errors
    ///
    /// `TokenMalformed` for structural failures, `AccessDenied` for bad
    /// signatures, expired/not-yet-valid windows, foreign issuers without
    /// `allow_sso`, and deny-listed tickets.
    pub fn verify_with(
        &self,
        presented: &str,
        options: VerifyOptions,
    ) -> Result<(Header, Claims), AuthError> {
        let event = if options.logout {
            LoginEvent::Logoff
        } else {
            LoginEvent::Verification
        };

        let peeked = match token::peek_claims(presented) {
            Ok(claims) => claims,
            Err(err) => {
                self.audit(
                    "unknown",
                    LogLevel::Warning,
                    event,
                    &format!("jwt verification failure: {err}"),
                );
                return Err(err.into());
            }
        };
        let id = peeked.aud.clone();

        self.check_id(&id, event)?;
        self.check_limit(&id, event, self.limiter.on_attempt_token(&id))?;

        let record = {
            let _guard = self.lock();
            self.store.select(&id)
        };
        let record = match record {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                self.audit(&id, LogLevel::Warning, event, "unregistered user record");
                return Err(AuthError::AccessDenied);
            }
            Err(err) => {
                self.audit(
                    &id,
                    LogLevel::Critical,
                    event,
                    &format!("store failure: {err}"),
                );
                return Err(err.into());
            }
        };

        let (header, claims) =
            match token::verify(presented, self.config.algorithm, record.salt.as_bytes()) {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.audit(
                        &id,
                        LogLevel::Warning,
                        event,
                        &format!("jwt verification failure: {err}"),
                    );
                    return Err(err.into());
                }
            };

        // The window is [nbf, exp): a token is dead at its exact expiry
        // second, matching the deny-list's refusal to ban such a ticket.
        let now = Utc::now().timestamp();
        if claims.nbf > now || now >= claims.exp {
            self.audit(&id, LogLevel::Warning, event, "token outside validity window");
            return Err(AuthError::AccessDenied);
        }

        let local = claims.iss == self.manager_id;
        if !local && !options.allow_sso {
            self.audit(&id, LogLevel::Warning, event, "foreign issuer rejected");
            return Err(AuthError::AccessDenied);
        }
        if !local && options.logout {
            // A foreign ticket can only be banned by its issuer; banning it
            // here would never be consulted by the manager that minted it.
            self.audit(&id, LogLevel::Warning, event, "cannot revoke a foreign token");
            return Err(AuthError::Unsupported(
                "logout of a foreign token".to_string(),
            ));
        }

        if local {
            // Deny-list check and ban must not interleave with another ban
            // or flush of the same ticket.
            let _guard = self.lock();
            if self.store.is_rejected(&claims.jit) {
                self.audit(&id, LogLevel::Warning, event, "ticket rejected");
                return Err(AuthError::AccessDenied);
            }
            if options.logout {
                if let Err(err) = self.store.ban(&claims.jit, claims.exp) {
                    self.audit(
                        &id,
                        LogLevel::Critical,
                        event,
                        &format!("unable to ban ticket: {err}"),
                    );
                    return Err(err.into());
                }
            }
        }

        if options.logout {
            self.audit(&id, LogLevel::Event, LoginEvent::Logoff, "user logged off");
        } else {
            self.audit(&id, LogLevel::Event, LoginEvent::Verification, "token verified");
        }
        Ok((header, claims))
    }

    /// Change a user's password, rotating the salt. All previously issued
    /// tokens for the user stop verifying because the signing key changes.
    ///
    /// # Errors
    ///
    /// Policy errors on rejection, `UserNotFound` when the id is unknown,
    /// crypto and store failures otherwise.
    pub fn update_password(&self, id: &str, password: &str) -> Result<(), AuthError> {
        self.check_id(id, LoginEvent::Updating)?;
        self.check_password(id, password, LoginEvent::Updating)?;
        self.check_limit(id, LoginEvent::Updating, self.limiter.on_update_password(id))?;

        let salt = credential::generate_salt(self.config.salt_length);
        let shadow = match credential::compute_shadow(password, &salt, self.config.digest) {
            Ok(shadow) => shadow,
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Critical,
                    LoginEvent::Updating,
                    &format!("unable to update password: {err}"),
                );
                return Err(err);
            }
        };

        let updated = {
            let _guard = self.lock();
            match self.store.select(id) {
                Ok(mut record) => {
                    record.salt = salt;
                    record.shadow = shadow;
                    self.store.update(&record)
                }
                Err(err) => Err(err),
            }
        };
        if let Err(err) = updated {
            self.audit(
                id,
                LogLevel::Critical,
                LoginEvent::Updating,
                &format!("unable to update password: {err}"),
            );
            return Err(err.into());
        }

        self.audit(id, LogLevel::Event, LoginEvent::Updating, "password updated");
        Ok(())
    }

    /// Replace a user's profile, leaving salt and shadow untouched.
    ///
    /// # Errors
    ///
    /// Policy errors on rejection, `UserNotFound` when the id is unknown,
    /// store failures otherwise.
    pub fn update_profile(&self, id: &str, profile: P) -> Result<(), AuthError> {
        self.check_id(id, LoginEvent::Updating)?;

        let record = {
            let _guard = self.lock();
            self.store.select(id)
        };
        let mut record = match record {
            Ok(record) => record,
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Critical,
                    LoginEvent::Updating,
                    &format!("unable to update profile: {err}"),
                );
                return Err(err.into());
            }
        };

        // Record-aware hook runs between the read and the write, outside
        // the lock; last write wins on a concurrent profile update.
        self.check_limit(id, LoginEvent::Updating, self.limiter.on_update(&record))?;

        record.profile = profile;
        let updated = {
            let _guard = self.lock();
            self.store.update(&record)
        };
        if let Err(err) = updated {
            self.audit(
                id,
                LogLevel::Critical,
                LoginEvent::Updating,
                &format!("unable to update profile: {err}"),
            );
            return Err(err.into());
        }

        self.audit(id, LogLevel::Event, LoginEvent::Updating, "profile updated");
        Ok(())
    }

    /// Load a user's profile.
    ///
    /// # Errors
    ///
    /// `UserNotFound` when the id is unknown, store failures otherwise.
    pub fn load(&self, id: &str) -> Result<P, AuthError> {
        self.check_id(id, LoginEvent::Login)?;

        let record = {
            let _guard = self.lock();
            self.store.select(id)
        };
        match record {
            Ok(record) => {
                self.audit(id, LogLevel::Event, LoginEvent::Login, "retrieving user record");
                Ok(record.profile)
            }
            Err(err) => {
                self.audit(
                    id,
                    LogLevel::Warning,
                    LoginEvent::Login,
                    &format!("unable to load user record: {err}"),
                );
                Err(err.into())
            }
        }
    }

    /// Delete a user record.
    ///
    /// # Errors
    ///
    /// Policy errors on rejection, `UserNotFound` when the id is unknown,
    /// store failures otherwise.
    pub fn drop_user(&self, id: &str) -> Result<(), AuthError> {
        self.check_id(id, LoginEvent::Unregistration)?;
        self.check_limit(id, LoginEvent::Unregistration, self.limiter.on_deletion(id))?;

        let deleted = {
            let _guard = self.lock();
            self.store.delete(id)
        };
        if let Err(err) = deleted {
            self.audit(
                id,
                LogLevel::Warning,
                LoginEvent::Unregistration,
                &format!("unable to remove user record: {err}"),
            );
            return Err(err.into());
        }

        self.audit(id, LogLevel::Event, LoginEvent::Unregistration, "user closed");
        Ok(())
    }
}
