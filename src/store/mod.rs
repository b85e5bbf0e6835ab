//! Storage contract for user records and revoked tickets.
//!
//! Backends are selected at composition time. Every implementation must be
//! thread-safe on its own: the login manager serializes its own compound
//! sequences, but the store may also be shared by other managers or
//! processes.

use thiserror::Error;

use crate::record::UserRecord;

pub mod jsonfile;
pub mod memory;
pub mod schema;
pub mod tickets;

pub use jsonfile::JsonFileStore;
pub use memory::MemoryStore;
pub use tickets::TicketRegistry;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("ticket already expired")]
    Expired,
    #[error("invalid record key")]
    InvalidKey,
    #[error("encoding failure: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Durable CRUD for user records plus the ticket deny-list.
///
/// `insert` must fail with [`StoreError::Duplicate`] when the id is taken;
/// `select`/`update`/`delete` must fail with [`StoreError::NotFound`] when
/// it is not. A banned ticket must stay rejected until its expiration has
/// passed, after which it may be garbage-collected.
pub trait UserStore<P>: Send + Sync {
    /// # Errors
    ///
    /// `Duplicate` when a record with the same id exists.
    fn insert(&self, record: &UserRecord<P>) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `NotFound` when no record has this id.
    fn select(&self, id: &str) -> Result<UserRecord<P>, StoreError>;

    /// # Errors
    ///
    /// `NotFound` when no record has this id.
    fn update(&self, record: &UserRecord<P>) -> Result<(), StoreError>;

    /// # Errors
    ///
    /// `NotFound` when no record has this id.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Add a ticket to the deny-list until `expiration` (unix seconds).
    ///
    /// # Errors
    ///
    /// `Expired` when the expiration is already in the past.
    fn ban(&self, ticket: &str, expiration: i64) -> Result<(), StoreError>;

    /// Whether a ticket is currently deny-listed.
    fn is_rejected(&self, ticket: &str) -> bool;
}
