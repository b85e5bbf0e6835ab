//! In-memory backend for tests and embedded deployments.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use chrono::Utc;

use crate::record::{Profile, UserRecord};
use crate::store::tickets::{TicketRegistry, DEFAULT_RECYCLING_SPAN};
use crate::store::{StoreError, UserStore};

#[derive(Debug)]
pub struct MemoryStore<P> {
    users: RwLock<HashMap<String, UserRecord<P>>>,
    tickets: Mutex<TicketRegistry>,
}

impl<P> MemoryStore<P> {
    pub fn new() -> Self {
        Self::with_recycling_span(DEFAULT_RECYCLING_SPAN)
    }

    pub fn with_recycling_span(recycling_span: i64) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            tickets: Mutex::new(TicketRegistry::new(recycling_span, Utc::now().timestamp())),
        }
    }
}

impl<P> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Profile> UserStore<P> for MemoryStore<P> {
    fn insert(&self, record: &UserRecord<P>) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&record.id) {
            return Err(StoreError::Duplicate);
        }
        users.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn select(&self, id: &str) -> Result<UserRecord<P>, StoreError> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.get(id).cloned().ok_or(StoreError::NotFound)
    }

    fn update(&self, record: &UserRecord<P>) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users.remove(id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    fn ban(&self, ticket: &str, expiration: i64) -> Result<(), StoreError> {
        let mut tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        tickets.ban(ticket, expiration, Utc::now().timestamp())
    }

    fn is_rejected(&self, ticket: &str) -> bool {
        let mut tickets = self.tickets.lock().unwrap_or_else(PoisonError::into_inner);
        tickets.is_rejected(ticket, Utc::now().timestamp())
    }
}
