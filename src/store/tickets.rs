//! Deny-list of revoked tickets with amortized garbage collection.
//!
//! Tokens are valid by default; only an explicit logout adds an entry here,
//! so the table stays small under normal expiry-driven churn. Eviction runs
//! opportunistically on ticket-touching calls instead of a background timer.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::store::StoreError;

/// Seconds between opportunistic flushes.
pub const DEFAULT_RECYCLING_SPAN: i64 = 60;

/// Forward map `ticket -> expiration` plus a reverse index
/// `expiration -> tickets` so eviction can walk expirations in ascending
/// order and stop at the first still-future entry.
///
/// Callers pass `now` explicitly; backends feed wall-clock time.
#[derive(Debug)]
pub struct TicketRegistry {
    tickets: HashMap<String, i64>,
    by_expiration: BTreeMap<i64, HashSet<String>>,
    recycling_span: i64,
    touched: i64,
}

impl TicketRegistry {
    pub fn new(recycling_span: i64, now: i64) -> Self {
        Self {
            tickets: HashMap::new(),
            by_expiration: BTreeMap::new(),
            recycling_span,
            touched: now,
        }
    }

    /// Ban a ticket until `expiration`.
    ///
    /// # Errors
    ///
    /// Returns `Expired` when the expiration is not in the future; such a
    /// ticket would fail the expiry check anyway.
    pub fn ban(&mut self, ticket: &str, expiration: i64, now: i64) -> Result<(), StoreError> {
        if expiration <= now {
            return Err(StoreError::Expired);
        }
        self.autoflush(now);
        self.tickets.insert(ticket.to_string(), expiration);
        self.by_expiration
            .entry(expiration)
            .or_default()
            .insert(ticket.to_string());
        Ok(())
    }

    pub fn is_rejected(&mut self, ticket: &str, now: i64) -> bool {
        self.autoflush(now);
        self.tickets.contains_key(ticket)
    }

    /// Run `flush` at most once per recycling span.
    fn autoflush(&mut self, now: i64) {
        if now - self.touched >= self.recycling_span {
            self.flush(now);
            self.touched = now;
        }
    }

    /// Drop every entry whose expiration is at or before `now`.
    pub fn flush(&mut self, now: i64) {
        // Ascending walk; everything past `now` stays untouched.
        let expired: Vec<i64> = self.by_expiration.range(..=now).map(|(at, _)| *at).collect();
        for at in expired {
            if let Some(set) = self.by_expiration.remove(&at) {
                for ticket in set {
                    self.tickets.remove(&ticket);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}
