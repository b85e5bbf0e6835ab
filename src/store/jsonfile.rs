//! File-per-record JSON backend.
//!
//! Each user lives in `<dir>/<id>.json`. Insert uniqueness rides on
//! `create_new`, so two concurrent inserts of the same id resolve to exactly
//! one winner at the filesystem level. The ticket deny-list is in-memory,
//! matching the backend's single-process use.

use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;

use crate::record::{Profile, UserRecord};
use crate::store::tickets::{TicketRegistry, DEFAULT_RECYCLING_SPAN};
use crate::store::{StoreError, UserStore};

#[derive(Debug)]
pub struct JsonFileStore<P> {
    dir: PathBuf,
    tickets: Mutex<TicketRegistry>,
    _profile: PhantomData<fn() -> P>,
}

impl<P> JsonFileStore<P> {
    /// Open (and create if missing) the record directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_recycling_span(dir, DEFAULT_RECYCLING_SPAN)
    }

    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_recycling_span(
        dir: impl Into<PathBuf>,
        recycling_span: i64,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            tickets: Mutex::new(TicketRegistry::new(recycling_span, Utc::now().timestamp())),
            _profile: PhantomData,
        })
    }

    fn path(&self, id: &str) -> Result<PathBuf, StoreError> {
        // Ids become file names; anything that could escape the directory is
        // rejected here regardless of manager-level quality control.
        if id.is_empty()
            || id.starts_with('.')
            || id.contains('/')
            || id.contains('\\')
            || id.contains('\0')
        {
            return Err(StoreError::InvalidKey);
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl<P: Profile> UserStore<P> for JsonFileStore<P> {
    fn insert(&self, record: &UserRecord<P>) -> Result<(), StoreError> {
        let path = self.path(&record.id)?;
        let data = serde_json::to_vec_pretty(record)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|err| {
                if err.kind() == ErrorKind::AlreadyExists {
                    StoreError::Duplicate
                } else {
                    StoreError::Io(err)
                }
            })?;
        file.write_all(&data)?;
        Ok(())
    }

    fn select(&self, id: &str) -> Result<UserRecord<P>, StoreError> {
        let path = self.path(id)?;
        let data = fs::read(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound
            } else {
                StoreError::Io(err)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn update(&self, record: &UserRecord<P>) -> Result<(), StoreError> {
        let path = self.path(&record.id)?;
        let data = serde_json::to_vec_pretty(record)?;
        // Open-existing, so a delete racing this write cannot resurrect
        // the record through a stale exists() answer.
        let mut file = fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StoreError::NotFound
                } else {
                    StoreError::Io(err)
                }
            })?;
        file.write_all(&data)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let path = self.path(id)?;
        fs::remove_file(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StoreError::NotFound
            } else {
                StoreError::Io(err)
            }
        })
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
