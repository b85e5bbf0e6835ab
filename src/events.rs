//! Audit event sink contract and the built-in console/file sinks.
//!
//! Sinks are best-effort: a failing sink logs through `tracing` and never
//! propagates an error into the operation that produced the event.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// A regular, successful outcome.
    Event,
    /// Policy or validation rejection.
    Warning,
    /// The operation could not be completed internally.
    Critical,
    /// System failure.
    Fault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginEvent {
    Login,
    Registration,
    Verification,
    Logoff,
    Unregistration,
    Updating,
    Renewal,
    System,
}

impl LoginEvent {
    fn tag(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Registration => "registration",
            Self::Verification => "verification",
            Self::Logoff => "logoff",
            Self::Unregistration => "unregistration",
            Self::Updating => "updating",
            Self::Renewal => "renewal",
            Self::System => "system",
        }
    }
}

/// Receives one structured audit event per terminal outcome of a login
/// management operation. Must never fail upward.
pub trait EventSink: Send + Sync {
    fn report(&self, user_id: &str, level: LogLevel, event: LoginEvent, message: &str);
}

/// Emits audit events through `tracing`.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn report(&self, user_id: &str, level: LogLevel, event: LoginEvent, message: &str) {
        match level {
            LogLevel::Event => info!(user = user_id, event = event.tag(), "{message}"),
            LogLevel::Warning => warn!(user = user_id, event = event.tag(), "{message}"),
            LogLevel::Critical | LogLevel::Fault => {
                error!(user = user_id, event = event.tag(), "{message}");
            }
        }
    }
}

/// Appends JSON lines to one file per day (`access-YYYY-MM-DD.log`).
#[derive(Debug)]
pub struct FileSink {
    dir: PathBuf,
    // Serializes appends so concurrent events keep one line each.
    guard: Mutex<()>,
}

impl FileSink {
    /// Create the sink, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            guard: Mutex::new(()),
        })
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let name = format!("access-{}.log", Utc::now().format("%Y-%m-%d"));
        let _guard = self
            .guard
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(name))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")
    }
}

impl EventSink for FileSink {
    fn report(&self, user_id: &str, level: LogLevel, event: LoginEvent, message: &str) {
        let line = json!({
            "time": Utc::now().to_rfc3339(),
            "user": user_id,
            "level": level,
            "event": event,
            "message": message,
        })
        .to_string();
        if let Err(err) = self.append(&line) {
            // Logging failure is not a correctness failure.
            error!(user = user_id, event = event.tag(), "audit sink write failed: {err}");
        }
    }
}
