//! Audit logging for group membership changes
//!
//! Every mutation that goes through the admin facade produces one JSON line.
//! Entries are always emitted through `tracing` (target `rsgroup::audit`) and
//! optionally appended to a file.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Audit log event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    GroupAdded,
    GroupRemoved,
    ServersMoved,
    TablesMoved,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub event: AuditEventType,
    pub group: String,
    pub members: Vec<String>,
    pub message: String,
}

pub struct AuditLogger {
    file: Option<Mutex<File>>,
}

impl AuditLogger {
    /// Logger that only emits through `tracing`
    pub fn new() -> Self {
        Self { file: None }
    }

    /// Logger that also appends to `path`
    pub fn with_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            file: Some(Mutex::new(file)),
        })
    }

    pub fn log(&self, entry: &AuditEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to serialize audit entry: {}", e);
                return;
            }
        };

        tracing::info!(target: "rsgroup::audit", "{}", line);

        if let Some(file) = &self.file {
            if let Err(e) = writeln!(file.lock(), "{}", line) {
                tracing::warn!("Failed to write audit entry: {}", e);
            }
        }
    }

    pub fn log_event<I, S>(&self, event: AuditEventType, group: &str, members: I, message: impl Into<String>)
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            event,
            group: group.to_string(),
            members: members.into_iter().map(|m| m.to_string()).collect(),
            message: message.into(),
        };
        self.log(&entry);
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
