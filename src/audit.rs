//! Append-only audit trail
//!
//! Every corrective action a reconciler takes is recorded as one line:
//! an RFC 3339 UTC timestamp, the reconciler name in brackets, and a JSON
//! object describing the event with the full row payload. Lines are also
//! emitted through `tracing` under the `safeguard::audit` target.

use crate::store::value::Row;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One auditable event
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A transient row about to be pruned
    RowDeleted { table: String, row: Row },
    RowsPruned {
        table: String,
        logged: usize,
        removed: u64,
    },
    PruneHeartbeat { table: String },
    DriftAdded { table: String, key: String, row: Row },
    DriftRemoved { table: String, key: String, row: Row },
    DriftModified {
        table: String,
        key: String,
        changed: Vec<String>,
        current: Row,
        baseline: Row,
    },
    RestoreCommitted { table: String, actions: usize },
    RestoreRolledBack { table: String, reason: String },
    FileCopied {
        source: PathBuf,
        target: PathBuf,
        reason: String,
    },
    FileDeleted { path: PathBuf },
}

enum Sink {
    File(File),
    Memory(Vec<String>),
    Disabled,
}

/// Audit log handle for a single reconciler
#[derive(Clone)]
pub struct AuditLog {
    name: Arc<str>,
    sink: Arc<Mutex<Sink>>,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog").field("name", &self.name).finish()
    }
}

impl AuditLog {
    /// Open (or create) `path` in append mode, creating parent directories.
    pub fn open(name: &str, path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_sink(name, Sink::File(file)))
    }

    /// Keep lines in memory; read them back with [`AuditLog::lines`].
    pub fn in_memory(name: &str) -> Self {
        Self::with_sink(name, Sink::Memory(Vec::new()))
    }

    /// Only forward events to `tracing`
    pub fn disabled(name: &str) -> Self {
        Self::with_sink(name, Sink::Disabled)
    }

    fn with_sink(name: &str, sink: Sink) -> Self {
        Self {
            name: Arc::from(name),
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// A handle on the same sink that records under `name`.
    pub fn for_reconciler(&self, name: &str) -> Self {
        Self {
            name: Arc::from(name),
            sink: Arc::clone(&self.sink),
        }
    }

    /// Append one event. A failing sink is reported through `tracing` and
    /// never interrupts the caller.
    pub fn record(&self, event: &AuditEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                warn!(reconciler = %self.name, error = %e, "Failed to serialize audit event");
                return;
            }
        };
        info!(target: "safeguard::audit", reconciler = %self.name, "{}", payload);

        let line = format!(
            "{} [{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            self.name,
            payload
        );
        let mut sink = self.sink.lock();
        match &mut *sink {
            Sink::File(file) => {
                // Each line goes out in a single write.
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                if let Err(e) = file.write_all(&bytes).and_then(|_| file.flush()) {
                    warn!(reconciler = %self.name, error = %e, "Failed to append audit line");
                }
            }
            Sink::Memory(lines) => lines.push(line),
            Sink::Disabled => {}
        }
    }

    /// Lines recorded by an in-memory log; empty for other sinks
    pub fn lines(&self) -> Vec<String> {
        match &*self.sink.lock() {
            Sink::Memory(lines) => lines.clone(),
            _ => Vec::new(),
        }
    }
}
