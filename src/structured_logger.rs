//! Structured JSONL logger for debugging and event reconstruction.
//!
//! This module provides machine-parseable logging with:
//! - Monotonic sequence numbers for ordering
//! - ISO 8601 timestamps with microsecond precision
//! - Session and run IDs for correlation
//! - Structured event data in JSON format

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::state_machine::{StateCommand, StateEvent};

/// Structured JSONL logger for debugging and event reconstruction.
pub struct StructuredLogger {
    session_id: String,
    run_id: AtomicU64,
    seq: AtomicU64,
    log_file: Option<Mutex<File>>,
    log_path: Option<PathBuf>,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique across entire session)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    /// Session ID
    pub session_id: String,
    /// Run ID (increments on every resume of the session)
    pub run_id: u64,
    /// Component that emitted the log
    pub component: String,
    /// Structured event data
    pub event: Value,
}

impl StructuredLogger {
    /// Creates a new structured logger for the given session.
    ///
    /// Logs are appended to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The logs directory cannot be created
    /// - The log file cannot be opened
    pub fn new(session_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            session_id: session_id.to_string(),
            run_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            log_file: Some(Mutex::new(file)),
            log_path: Some(log_path),
        })
    }

    /// A logger that keeps sequence numbers but writes nowhere.
    pub fn discard(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            run_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            log_file: None,
            log_path: None,
        }
    }

    /// Increments the run ID (called when a session is resumed).
    pub fn increment_run_id(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event.
    ///
    /// The event is serialized to JSON and written as a single line.
    /// Write failures are ignored. This method is thread-safe.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            session_id: self.session_id.clone(),
            run_id: self.run_id.load(Ordering::SeqCst),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        let Some(log_file) = &self.log_file else {
            return;
        };
        if let Ok(mut file) = log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    /// Logs a state machine command.
    pub fn log_command(&self, command_seq: u64, command: &StateCommand) {
        self.log(
            "StateMachine",
            serde_json::json!({
                "type": "Command",
                "command_seq": command_seq,
                "command": command.name(),
            }),
        );
    }

    /// Logs a state machine event.
    pub fn log_event(&self, command_seq: u64, event: &StateEvent) {
        self.log(
            "StateMachine",
            serde_json::json!({
                "type": "Event",
                "command_seq": command_seq,
                "event": event,
            }),
        );
    }

    /// Logs a pipeline stage completion.
    pub fn log_stage(&self, stage: &str, outcome: &str) {
        self.log(
            "Pipeline",
            serde_json::json!({
                "type": "StageComplete",
                "stage": stage,
                "outcome": outcome,
            }),
        );
    }

    /// Logs a stage that fell back instead of producing its expected result.
    pub fn log_degradation(&self, stage: &str, reason: &str) {
        self.log(
            "Pipeline",
            serde_json::json!({
                "type": "Degraded",
                "stage": stage,
                "reason": reason,
            }),
        );
    }

    /// Logs a collaborator invocation and whether it succeeded.
    pub fn log_collaborator_call(&self, collaborator: &str, purpose: &str, success: bool) {
        self.log(
            "Collaborator",
            serde_json::json!({
                "type": "Call",
                "collaborator": collaborator,
                "purpose": purpose,
                "success": success,
            }),
        );
    }

    /// Returns the path to the log file, if the logger writes to disk.
    pub fn path(&self) -> Option<&PathBuf> {
        self.log_path.as_ref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
