//! Server process lifecycle tracking over the general log.
//!
//! A process that logs a start marker and never logs a finish marker —
//! whether superseded by a restart of the same pid or simply absent at
//! end of stream — is considered crashed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::model::GeneralLogEntry;

/// What a general-log message means for process lifecycle.
///
/// Classification happens exactly once per entry; everything downstream
/// works on this closed set instead of re-matching message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralLogEvent {
    /// The server initialized (`grn_init: ...`).
    ServerStart,
    /// The server finished cleanly (`grn_fin (N)`, N = leaked objects).
    ServerFinish { n_leaks: u32 },
    /// Any other message from a known or unknown process.
    Heartbeat,
}

/// Classifies one general-log message.
pub fn classify(message: &str) -> GeneralLogEvent {
    if message.starts_with("grn_init:") {
        return GeneralLogEvent::ServerStart;
    }
    if let Some(rest) = message.strip_prefix("grn_fin (") {
        if let Some(digits) = rest.strip_suffix(')') {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(n_leaks) = digits.parse() {
                    return GeneralLogEvent::ServerFinish { n_leaks };
                }
            }
        }
    }
    GeneralLogEvent::Heartbeat
}

/// One server process observed in the general log.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerProcess {
    pub pid: u32,
    pub start_time: NaiveDateTime,
    /// Timestamp of the last entry seen from this pid.
    pub last_time: NaiveDateTime,
    /// The log file the start marker came from.
    pub log_path: PathBuf,
}

/// Informational note: a clean exit reported leaked objects.
#[derive(Debug, Clone, PartialEq)]
pub struct LeakNotice {
    pub pid: u32,
    pub n_leaks: u32,
    pub timestamp: NaiveDateTime,
}

/// Tracks running processes and collects those that never exit cleanly.
pub struct ProcessTracker {
    running: HashMap<u32, ServerProcess>,
    crashed: Vec<ServerProcess>,
    leaks: Vec<LeakNotice>,
}

impl Default for ProcessTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTracker {
    pub fn new() -> Self {
        Self {
            running: HashMap::new(),
            crashed: Vec::new(),
            leaks: Vec::new(),
        }
    }

    /// Consumes one general-log entry. Entries must arrive in timestamp
    /// order; `log_path` is the file the entry was read from.
    pub fn observe(&mut self, log_path: &Path, entry: &GeneralLogEntry) {
        if entry.level.is_error_class() {
            debug!(
                pid = entry.pid,
                level = entry.level.as_str(),
                message = %entry.message,
                "error-level log entry"
            );
        }

        match classify(&entry.message) {
            GeneralLogEvent::ServerStart => {
                // A second start marker for a running pid means the
                // first instance died without a finish marker.
                if let Some(process) = self.running.remove(&entry.pid) {
                    self.crashed.push(process);
                }
                self.running.insert(
                    entry.pid,
                    ServerProcess {
                        pid: entry.pid,
                        start_time: entry.timestamp,
                        last_time: entry.timestamp,
                        log_path: log_path.to_path_buf(),
                    },
                );
            }
            GeneralLogEvent::ServerFinish { n_leaks } => {
                // Clean exit regardless of leak count; the count is an
                // informational side note.
                self.running.remove(&entry.pid);
                if n_leaks > 0 {
                    self.leaks.push(LeakNotice {
                        pid: entry.pid,
                        n_leaks,
                        timestamp: entry.timestamp,
                    });
                }
            }
            GeneralLogEvent::Heartbeat => {
                if let Some(process) = self.running.get_mut(&entry.pid) {
                    process.last_time = entry.timestamp;
                }
            }
        }
    }

    /// Closes the stream: every still-running process joins the crash
    /// list. Returns crashes in detection order (end-of-stream survivors
    /// sorted by start time for deterministic output) and leak notices.
    pub fn finish(mut self) -> (Vec<ServerProcess>, Vec<LeakNotice>) {
        let mut survivors: Vec<ServerProcess> = self.running.into_values().collect();
        survivors.sort_by_key(|p| (p.start_time, p.pid));
        self.crashed.extend(survivors);
        (self.crashed, self.leaks)
    }
}
