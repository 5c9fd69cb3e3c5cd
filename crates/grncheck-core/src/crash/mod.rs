//! Crash diagnosis: correlate crashed server processes with pending
//! unflushed writes observed in the query log.
//!
//! The general log drives a [`ProcessTracker`] that collects processes
//! which never exited cleanly. For each crash, the query-log statistics
//! inside `[start_time, last_time]` are replayed through a fresh
//! [`FlushTracker`]; whatever is still pending when the window closes
//! was issued but never confirmed durable before the process died.

pub mod flush;
pub mod lifecycle;

pub use flush::FlushTracker;
pub use lifecycle::{GeneralLogEvent, LeakNotice, ProcessTracker, ServerProcess, classify};

use crate::model::Statistic;

/// One crashed process with its unflushed writes.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashReport {
    pub process: ServerProcess,
    /// Writes still pending when the crash window closed, in arrival order.
    pub unflushed: Vec<Statistic>,
}

/// Replays the time-ordered statistics through one fresh tracker per
/// crash.
///
/// Statistics before the window are skipped; the first statistic past
/// `last_time` stops the scan outright (entries at exactly `last_time`
/// are still included, later ones are never evaluated). State never
/// carries across crashes.
pub fn analyze_crashes(crashed: Vec<ServerProcess>, statistics: &[Statistic]) -> Vec<CrashReport> {
    crashed
        .into_iter()
        .map(|process| {
            let mut tracker = FlushTracker::new();
            for statistic in statistics {
                if statistic.start_time < process.start_time {
                    continue;
                }
                if statistic.start_time > process.last_time {
                    break;
                }
                tracker.observe(statistic);
            }
            CrashReport {
                process,
                unflushed: tracker.into_pending(),
            }
        })
        .collect()
}
