//! Pending-write state machine.
//!
//! Tracks write-class commands (`load`, `table_*`, `column_*`) that were
//! issued but not yet confirmed durable by an `io_flush`. Anything still
//! pending when a crashed process's window closes is a data-loss risk.

use crate::model::Statistic;

/// Flush state over one crash window (or one run).
///
/// Starts `flushed` with an empty pending list; the pending list is
/// always empty immediately after an `io_flush`.
pub struct FlushTracker {
    flushed: bool,
    pending: Vec<Statistic>,
}

impl Default for FlushTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FlushTracker {
    pub fn new() -> Self {
        Self {
            flushed: true,
            pending: Vec::new(),
        }
    }

    /// Applies one statistic's command to the state machine.
    pub fn observe(&mut self, statistic: &Statistic) {
        match statistic.command_name.as_str() {
            "load" => {
                self.flushed = false;
                self.pending.push(statistic.clone());
            }
            "io_flush" => {
                self.flushed = true;
                self.pending.clear();
            }
            // database_unmap persists loaded records but not schema
            // changes, so only `load` entries leave the pending list.
            "database_unmap" => {
                self.pending.retain(|s| s.command_name != "load");
            }
            name if name.starts_with("table_") || name.starts_with("column_") => {
                self.flushed = false;
                self.pending.push(statistic.clone());
            }
            _ => {}
        }
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Writes issued but never confirmed flushed, in arrival order.
    pub fn pending(&self) -> &[Statistic] {
        &self.pending
    }

    pub fn into_pending(self) -> Vec<Statistic> {
        self.pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2017, 7, 19)
            .unwrap()
            .and_hms_opt(14, 41, sec)
            .unwrap()
    }

    fn stat(sec: u32, command: &str) -> Statistic {
        Statistic {
            start_time: at(sec),
            elapsed_nsec: 1_000,
            raw_command: command.to_string(),
            command_name: command
                .split_whitespace()
                .next()
                .unwrap_or("")
                .to_string(),
            operations: Vec::new(),
        }
    }

    #[test]
    fn test_load_then_flush_ends_flushed_and_empty() {
        let mut tracker = FlushTracker::new();
        tracker.observe(&stat(1, "load --table Site"));
        tracker.observe(&stat(2, "load --table Page"));
        assert!(!tracker.is_flushed());
        assert_eq!(tracker.pending().len(), 2);

        tracker.observe(&stat(3, "io_flush"));
        assert!(tracker.is_flushed());
        assert!(tracker.pending().is_empty());
    }

    #[test]
    fn test_database_unmap_purges_only_loads() {
        let mut tracker = FlushTracker::new();
        tracker.observe(&stat(1, "load --table Site"));
        tracker.observe(&stat(2, "table_create Page"));
        tracker.observe(&stat(3, "database_unmap"));

        assert!(!tracker.is_flushed());
        let pending = tracker.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].command_name, "table_create");
    }

    #[test]
    fn test_table_and_column_commands_are_writes() {
        let mut tracker = FlushTracker::new();
        tracker.observe(&stat(1, "table_create Site"));
        tracker.observe(&stat(2, "column_create Site title"));
        assert!(!tracker.is_flushed());
        assert_eq!(tracker.pending().len(), 2);
    }

    #[test]
    fn test_reads_do_not_change_state() {
        let mut tracker = FlushTracker::new();
        tracker.observe(&stat(1, "select --table Site"));
        tracker.observe(&stat(2, "status"));
        assert!(tracker.is_flushed());
        assert!(tracker.pending().is_empty());
    }

    #[test]
    fn test_pending_keeps_arrival_order() {
        let mut tracker = FlushTracker::new();
        tracker.observe(&stat(1, "load --table A"));
        tracker.observe(&stat(2, "column_create A x"));
        tracker.observe(&stat(3, "load --table B"));
        let commands: Vec<&str> = tracker
            .pending()
            .iter()
            .map(|s| s.raw_command.as_str())
            .collect();
        assert_eq!(
            commands,
            vec!["load --table A", "column_create A x", "load --table B"]
        );
    }
}
