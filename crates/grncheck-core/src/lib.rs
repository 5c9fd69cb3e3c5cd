//! grncheck-core — shared library for the grncheck log diagnostics tools.
//!
//! Provides:
//! - `model` — parsed log records (general-log entries, query statistics)
//! - `parser` — general-log and query-log line parsers, input routing
//! - `crash` — process lifecycle tracking and unflushed-write detection
//! - `regression` — old/new workload comparison with slow-path classification
//! - `report` — plain-text report writers
//! - `fmt` — shared formatting helpers (timestamps, milliseconds, ratios)

pub mod crash;
pub mod fmt;
pub mod model;
pub mod parser;
pub mod regression;
pub mod report;
