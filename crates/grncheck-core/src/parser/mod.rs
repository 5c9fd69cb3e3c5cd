//! Log file readers and line parsers.
//!
//! Two physical formats share one timestamp convention:
//!
//! - general log: `2017-07-19 14:41:47.428000|n|14823: grn_init: <7.0.4>`
//! - query log:   `2017-07-19 14:41:50.213837|0x7fff5bf27220|>select --table Site`
//!
//! Lines that do not match are skipped, not errors; only I/O failures
//! surface, as a single "source unavailable" condition.

pub mod general;
pub mod query;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::warn;

use crate::model::{GeneralLogEntry, Statistic};

/// Error type for log source failures.
///
/// Parse problems inside a readable file never produce this; any read
/// failure makes the whole source unavailable.
#[derive(Debug)]
pub enum SourceError {
    Io { path: PathBuf, source: io::Error },
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io { path, source } => {
                write!(f, "source unavailable: {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SourceError {}

/// Input paths routed by detected format.
#[derive(Debug, Default)]
pub struct LogPaths {
    pub general: Vec<PathBuf>,
    pub query: Vec<PathBuf>,
}

/// Number of leading lines sampled to detect a file's format.
const SAMPLE_LINES: usize = 10;

/// Routes each input file to the general-log or query-log set by
/// sampling its first lines. Files matching neither format are ignored
/// with a warning.
pub fn classify_paths(paths: &[PathBuf]) -> Result<LogPaths, SourceError> {
    let mut routed = LogPaths::default();
    for path in paths {
        let file = open(path)?;
        let mut is_query = false;
        let mut is_general = false;
        for line in BufReader::new(file).lines().take(SAMPLE_LINES) {
            let line = line.map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
            if query::is_statistic_line(&line) {
                is_query = true;
                break;
            }
            if general::is_log_line(&line) {
                is_general = true;
                break;
            }
        }
        if is_query {
            routed.query.push(path.clone());
        } else if is_general {
            routed.general.push(path.clone());
        } else {
            warn!("unrecognized log format, skipping: {}", path.display());
        }
    }
    Ok(routed)
}

/// Reads one general-log file into entries, in file order.
pub fn read_general_entries(path: &Path) -> Result<Vec<GeneralLogEntry>, SourceError> {
    let file = open(path)?;
    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(entry) = general::parse_line(&line) {
            entries.push(entry);
        }
    }
    Ok(entries)
}

/// Reads query-log files into completed statistics, in completion order.
///
/// A single parser spans all paths so a command whose lines cross a file
/// boundary (log rotation) still assembles.
pub fn read_statistics(paths: &[PathBuf]) -> Result<Vec<Statistic>, SourceError> {
    let mut parser = query::QueryLogParser::new();
    let mut statistics = Vec::new();
    for path in paths {
        let file = open(path)?;
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| SourceError::Io {
                path: path.clone(),
                source,
            })?;
            if let Some(statistic) = parser.parse_line(&line) {
                statistics.push(statistic);
            }
        }
    }
    Ok(statistics)
}

fn open(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses the shared `YYYY-MM-DD HH:MM:SS[.ffffff]` timestamp field.
pub(crate) fn parse_timestamp(field: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S%.6f")
        .or_else(|_| NaiveDateTime::parse_from_str(field, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
