//! Parsed log records shared by the crash and regression analyses.

use chrono::NaiveDateTime;
use serde::Serialize;

/// Severity level of a general-log entry.
///
/// Groonga encodes the level as a single character in the second
/// `|`-separated field of each log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
    Dump,
}

impl LogLevel {
    /// Maps the one-character level code used in the log format.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'E' => Some(LogLevel::Emergency),
            'A' => Some(LogLevel::Alert),
            'C' => Some(LogLevel::Critical),
            'e' => Some(LogLevel::Error),
            'w' => Some(LogLevel::Warning),
            'n' => Some(LogLevel::Notice),
            'i' => Some(LogLevel::Info),
            'd' => Some(LogLevel::Debug),
            '-' => Some(LogLevel::Dump),
            _ => None,
        }
    }

    /// True for levels that indicate a problem (emergency..warning).
    pub fn is_error_class(self) -> bool {
        self <= LogLevel::Warning
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Emergency => "emergency",
            LogLevel::Alert => "alert",
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Dump => "dump",
        }
    }
}

/// One line of the general (server) log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralLogEntry {
    /// Process id; 0 when the log line carries none.
    pub pid: u32,
    pub timestamp: NaiveDateTime,
    pub level: LogLevel,
    pub message: String,
}

/// One timed step inside a query execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    pub name: String,
    /// Elapsed time since the start of the command, in nanoseconds.
    pub relative_elapsed_nsec: i64,
}

/// One completed command from the query log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistic {
    pub start_time: NaiveDateTime,
    /// Total elapsed time of the command, in nanoseconds.
    pub elapsed_nsec: i64,
    /// The command exactly as logged (arguments included).
    pub raw_command: String,
    /// The command name (`select`, `load`, `io_flush`, ...).
    pub command_name: String,
    pub operations: Vec<Operation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_codes_round_trip() {
        assert_eq!(LogLevel::from_code('n'), Some(LogLevel::Notice));
        assert_eq!(LogLevel::from_code('E'), Some(LogLevel::Emergency));
        assert_eq!(LogLevel::from_code('-'), Some(LogLevel::Dump));
        assert_eq!(LogLevel::from_code('x'), None);
    }

    #[test]
    fn test_error_class_levels() {
        assert!(LogLevel::Emergency.is_error_class());
        assert!(LogLevel::Warning.is_error_class());
        assert!(!LogLevel::Notice.is_error_class());
        assert!(!LogLevel::Debug.is_error_class());
    }

    #[test]
    fn test_statistic_serializes_with_timestamp() {
        use chrono::NaiveDate;

        let statistic = Statistic {
            start_time: NaiveDate::from_ymd_opt(2017, 7, 19)
                .unwrap()
                .and_hms_micro_opt(14, 41, 50, 213837)
                .unwrap(),
            elapsed_nsec: 1_000,
            raw_command: "load --table Site".to_string(),
            command_name: "load".to_string(),
            operations: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&statistic).unwrap(),
            "{\"start_time\":\"2017-07-19T14:41:50.213837\",\
             \"elapsed_nsec\":1000,\
             \"raw_command\":\"load --table Site\",\
             \"command_name\":\"load\",\
             \"operations\":[]}"
        );
    }
}
