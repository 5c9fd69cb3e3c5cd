//! General (server) log line parser.
//!
//! Format: `<timestamp>|<level-char>|[<pid>: ]<message>`. The message
//! may itself contain `|`, so the line is split at most twice.

use crate::model::{GeneralLogEntry, LogLevel};

/// Quick format check used to route input files.
pub fn is_log_line(line: &str) -> bool {
    let mut fields = line.splitn(3, '|');
    let ts_ok = fields
        .next()
        .and_then(super::parse_timestamp)
        .is_some();
    let level_ok = fields
        .next()
        .is_some_and(|f| f.len() == 1 && f.chars().next().and_then(LogLevel::from_code).is_some());
    ts_ok && level_ok && fields.next().is_some()
}

/// Parses one general-log line. Returns `None` for lines in any other
/// format (continuation lines, other tools' output, blank lines).
pub fn parse_line(line: &str) -> Option<GeneralLogEntry> {
    let mut fields = line.splitn(3, '|');
    let timestamp = super::parse_timestamp(fields.next()?)?;

    let level_field = fields.next()?;
    let mut codes = level_field.chars();
    let code = codes.next()?;
    if codes.next().is_some() {
        return None;
    }
    let level = LogLevel::from_code(code)?;

    let (pid, message) = split_pid(fields.next()?);
    Some(GeneralLogEntry {
        pid,
        timestamp,
        level,
        message: message.to_string(),
    })
}

/// Splits the optional `<pid>: ` prefix off the message body.
fn split_pid(body: &str) -> (u32, &str) {
    let digits_end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    if digits_end > 0 && body[digits_end..].starts_with(':') {
        if let Ok(pid) = body[..digits_end].parse() {
            return (pid, body[digits_end + 1..].trim_start());
        }
    }
    (0, body.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_init_line() {
        let line = "2017-07-19 14:41:47.428000|n|14823: grn_init: <7.0.4-57-g5e4b4b7>";
        let entry = parse_line(line).unwrap();
        assert_eq!(entry.pid, 14823);
        assert_eq!(entry.level, LogLevel::Notice);
        assert_eq!(entry.message, "grn_init: <7.0.4-57-g5e4b4b7>");
        assert_eq!(
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
            "2017-07-19 14:41:47.428000"
        );
    }

    #[test]
    fn test_parse_fin_line() {
        let line = "2017-07-19 15:02:01.000000|n|14823: grn_fin (0)";
        let entry = parse_line(line).unwrap();
        assert_eq!(entry.pid, 14823);
        assert_eq!(entry.message, "grn_fin (0)");
    }

    #[test]
    fn test_parse_line_without_pid() {
        let line = "2017-07-19 14:41:47.428000|e|out of memory";
        let entry = parse_line(line).unwrap();
        assert_eq!(entry.pid, 0);
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "out of memory");
    }

    #[test]
    fn test_message_may_contain_pipes() {
        let line = "2017-07-19 14:41:47.428000|n|123: filter |a|b| applied";
        let entry = parse_line(line).unwrap();
        assert_eq!(entry.message, "filter |a|b| applied");
    }

    #[test]
    fn test_rejects_unknown_level_code() {
        assert!(parse_line("2017-07-19 14:41:47.428000|z|123: hello").is_none());
    }

    #[test]
    fn test_rejects_non_log_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("plain text").is_none());
        assert!(parse_line("2017-07-19 14:41:50.213837|0x7fff|>select").is_none());
    }

    #[test]
    fn test_is_log_line() {
        assert!(is_log_line(
            "2017-07-19 14:41:47.428000|n|14823: grn_init: <7.0.4>"
        ));
        assert!(!is_log_line(
            "2017-07-19 14:41:50.213837|0x7fff|>select --table Site"
        ));
        assert!(!is_log_line("random"));
    }
}
