//! Query log parser.
//!
//! A command spans several lines sharing one context id:
//!
//! ```text
//! 2017-07-19 14:41:50.213837|0x7fff5bf27220|>select --table Site
//! 2017-07-19 14:41:50.214838|0x7fff5bf27220|:000000001001000 filter(9)
//! 2017-07-19 14:41:50.216943|0x7fff5bf27220|<000000002112530 rc=0
//! ```
//!
//! `>` opens the command, `:` records one operation with its relative
//! elapsed time, `<` closes it with the total elapsed time. Commands
//! from different contexts interleave freely, so open commands are kept
//! per context until their closing line arrives.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::model::{Operation, Statistic};

/// Quick format check used to route input files.
pub fn is_statistic_line(line: &str) -> bool {
    let mut fields = line.splitn(3, '|');
    let ts_ok = fields
        .next()
        .and_then(super::parse_timestamp)
        .is_some();
    let _context = fields.next();
    ts_ok
        && fields
            .next()
            .and_then(|body| body.chars().next())
            .is_some_and(|c| matches!(c, '>' | ':' | '<'))
}

/// A command that has started but not yet finished.
struct OpenCommand {
    start_time: NaiveDateTime,
    raw_command: String,
    operations: Vec<Operation>,
}

/// Stateful parser assembling statistics from query-log lines.
///
/// Feed lines in file order; a completed [`Statistic`] is returned when
/// its closing line is seen, so output follows completion order.
pub struct QueryLogParser {
    open: HashMap<String, OpenCommand>,
}

impl Default for QueryLogParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryLogParser {
    pub fn new() -> Self {
        Self {
            open: HashMap::new(),
        }
    }

    /// Consumes one line; returns a statistic when a command completes.
    pub fn parse_line(&mut self, line: &str) -> Option<Statistic> {
        let mut fields = line.splitn(3, '|');
        let ts_field = fields.next()?;
        let context = fields.next()?;
        let body = fields.next()?;

        match body.chars().next()? {
            '>' => {
                let start_time = super::parse_timestamp(ts_field)?;
                let raw_command = body[1..].trim().to_string();
                self.open.insert(
                    context.to_string(),
                    OpenCommand {
                        start_time,
                        raw_command,
                        operations: Vec::new(),
                    },
                );
                None
            }
            ':' => {
                let (relative_elapsed_nsec, rest) = parse_elapsed(&body[1..])?;
                let name = operation_name(rest)?;
                if let Some(command) = self.open.get_mut(context) {
                    command.operations.push(Operation {
                        name,
                        relative_elapsed_nsec,
                    });
                }
                None
            }
            '<' => {
                let (elapsed_nsec, _) = parse_elapsed(&body[1..])?;
                let command = self.open.remove(context)?;
                Some(Statistic {
                    start_time: command.start_time,
                    elapsed_nsec,
                    command_name: command_name(&command.raw_command),
                    raw_command: command.raw_command,
                    operations: command.operations,
                })
            }
            _ => None,
        }
    }
}

/// Splits a zero-padded nanosecond counter off the front of `body`.
fn parse_elapsed(body: &str) -> Option<(i64, &str)> {
    let digits_end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    if digits_end == 0 {
        return None;
    }
    let elapsed = body[..digits_end].parse().ok()?;
    Some((elapsed, body[digits_end..].trim_start()))
}

/// Operation name: the token after the counter, stripped of its
/// argument suffix (`filter(9)` → `filter`).
fn operation_name(rest: &str) -> Option<String> {
    let token = rest.split_whitespace().next()?;
    let name = token.split('(').next().unwrap_or(token);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Command name from the raw command text.
///
/// Handles both the command-line form (`select --table Site`) and the
/// HTTP form (`/d/select.json?table=Site`).
fn command_name(raw_command: &str) -> String {
    if let Some(path) = raw_command.strip_prefix('/') {
        let path = path.split('?').next().unwrap_or(path);
        let name = path.rsplit('/').next().unwrap_or(path);
        let name = name.split('.').next().unwrap_or(name);
        name.to_string()
    } else {
        raw_command
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(lines: &[&str]) -> Vec<Statistic> {
        let mut parser = QueryLogParser::new();
        lines
            .iter()
            .filter_map(|line| parser.parse_line(line))
            .collect()
    }

    #[test]
    fn test_assembles_full_command() {
        let statistics = parse_all(&[
            "2017-07-19 14:41:50.213837|0x7fff5bf27220|>select --table Site",
            "2017-07-19 14:41:50.214838|0x7fff5bf27220|:000000001001000 filter(9)",
            "2017-07-19 14:41:50.215843|0x7fff5bf27220|:000000002002000 output(9)",
            "2017-07-19 14:41:50.216943|0x7fff5bf27220|<000000002112530 rc=0",
        ]);
        assert_eq!(statistics.len(), 1);
        let s = &statistics[0];
        assert_eq!(s.raw_command, "select --table Site");
        assert_eq!(s.command_name, "select");
        assert_eq!(s.elapsed_nsec, 2_112_530);
        assert_eq!(s.operations.len(), 2);
        assert_eq!(s.operations[0].name, "filter");
        assert_eq!(s.operations[0].relative_elapsed_nsec, 1_001_000);
        assert_eq!(s.operations[1].name, "output");
    }

    #[test]
    fn test_interleaved_contexts() {
        let statistics = parse_all(&[
            "2017-07-19 14:41:50.100000|0xaaaa|>select --table A",
            "2017-07-19 14:41:50.110000|0xbbbb|>select --table B",
            "2017-07-19 14:41:50.120000|0xbbbb|<000000000010000 rc=0",
            "2017-07-19 14:41:50.130000|0xaaaa|<000000000030000 rc=0",
        ]);
        assert_eq!(statistics.len(), 2);
        assert_eq!(statistics[0].raw_command, "select --table B");
        assert_eq!(statistics[1].raw_command, "select --table A");
    }

    #[test]
    fn test_http_command_name() {
        let statistics = parse_all(&[
            "2017-07-19 14:41:50.100000|0xaaaa|>/d/select.json?table=Site",
            "2017-07-19 14:41:50.130000|0xaaaa|<000000000030000 rc=0",
        ]);
        assert_eq!(statistics[0].command_name, "select");
        assert_eq!(statistics[0].raw_command, "/d/select.json?table=Site");
    }

    #[test]
    fn test_close_without_open_is_skipped() {
        let statistics = parse_all(&["2017-07-19 14:41:50.130000|0xaaaa|<000000000030000 rc=0"]);
        assert!(statistics.is_empty());
    }

    #[test]
    fn test_unfinished_command_yields_nothing() {
        let statistics = parse_all(&[
            "2017-07-19 14:41:50.100000|0xaaaa|>select --table A",
            "2017-07-19 14:41:50.110000|0xaaaa|:000000000005000 filter(1)",
        ]);
        assert!(statistics.is_empty());
    }

    #[test]
    fn test_is_statistic_line() {
        assert!(is_statistic_line(
            "2017-07-19 14:41:50.213837|0x7fff5bf27220|>select --table Site"
        ));
        assert!(is_statistic_line(
            "2017-07-19 14:41:50.214838|0x7fff5bf27220|:000000001001000 filter(9)"
        ));
        assert!(!is_statistic_line(
            "2017-07-19 14:41:47.428000|n|14823: grn_init: <7.0.4>"
        ));
        assert!(!is_statistic_line("random"));
    }
}
