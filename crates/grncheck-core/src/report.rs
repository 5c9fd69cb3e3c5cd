//! Plain-text report writers.
//!
//! All analysis output goes through these; the engines themselves never
//! print. Writers take any `io::Write` so the CLI can point them at
//! stdout or a file.

use std::io::{self, Write};

use crate::crash::{CrashReport, LeakNotice};
use crate::fmt::{elapsed_summary, iso8601};
use crate::regression::SlowQuery;

/// Writes leak notices and crash summaries with their unflushed-write
/// blocks.
///
/// Layout per crash:
///
/// ```text
/// [pid=14823, start=2017-07-19T14:41:47.428000, log=groonga.log]
/// Unflushed statistics in [2017-07-19T14:41:47.428000, 2017-07-19T14:55:00.000000]
/// 2017-07-19T14:41:50.213837: load --table Site
/// ```
pub fn write_crash_reports<W: Write>(
    out: &mut W,
    reports: &[CrashReport],
    leaks: &[LeakNotice],
) -> io::Result<()> {
    for leak in leaks {
        writeln!(
            out,
            "Leaked: [pid={}, n_leaks={}, time={}]",
            leak.pid,
            leak.n_leaks,
            iso8601(&leak.timestamp)
        )?;
    }

    for report in reports {
        let process = &report.process;
        writeln!(
            out,
            "[pid={}, start={}, log={}]",
            process.pid,
            iso8601(&process.start_time),
            process.log_path.display()
        )?;

        if report.unflushed.is_empty() {
            continue;
        }
        writeln!(
            out,
            "Unflushed statistics in [{}, {}]",
            iso8601(&process.start_time),
            iso8601(&process.last_time)
        )?;
        for statistic in &report.unflushed {
            writeln!(
                out,
                "{}: {}",
                iso8601(&statistic.start_time),
                statistic.raw_command
            )?;
        }
    }
    Ok(())
}

/// Writes the regression report, one block per slow query, worst first.
///
/// ```text
/// Query: select --table Site
///   Before(average): 100 (msec) After(average): 250 (msec) Ratio: (+150.00%)
///   Operations:
///     Operation: filter Before(average): 80 (msec) After(average): 230 (msec) Ratio: (+187.50%)
/// ```
pub fn write_regression_report<W: Write>(out: &mut W, slow_queries: &[SlowQuery]) -> io::Result<()> {
    for slow_query in slow_queries {
        writeln!(out, "Query: {}", slow_query.query)?;
        writeln!(
            out,
            "  {}",
            elapsed_summary(
                slow_query.ratio,
                slow_query.old_avg_nsec,
                slow_query.new_avg_nsec
            )
        )?;
        writeln!(out, "  Operations:")?;
        for operation in &slow_query.operations {
            writeln!(
                out,
                "    Operation: {} {}",
                operation.name,
                elapsed_summary(
                    operation.ratio,
                    operation.old_avg_nsec,
                    operation.new_avg_nsec
                )
            )?;
        }
    }
    Ok(())
}
