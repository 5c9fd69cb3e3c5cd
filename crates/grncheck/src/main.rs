//! grncheck - Groonga operational log diagnostics.
//!
//! Two subcommands over already-captured log files:
//! - `crash` — find server processes that never exited cleanly and the
//!   writes they issued but never flushed.
//! - `regression` — compare two query-log captures of the same workload
//!   and report queries that got slower.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use tracing::{Level, debug, info, warn};
use tracing_subscriber::EnvFilter;

use grncheck_core::crash::{ProcessTracker, analyze_crashes};
use grncheck_core::parser;
use grncheck_core::regression::{Comparator, RegressionConfig};
use grncheck_core::report;

/// Groonga operational log diagnostics.
#[derive(Parser)]
#[command(name = "grncheck", about = "Groonga operational log diagnostics", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output path for the report. '-' means standard output.
    #[arg(long, global = true, default_value = "-")]
    output: String,
}

#[derive(Subcommand)]
enum Command {
    /// Diagnose crashed server processes and their unflushed writes.
    Crash {
        /// General and query log files, in timestamp order.
        /// The format of each file is detected from its leading lines.
        #[arg(required = true, value_name = "LOG")]
        logs: Vec<PathBuf>,
    },
    /// Compare two captures of the same workload for regressions.
    Regression {
        /// Old query log file, or a directory of *.log files.
        #[arg(long, value_name = "PATH")]
        old: PathBuf,

        /// New query log file, or a directory of *.log files.
        #[arg(long, value_name = "PATH")]
        new: PathBuf,

        /// Minimum percent change to report a query.
        #[arg(long, default_value_t = RegressionConfig::default().slow_response_ratio)]
        slow_response_ratio: f64,

        /// Minimum absolute slowdown in seconds to report a query.
        #[arg(long, default_value_t = RegressionConfig::default().slow_response_threshold)]
        slow_response_threshold: f64,

        /// Minimum percent change to report an operation.
        #[arg(long, default_value_t = RegressionConfig::default().slow_operation_ratio)]
        slow_operation_ratio: f64,

        /// Minimum absolute slowdown in seconds to report an operation.
        #[arg(long, default_value_t = RegressionConfig::default().slow_operation_threshold)]
        slow_operation_threshold: f64,
    },
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("grncheck={}", level).parse().unwrap())
        .add_directive(format!("grncheck_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    // Interruption is a clean abort: stop between phases, no error output.
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupted.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
            warn!("Failed to set Ctrl-C handler: {}", e);
        }
    }

    let result = match &args.command {
        Command::Crash { logs } => run_crash(logs, &args.output, &interrupted),
        Command::Regression {
            old,
            new,
            slow_response_ratio,
            slow_response_threshold,
            slow_operation_ratio,
            slow_operation_threshold,
        } => {
            let config = RegressionConfig {
                slow_response_ratio: *slow_response_ratio,
                slow_response_threshold: *slow_response_threshold,
                slow_operation_ratio: *slow_operation_ratio,
                slow_operation_threshold: *slow_operation_threshold,
            };
            run_regression(old, new, config, &args.output, &interrupted)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_crash(
    logs: &[PathBuf],
    output: &str,
    interrupted: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    let routed = parser::classify_paths(logs)?;
    debug!(
        "routed inputs: {} general log(s), {} query log(s)",
        routed.general.len(),
        routed.query.len()
    );

    let mut tracker = ProcessTracker::new();
    for path in &routed.general {
        if interrupted.load(Ordering::SeqCst) {
            return Ok(());
        }
        let entries = parser::read_general_entries(path)?;
        debug!("{}: {} general log entries", path.display(), entries.len());
        for entry in &entries {
            tracker.observe(path, entry);
        }
    }
    let (crashed, leaks) = tracker.finish();
    info!("found {} crashed process(es)", crashed.len());

    if interrupted.load(Ordering::SeqCst) {
        return Ok(());
    }
    let statistics = parser::read_statistics(&routed.query)?;
    debug!("{} query log statistics", statistics.len());

    let reports = analyze_crashes(crashed, &statistics);

    let mut out = open_output(output)?;
    report::write_crash_reports(&mut out, &reports, &leaks)?;
    out.flush()?;
    Ok(())
}

fn run_regression(
    old: &Path,
    new: &Path,
    config: RegressionConfig,
    output: &str,
    interrupted: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    let comparator = Comparator::new(config)?;

    let old_statistics = parser::read_statistics(&expand_input(old)?)?;
    let new_statistics = parser::read_statistics(&expand_input(new)?)?;
    info!(
        "comparing {} old against {} new statistics",
        old_statistics.len(),
        new_statistics.len()
    );

    if interrupted.load(Ordering::SeqCst) {
        return Ok(());
    }
    let slow_queries = comparator.compare(&old_statistics, &new_statistics)?;
    info!("{} slow quer(ies)", slow_queries.len());

    let mut out = open_output(output)?;
    report::write_regression_report(&mut out, &slow_queries)?;
    out.flush()?;
    Ok(())
}

/// Expands a query-log input: a file stands alone, a directory
/// contributes its `*.log` files in name order.
fn expand_input(path: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if path.is_dir() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
            .collect();
        paths.sort();
        Ok(paths)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(format!("input path does not exist: {}", path.display()).into())
    }
}

/// Opens the report destination; '-' is standard output.
fn open_output(path: &str) -> io::Result<Box<dyn Write>> {
    if path == "-" {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(BufWriter::new(File::create(path)?)))
    }
}
