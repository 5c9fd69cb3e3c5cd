//! Query performance regression comparison.
//!
//! Compares two query-log captures of the identical workload (old run
//! vs new run), groups positionally matched statistics by raw command,
//! averages elapsed times, ranks by signed percent change and keeps
//! only the queries (and operations) that exceed both a relative and an
//! absolute slowdown threshold.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::Statistic;

/// Nanoseconds per second, as f64 for threshold arithmetic.
pub const NSEC_IN_SECONDS: f64 = 1_000_000_000.0;

/// Thresholds for slow-path classification.
///
/// A query is reported when its ratio is at least `slow_response_ratio`
/// percent AND its average slowed down by at least
/// `slow_response_threshold` seconds; the same dual check applies per
/// operation with the `slow_operation_*` fields. The absolute floor
/// guards against tiny-absolute noise, the relative floor against
/// large-absolute but proportionally small changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionConfig {
    /// Minimum percent change for a query to be slow. Default 0.
    pub slow_response_ratio: f64,
    /// Minimum absolute slowdown in seconds for a query. Default 0.2.
    pub slow_response_threshold: f64,
    /// Minimum percent change for an operation to be slow. Default 10.
    pub slow_operation_ratio: f64,
    /// Minimum absolute slowdown in seconds for an operation. Default 0.1.
    pub slow_operation_threshold: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            slow_response_ratio: 0.0,
            slow_response_threshold: 0.2,
            slow_operation_ratio: 10.0,
            slow_operation_threshold: 0.1,
        }
    }
}

impl RegressionConfig {
    /// Rejects non-finite thresholds up front so classification never
    /// runs on nonsense configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("slow-response-ratio", self.slow_response_ratio),
            ("slow-response-threshold", self.slow_response_threshold),
            ("slow-operation-ratio", self.slow_operation_ratio),
            ("slow-operation-threshold", self.slow_operation_threshold),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }
        Ok(())
    }
}

/// Invalid threshold configuration.
#[derive(Debug)]
pub enum ConfigError {
    NotFinite { field: &'static str, value: f64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFinite { field, value } => {
                write!(f, "{} must be a finite number, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Comparison failure on malformed group data.
#[derive(Debug)]
pub enum RegressionError {
    /// A group's samples disagree on operation-list shape, so positional
    /// per-operation averaging is meaningless.
    RaggedOperations { query: String },
}

impl std::fmt::Display for RegressionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegressionError::RaggedOperations { query } => {
                write!(f, "inconsistent operation lists for query: {}", query)
            }
        }
    }
}

impl std::error::Error for RegressionError {}

/// One operation that exceeded both operation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowOperation {
    pub name: String,
    pub ratio: f64,
    pub old_avg_nsec: f64,
    pub new_avg_nsec: f64,
}

/// One query that exceeded both response thresholds, worst first in the
/// comparator's output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowQuery {
    pub query: String,
    /// Signed percent change; positive means slower.
    pub ratio: f64,
    pub old_avg_nsec: f64,
    pub new_avg_nsec: f64,
    /// Only operations flagged slow; may be empty.
    pub operations: Vec<SlowOperation>,
}

/// Signed percent change of the averaged elapsed time.
///
/// Both zero → 0. Old zero with new positive → plus or minus infinity,
/// picked by whether the new average alone clears
/// `slow_response_threshold` seconds. Otherwise `new/old*100 - 100`.
pub fn elapsed_ratio(old_avg_nsec: f64, new_avg_nsec: f64, slow_response_threshold: f64) -> f64 {
    if old_avg_nsec == 0.0 && new_avg_nsec == 0.0 {
        0.0
    } else if old_avg_nsec == 0.0 && new_avg_nsec > 0.0 {
        if new_avg_nsec / NSEC_IN_SECONDS < slow_response_threshold {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        }
    } else {
        new_avg_nsec / old_avg_nsec * 100.0 - 100.0
    }
}

/// Old-run and new-run samples of one query; equal length by
/// construction (both sides grow together).
struct QueryGroup<'a> {
    old: Vec<&'a Statistic>,
    new: Vec<&'a Statistic>,
}

struct RankedGroup {
    group_index: usize,
    query: String,
    ratio: f64,
    old_avg_nsec: f64,
    new_avg_nsec: f64,
}

/// Positionally averaged operation of one side of a group.
struct OperationAverage {
    name: String,
    avg_nsec: f64,
}

/// Compares old/new runs of the same workload.
pub struct Comparator {
    config: RegressionConfig,
}

impl Comparator {
    pub fn new(config: RegressionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Runs the full comparison and returns slow queries, worst first.
    ///
    /// A new run shorter than the old run means the captures are not
    /// comparable at all; the result is empty, not an error.
    pub fn compare(
        &self,
        old: &[Statistic],
        new: &[Statistic],
    ) -> Result<Vec<SlowQuery>, RegressionError> {
        if new.len() < old.len() {
            return Ok(Vec::new());
        }

        let groups = group_by_command(old, new);

        let mut ranked: Vec<RankedGroup> = groups
            .iter()
            .enumerate()
            .map(|(group_index, (query, group))| {
                let old_avg_nsec = average_elapsed(&group.old);
                let new_avg_nsec = average_elapsed(&group.new);
                RankedGroup {
                    group_index,
                    query: query.clone(),
                    ratio: elapsed_ratio(
                        old_avg_nsec,
                        new_avg_nsec,
                        self.config.slow_response_threshold,
                    ),
                    old_avg_nsec,
                    new_avg_nsec,
                }
            })
            .collect();

        // Worst regressions first; ties keep first-seen order.
        ranked.sort_by(|a, b| {
            b.ratio
                .partial_cmp(&a.ratio)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut slow_queries = Vec::new();
        for entry in ranked {
            if !self.slow_response(entry.old_avg_nsec, entry.new_avg_nsec) {
                continue;
            }

            let (_, group) = &groups[entry.group_index];
            let ragged = || RegressionError::RaggedOperations {
                query: entry.query.clone(),
            };
            let old_operations = average_operations(&group.old).ok_or_else(ragged)?;
            let new_operations = average_operations(&group.new).ok_or_else(ragged)?;

            let mut operations = Vec::new();
            for (index, old_operation) in old_operations.iter().enumerate() {
                let new_operation = new_operations.get(index).ok_or_else(ragged)?;
                if self.slow_operation(old_operation.avg_nsec, new_operation.avg_nsec) {
                    operations.push(SlowOperation {
                        name: old_operation.name.clone(),
                        ratio: new_operation.avg_nsec / old_operation.avg_nsec * 100.0 - 100.0,
                        old_avg_nsec: old_operation.avg_nsec,
                        new_avg_nsec: new_operation.avg_nsec,
                    });
                }
            }

            slow_queries.push(SlowQuery {
                query: entry.query,
                ratio: entry.ratio,
                old_avg_nsec: entry.old_avg_nsec,
                new_avg_nsec: entry.new_avg_nsec,
                operations,
            });
        }

        Ok(slow_queries)
    }

    fn slow_response(&self, old_avg_nsec: f64, new_avg_nsec: f64) -> bool {
        let ratio = elapsed_ratio(
            old_avg_nsec,
            new_avg_nsec,
            self.config.slow_response_threshold,
        );
        let elapsed_sec = (new_avg_nsec - old_avg_nsec) / NSEC_IN_SECONDS;
        ratio >= self.config.slow_response_ratio
            && elapsed_sec >= self.config.slow_response_threshold
    }

    fn slow_operation(&self, old_avg_nsec: f64, new_avg_nsec: f64) -> bool {
        let ratio = new_avg_nsec / old_avg_nsec * 100.0 - 100.0;
        let elapsed_sec = (new_avg_nsec - old_avg_nsec) / NSEC_IN_SECONDS;
        ratio >= self.config.slow_operation_ratio
            && elapsed_sec >= self.config.slow_operation_threshold
    }
}

/// A pure cache hit: exactly one operation and it is the cache lookup.
fn is_cache_hit(statistic: &Statistic) -> bool {
    statistic.operations.len() == 1 && statistic.operations[0].name == "cache"
}

/// Builds groups keyed by raw command, in first-seen order.
///
/// Correspondence is positional: index i of the old run pairs with
/// index i of the new run. Cache-only old samples and index pairs whose
/// raw commands differ are not comparable and are skipped.
fn group_by_command<'a>(
    old: &'a [Statistic],
    new: &'a [Statistic],
) -> Vec<(String, QueryGroup<'a>)> {
    let mut groups: Vec<(String, QueryGroup<'a>)> = Vec::new();
    let mut index_by_query: HashMap<&'a str, usize> = HashMap::new();

    for (old_statistic, new_statistic) in old.iter().zip(new) {
        if is_cache_hit(old_statistic) {
            continue;
        }
        if old_statistic.raw_command != new_statistic.raw_command {
            continue;
        }

        let group_index = *index_by_query
            .entry(old_statistic.raw_command.as_str())
            .or_insert_with(|| {
                groups.push((
                    old_statistic.raw_command.clone(),
                    QueryGroup {
                        old: Vec::new(),
                        new: Vec::new(),
                    },
                ));
                groups.len() - 1
            });
        groups[group_index].1.old.push(old_statistic);
        groups[group_index].1.new.push(new_statistic);
    }

    groups
}

fn average_elapsed(samples: &[&Statistic]) -> f64 {
    let total: i64 = samples.iter().map(|s| s.elapsed_nsec).sum();
    total as f64 / samples.len() as f64
}

/// Averages `relative_elapsed_nsec` per operation index, using the
/// first sample's operation list as the name/index template. Returns
/// `None` when a later sample is missing an index the template names.
fn average_operations(samples: &[&Statistic]) -> Option<Vec<OperationAverage>> {
    let template = &samples.first()?.operations;
    let mut averages = Vec::with_capacity(template.len());
    for (index, operation) in template.iter().enumerate() {
        let mut total: i64 = 0;
        for sample in samples {
            total += sample.operations.get(index)?.relative_elapsed_nsec;
        }
        averages.push(OperationAverage {
            name: operation.name.clone(),
            avg_nsec: total as f64 / samples.len() as f64,
        });
    }
    Some(averages)
}
