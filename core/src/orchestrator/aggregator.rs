//! Fleet-wide aggregation of per-worker records
//!
//! Each field has a fixed combination rule:
//!
//! | rule          | fields                                                        |
//! |---------------|---------------------------------------------------------------|
//! | sum           | concurrency, complete/failed/non-2xx requests, bytes, req/s   |
//! | max           | time_taken                                                    |
//! | weighted mean | ms_per_request, p50, p75, p90, p95, p99 (weight: completed)   |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{MetricRecord, Percentiles};
use crate::outcome::{successes, OutcomeSummary, WorkerOutcome};

/// Aggregated result of one attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetResult {
    /// Aggregate over the successful workers
    pub metrics: MetricRecord,

    /// True only if every dispatched worker succeeded
    pub valid: bool,

    /// Outcome counts the result was computed from
    pub summary: OutcomeSummary,
}

impl FleetResult {
    /// Classify outcomes and aggregate the successful subset
    pub fn from_outcomes(outcomes: &[WorkerOutcome]) -> Result<Self, AggregationError> {
        let summary = OutcomeSummary::from_workers(outcomes);
        let metrics = aggregate(&successes(outcomes))?;

        Ok(Self {
            metrics,
            valid: summary.all_succeeded(),
            summary,
        })
    }
}

/// Merge per-worker records into one
///
/// `requests_per_second` is the straight sum of the per-worker rates rather
/// than total requests over fleet time; downstream consumers rely on that.
pub fn aggregate(records: &[MetricRecord]) -> Result<MetricRecord, AggregationError> {
    if records.is_empty() {
        return Err(AggregationError::NoRecords);
    }

    let complete_requests = sum_by(records, |r| r.complete_requests);
    if complete_requests <= 0.0 {
        return Err(AggregationError::ZeroWeight {
            records: records.len(),
        });
    }

    let weighted = |f: fn(&MetricRecord) -> f64| {
        sum_by(records, |r| f(r) * r.complete_requests) / complete_requests
    };
    let sum = |f: fn(&MetricRecord) -> f64| sum_by(records, f);

    let time_taken = records
        .iter()
        .map(|r| r.time_taken)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(MetricRecord {
        concurrency: sum(|r| r.concurrency),
        time_taken,
        complete_requests,
        failed_requests: sum(|r| r.failed_requests),
        non_2xx_responses: sum(|r| r.non_2xx_responses),
        total_transferred: sum(|r| r.total_transferred),
        requests_per_second: sum(|r| r.requests_per_second),
        ms_per_request: weighted(|r| r.ms_per_request),
        percentiles: Percentiles {
            p50: weighted(|r| r.percentiles.p50),
            p75: weighted(|r| r.percentiles.p75),
            p90: weighted(|r| r.percentiles.p90),
            p95: weighted(|r| r.percentiles.p95),
            p99: weighted(|r| r.percentiles.p99),
        },
    })
}

fn sum_by(records: &[MetricRecord], f: impl Fn(&MetricRecord) -> f64) -> f64 {
    records.iter().map(f).sum()
}

/// Aggregation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    /// No worker succeeded
    #[error("no successful bees to aggregate")]
    NoRecords,

    /// Every contributing record completed zero requests
    #[error("{records} successful bees completed no requests; weighted means are undefined")]
    ZeroWeight {
        /// Records that contributed
        records: usize,
    },
}
