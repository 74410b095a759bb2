//! Canonical benchmark measurements
//!
//! Every engine translates its tool's text output into a [`MetricRecord`];
//! the aggregator only ever sees this shape.

use serde::{Deserialize, Serialize};

/// Text captured from one worker's benchmark command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status of the remote command, if the transport reports one
    pub exit_status: Option<i32>,
}

impl RawOutput {
    /// Output with only stdout populated
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Output with only stderr populated
    pub fn from_stderr(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    /// Whether the remote command reported success
    pub fn succeeded(&self) -> bool {
        matches!(self.exit_status, Some(0) | None)
    }
}

/// Latency percentiles reported by a benchmark tool (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Percentiles {
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl Percentiles {
    /// Build from the five reported values
    pub fn new(p50: f64, p75: f64, p90: f64, p95: f64, p99: f64) -> Self {
        Self {
            p50,
            p75,
            p90,
            p95,
            p99,
        }
    }
}

/// One worker's measurement, or the fleet aggregate of several
///
/// All values are non-negative. Counts are carried as `f64` because the
/// fleet aggregate mixes them with rates and means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricRecord {
    /// Concurrent connections held open by the tool
    pub concurrency: f64,
    /// Wall-clock duration of the run in seconds
    ///
    /// In a fleet aggregate this is the maximum across workers, an
    /// approximation of fleet wall-clock time. Do not aggregate it further.
    pub time_taken: f64,
    /// Requests that completed
    pub complete_requests: f64,
    /// Requests the tool counted as failed
    pub failed_requests: f64,
    /// Responses outside the 2xx range
    pub non_2xx_responses: f64,
    /// Bytes received
    pub total_transferred: f64,
    /// Mean request rate
    ///
    /// In a fleet aggregate this is the straight sum of per-worker rates,
    /// not total requests over elapsed time.
    pub requests_per_second: f64,
    /// Mean time per request in milliseconds
    pub ms_per_request: f64,
    /// Latency percentiles in milliseconds
    #[serde(flatten)]
    pub percentiles: Percentiles,
}

impl MetricRecord {
    /// Column names, in the order used by [`MetricRecord::values`]
    pub const FIELDS: [&'static str; 13] = [
        "concurrency",
        "time_taken",
        "complete_requests",
        "failed_requests",
        "non_2xx_responses",
        "total_transferred",
        "requests_per_second",
        "ms_per_request",
        "p50",
        "p75",
        "p90",
        "p95",
        "p99",
    ];

    /// Field values in [`MetricRecord::FIELDS`] order
    pub fn values(&self) -> [f64; 13] {
        [
            self.concurrency,
            self.time_taken,
            self.complete_requests,
            self.failed_requests,
            self.non_2xx_responses,
            self.total_transferred,
            self.requests_per_second,
            self.ms_per_request,
            self.percentiles.p50,
            self.percentiles.p75,
            self.percentiles.p90,
            self.percentiles.p95,
            self.percentiles.p99,
        ]
    }

    /// Whether every field is finite and non-negative
    pub fn is_well_formed(&self) -> bool {
        self.values().iter().all(|v| v.is_finite() && *v >= 0.0)
    }
}
