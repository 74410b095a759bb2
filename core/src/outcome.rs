//! Per-worker outcomes and their classification

use serde::{Deserialize, Serialize};

use crate::metrics::MetricRecord;
use crate::roster::WorkerTarget;

/// What one worker's task produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// Benchmark ran and its output parsed
    Success(MetricRecord),
    /// Task exceeded its time limit or was cancelled
    Timeout,
    /// Connect, authentication or I/O failure
    TransportError(String),
    /// Output present but the required measures were missing
    ParseError(String),
}

impl Outcome {
    /// Whether this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// The record, for successes
    pub fn record(&self) -> Option<&MetricRecord> {
        match self {
            Outcome::Success(record) => Some(record),
            _ => None,
        }
    }

    /// Short category label for logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Timeout => "timeout",
            Outcome::TransportError(_) => "transport error",
            Outcome::ParseError(_) => "parse error",
        }
    }
}

/// An outcome tagged with the worker that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    /// The worker
    pub target: WorkerTarget,
    /// What it produced
    pub outcome: Outcome,
}

/// Counts per outcome category
///
/// The single place that decides whether an attack fully succeeded; both
/// the text report and the machine-readable reports rely on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    /// Workers dispatched
    pub total: usize,
    /// Workers that produced a record
    pub succeeded: usize,
    /// Workers that timed out
    pub timed_out: usize,
    /// Workers lost to transport failures
    pub transport_errors: usize,
    /// Workers whose output could not be parsed
    pub parse_errors: usize,
}

impl OutcomeSummary {
    /// Count outcomes per category
    pub fn classify<'a, I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = &'a Outcome>,
    {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut summary, outcome| {
                summary.total += 1;
                match outcome {
                    Outcome::Success(_) => summary.succeeded += 1,
                    Outcome::Timeout => summary.timed_out += 1,
                    Outcome::TransportError(_) => summary.transport_errors += 1,
                    Outcome::ParseError(_) => summary.parse_errors += 1,
                }
                summary
            })
    }

    /// Count the outcomes of a dispatched attack
    pub fn from_workers(outcomes: &[WorkerOutcome]) -> Self {
        Self::classify(outcomes.iter().map(|w| &w.outcome))
    }

    /// Workers that did not succeed
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    /// Whether every dispatched worker succeeded
    ///
    /// False for an empty attack: nothing was measured.
    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }
}

/// The records of the successful workers, in dispatch order
pub fn successes(outcomes: &[WorkerOutcome]) -> Vec<MetricRecord> {
    outcomes
        .iter()
        .filter_map(|w| w.outcome.record().copied())
        .collect()
}
