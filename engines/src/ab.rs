//! ApacheBench (`ab`) engine
//!
//! `ab` prints its summary on stdout:
//!
//! ```text
//! Concurrency Level:      93
//! Time taken for tests:   9.663 seconds
//! Complete requests:      12500
//! Failed requests:        0
//! Total transferred:      2062500 bytes
//! Requests per second:    1293.53 [#/sec] (mean)
//! Time per request:       71.896 [ms] (mean)
//!
//! Percentage of the requests served within a certain time (ms)
//!   50%     69
//!   ...
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use bees_core::{
    shell_quote, AttackTarget, CommandSpec, Engine, EngineError, MetricRecord, Percentiles,
    RawOutput,
};

use crate::measure::{measure, measure_or};

static MS_PER_REQUEST: Lazy<Regex> =
    Lazy::new(|| labeled(r"Time per request:\s+([0-9.]+) \[ms\] \(mean\)"));
static CONCURRENCY: Lazy<Regex> = Lazy::new(|| labeled(r"Concurrency Level:\s+([0-9]+)"));
static REQUESTS_PER_SECOND: Lazy<Regex> =
    Lazy::new(|| labeled(r"Requests per second:\s+([0-9.]+) \[#/sec\] \(mean\)"));
static TIME_TAKEN: Lazy<Regex> =
    Lazy::new(|| labeled(r"Time taken for tests:\s+([0-9.]+) seconds"));
static COMPLETE: Lazy<Regex> = Lazy::new(|| labeled(r"Complete requests:\s+([0-9]+)"));
static FAILED: Lazy<Regex> = Lazy::new(|| labeled(r"Failed requests:\s+([0-9]+)"));
static NON_2XX: Lazy<Regex> = Lazy::new(|| labeled(r"Non-2xx responses:\s+([0-9]+)"));
static TRANSFERRED: Lazy<Regex> = Lazy::new(|| labeled(r"Total transferred:\s+([0-9]+)"));

static P50: Lazy<Regex> = Lazy::new(|| percentile_row(50));
static P75: Lazy<Regex> = Lazy::new(|| percentile_row(75));
static P90: Lazy<Regex> = Lazy::new(|| percentile_row(90));
static P95: Lazy<Regex> = Lazy::new(|| percentile_row(95));
static P99: Lazy<Regex> = Lazy::new(|| percentile_row(99));

// Patterns are literals, exercised by the tests below.
fn labeled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("ab label pattern must compile")
}

fn percentile_row(pct: u8) -> Regex {
    labeled(&format!(r"(?m)^\s*{pct}%\s+([0-9]+)"))
}

/// Engine driving ApacheBench
#[derive(Debug, Clone, Copy, Default)]
pub struct AbEngine;

impl AbEngine {
    /// Engine name used in the registry and on the command line
    pub const NAME: &'static str = "ab";

    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl Engine for AbEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn build_command(&self, spec: &CommandSpec) -> Result<String, EngineError> {
        if spec.requests == 0 || spec.concurrency == 0 {
            return Err(EngineError::InvalidParameters {
                engine: Self::NAME.into(),
                reason: "requests and concurrency must be positive".into(),
            });
        }
        if spec.concurrency > spec.requests {
            return Err(EngineError::InvalidParameters {
                engine: Self::NAME.into(),
                reason: format!(
                    "cannot hold {} connections for {} requests",
                    spec.concurrency, spec.requests
                ),
            });
        }

        let mut cmd = vec![
            "ab".to_string(),
            "-r".to_string(),
            format!("-n {}", spec.requests),
            format!("-c {}", spec.concurrency),
        ];
        if spec.keepalive {
            cmd.push("-k".to_string());
        }
        cmd.push(match &spec.target {
            AttackTarget::Url(url) => format!("\"{url}\""),
            // ab takes a single URL: attack the first one in the file
            AttackTarget::UrlFile { remote_path } => {
                format!("\"$(head -n 1 {})\"", shell_quote(remote_path))
            }
        });

        Ok(cmd.join(" "))
    }

    fn parse(&self, output: &RawOutput) -> Option<MetricRecord> {
        let text = output.stdout.as_str();

        let Some(ms_per_request) = measure(&MS_PER_REQUEST, text) else {
            tracing::debug!(bytes = text.len(), "ab output has no mean time per request");
            return None;
        };

        Some(MetricRecord {
            concurrency: measure_or(&CONCURRENCY, text, 0.0),
            time_taken: measure_or(&TIME_TAKEN, text, 0.0),
            complete_requests: measure_or(&COMPLETE, text, 0.0),
            failed_requests: measure_or(&FAILED, text, 0.0),
            non_2xx_responses: measure_or(&NON_2XX, text, 0.0),
            total_transferred: measure_or(&TRANSFERRED, text, 0.0),
            requests_per_second: measure_or(&REQUESTS_PER_SECOND, text, 0.0),
            ms_per_request,
            percentiles: Percentiles::new(
                measure_or(&P50, text, 0.0),
                measure_or(&P75, text, 0.0),
                measure_or(&P90, text, 0.0),
                measure_or(&P95, text, 0.0),
                measure_or(&P99, text, 0.0),
            ),
        })
    }
}
