//! Siege engine
//!
//! Siege writes its summary to stderr, with sizes in MB and times in
//! seconds. It reports neither non-2xx counts nor latency percentiles; those
//! fields come back as zero.

use once_cell::sync::Lazy;
use regex::Regex;

use bees_core::{
    shell_quote, AttackTarget, CommandSpec, Engine, EngineError, MetricRecord, RawOutput,
};

use crate::measure::{measure, measure_or};

const BYTES_PER_MB: f64 = 1_048_576.0;
const MS_PER_SEC: f64 = 1000.0;

static RESPONSE_TIME: Lazy<Regex> = Lazy::new(|| labeled(r"Response time:\s+([0-9.]+) secs"));
static TRANSACTIONS: Lazy<Regex> = Lazy::new(|| labeled(r"(?m)^Transactions:\s+([0-9]+) hits"));
static FAILED: Lazy<Regex> = Lazy::new(|| labeled(r"(?m)^Failed transactions:\s+([0-9]+)"));
static ELAPSED: Lazy<Regex> = Lazy::new(|| labeled(r"Elapsed time:\s+([0-9.]+) secs"));
static TRANSFERRED: Lazy<Regex> = Lazy::new(|| labeled(r"Data transferred:\s+([0-9.]+) MB"));
static RATE: Lazy<Regex> = Lazy::new(|| labeled(r"Transaction rate:\s+([0-9.]+) trans/sec"));
static CONCURRENCY: Lazy<Regex> = Lazy::new(|| labeled(r"(?m)^Concurrency:\s+([0-9.]+)"));

fn labeled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("siege label pattern must compile")
}

/// Engine driving siege in benchmark mode
#[derive(Debug, Clone, Copy, Default)]
pub struct SiegeEngine;

impl SiegeEngine {
    /// Engine name used in the registry and on the command line
    pub const NAME: &'static str = "siege";

    /// Create the engine
    pub fn new() -> Self {
        Self
    }
}

impl Engine for SiegeEngine {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// Siege repeats `-r` times per simulated user, so the per-worker total
    /// is divided by the concurrency up front.
    fn build_command(&self, spec: &CommandSpec) -> Result<String, EngineError> {
        if spec.concurrency == 0 {
            return Err(EngineError::InvalidParameters {
                engine: Self::NAME.into(),
                reason: "concurrency must be positive".into(),
            });
        }
        let repetitions = spec.requests / spec.concurrency;
        if repetitions == 0 {
            return Err(EngineError::InvalidParameters {
                engine: Self::NAME.into(),
                reason: format!(
                    "{} requests across {} users leaves no repetitions",
                    spec.requests, spec.concurrency
                ),
            });
        }

        let mut cmd = vec![
            "siege".to_string(),
            "-i".to_string(),
            "-b".to_string(),
            format!("-r {repetitions}"),
            format!("-c {}", spec.concurrency),
        ];
        if !spec.keepalive {
            cmd.push("-H \"Connection: close\"".to_string());
        }
        cmd.push(match &spec.target {
            AttackTarget::Url(url) => format!("\"{url}\""),
            AttackTarget::UrlFile { remote_path } => format!("-f {}", shell_quote(remote_path)),
        });
        // the per-hit log goes to stdout; the summary arrives on stderr
        cmd.push("> /dev/null".to_string());

        Ok(cmd.join(" "))
    }

    fn parse(&self, output: &RawOutput) -> Option<MetricRecord> {
        let text = if RESPONSE_TIME.is_match(&output.stderr) {
            output.stderr.as_str()
        } else {
            output.stdout.as_str()
        };

        let Some(response_secs) = measure(&RESPONSE_TIME, text) else {
            tracing::debug!(bytes = text.len(), "siege output has no response time");
            return None;
        };

        Some(MetricRecord {
            concurrency: measure_or(&CONCURRENCY, text, 0.0),
            time_taken: measure_or(&ELAPSED, text, 0.0),
            complete_requests: measure_or(&TRANSACTIONS, text, 0.0),
            failed_requests: measure_or(&FAILED, text, 0.0),
            non_2xx_responses: 0.0,
            total_transferred: measure_or(&TRANSFERRED, text, 0.0) * BYTES_PER_MB,
            requests_per_second: measure_or(&RATE, text, 0.0),
            ms_per_request: response_secs * MS_PER_SEC,
            percentiles: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bees_core::Percentiles;

    const LONG_RUN: &str = "\
** SIEGE 2.70
** Preparing 10 concurrent users for battle.
The server is now under siege...
Lifting the server siege...      done.
Transactions:\t\t        1719 hits
Availability:\t\t      100.00 %
Elapsed time:\t\t       59.22 secs
Data transferred:\t        7.08 MB
Response time:\t\t        0.00 secs
Transaction rate:\t       29.03 trans/sec
Throughput:\t\t        0.12 MB/sec
Concurrency:\t\t        0.04
Successful transactions:        1719
Failed transactions:\t           0
Longest transaction:\t        0.05
Shortest transaction:\t        0.00
";

    const BURST: &str = "\
** SIEGE 3.0.5
** Preparing 100 concurrent users for battle.
The server is now under siege..      done.

Transactions:\t\t       10000 hits
Availability:\t\t      100.00 %
Elapsed time:\t\t        3.65 secs
Data transferred:\t        0.61 MB
Response time:\t\t        0.02 secs
Transaction rate:\t     2739.73 trans/sec
Throughput:\t\t        0.17 MB/sec
Concurrency:\t\t       47.12
Successful transactions:       10000
Failed transactions:\t           0
Longest transaction:\t        0.09
Shortest transaction:\t        0.00
";

    fn spec(requests: usize, concurrency: usize, keepalive: bool) -> CommandSpec {
        CommandSpec {
            requests,
            concurrency,
            keepalive,
            target: AttackTarget::Url("http://www.example.com/".into()),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "expected {expected}, got {actual}");
    }

    #[test]
    fn test_build_command_divides_requests_across_users() {
        let cmd = SiegeEngine.build_command(&spec(100, 10, true)).unwrap();
        assert_eq!(cmd, "siege -i -b -r 10 -c 10 \"http://www.example.com/\" > /dev/null");
    }

    #[test]
    fn test_build_command_without_keepalive_closes_connections() {
        let cmd = SiegeEngine.build_command(&spec(100, 10, false)).unwrap();
        assert_eq!(
            cmd,
            "siege -i -b -r 10 -c 10 -H \"Connection: close\" \"http://www.example.com/\" > /dev/null"
        );
    }

    #[test]
    fn test_build_command_url_file() {
        let mut file_spec = spec(100, 10, true);
        file_spec.target = AttackTarget::UrlFile {
            remote_path: "/tmp/urls.txt".into(),
        };
        let cmd = SiegeEngine.build_command(&file_spec).unwrap();
        assert_eq!(cmd, "siege -i -b -r 10 -c 10 -f '/tmp/urls.txt' > /dev/null");
    }

    #[test]
    fn test_build_command_url_file_name_with_spaces_stays_one_word() {
        let mut file_spec = spec(100, 10, true);
        file_spec.target = AttackTarget::UrlFile {
            remote_path: "/tmp/my urls.txt".into(),
        };
        let cmd = SiegeEngine.build_command(&file_spec).unwrap();
        assert_eq!(cmd, "siege -i -b -r 10 -c 10 -f '/tmp/my urls.txt' > /dev/null");
    }

    #[test]
    fn test_build_command_rejects_fewer_requests_than_users() {
        assert!(matches!(
            SiegeEngine.build_command(&spec(3, 6, false)),
            Err(EngineError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_parse_long_run() {
        let record = SiegeEngine.parse(&RawOutput::from_stderr(LONG_RUN)).unwrap();

        assert_close(record.concurrency, 0.04);
        assert_close(record.time_taken, 59.22);
        assert_close(record.complete_requests, 1719.0);
        assert_close(record.failed_requests, 0.0);
        assert_close(record.non_2xx_responses, 0.0);
        assert_close(record.total_transferred, 7423918.08);
        assert_close(record.requests_per_second, 29.03);
        // a zero mean response time is still a measurement
        assert_close(record.ms_per_request, 0.0);
        assert_eq!(record.percentiles, Percentiles::default());
    }

    #[test]
    fn test_parse_burst() {
        let record = SiegeEngine.parse(&RawOutput::from_stderr(BURST)).unwrap();

        assert_close(record.concurrency, 47.12);
        assert_close(record.time_taken, 3.65);
        assert_close(record.complete_requests, 10000.0);
        assert_close(record.total_transferred, 639631.36);
        assert_close(record.requests_per_second, 2739.73);
        assert_close(record.ms_per_request, 20.0);
    }

    #[test]
    fn test_parse_falls_back_to_stdout() {
        let record = SiegeEngine.parse(&RawOutput::from_stdout(BURST)).unwrap();
        assert_close(record.complete_requests, 10000.0);
    }

    #[test]
    fn test_transactions_label_is_line_anchored() {
        let text = "Response time:\t\t0.01 secs\nSuccessful transactions:       42\n";
        let record = SiegeEngine.parse(&RawOutput::from_stderr(text)).unwrap();
        assert_eq!(record.complete_requests, 0.0);
    }

    #[test]
    fn test_parse_without_response_time_is_none() {
        let text = "[error] socket: unable to connect sock.c:249: Connection refused\n";
        assert!(SiegeEngine.parse(&RawOutput::from_stderr(text)).is_none());
    }
}
