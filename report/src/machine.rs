//! Machine-readable output
//!
//! Callers go through [`render`](crate::render), which withholds these
//! formats when any bee failed.

use std::io::Write;

use bees_core::{FleetResult, MetricRecord};

use crate::ReportError;

/// Write the aggregate as one CSV row, with the header first if asked
pub fn write_csv<W: Write>(
    result: &FleetResult,
    with_header: bool,
    out: &mut W,
) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    if with_header {
        writer.write_record(MetricRecord::FIELDS)?;
    }
    writer.write_record(result.metrics.values().iter().map(|v| v.to_string()))?;
    writer.flush()?;
    Ok(())
}

/// Write the whole result (metrics, validity and outcome counts) as JSON
pub fn write_json<W: Write>(result: &FleetResult, out: &mut W) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(&mut *out, result)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::result;

    #[test]
    fn test_csv_row_only() {
        let mut out = Vec::new();
        write_csv(&result(true), false, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("193,24.544,75000,"));
    }

    #[test]
    fn test_csv_with_header() {
        let mut out = Vec::new();
        write_csv(&result(true), true, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "concurrency,time_taken,complete_requests,failed_requests,non_2xx_responses,\
             total_transferred,requests_per_second,ms_per_request,p50,p75,p90,p95,p99"
        );
        assert_eq!(lines.next().unwrap().split(',').count(), MetricRecord::FIELDS.len());
    }

    #[test]
    fn test_json_object() {
        let mut out = Vec::new();
        write_json(&result(true), &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["valid"], true);
        assert_eq!(value["metrics"]["complete_requests"], 75000.0);
        assert_eq!(value["metrics"]["p99"], 169.0);
        assert_eq!(value["summary"]["succeeded"], 3);
    }
}
