//! Human-readable output

use std::io::{self, Write};

use bees_core::{BeeInstance, FleetResult};

/// Write the labeled summary, annotated with failure counts when needed
pub fn write_text<W: Write>(result: &FleetResult, out: &mut W) -> io::Result<()> {
    let m = &result.metrics;
    let summary = &result.summary;

    if !result.valid {
        writeln!(
            out,
            "     {} of {} bees failed (timeouts: {}, transport errors: {}, parse errors: {}).",
            summary.failed(),
            summary.total,
            summary.timed_out,
            summary.transport_errors,
            summary.parse_errors
        )?;
        writeln!(
            out,
            "     Results below cover the {} bees that reported.",
            summary.succeeded
        )?;
    }

    writeln!(out, "Concurrency Level:\t{:.0}", m.concurrency)?;
    writeln!(out, "Complete requests:\t{:.0}", m.complete_requests)?;
    writeln!(out, "Failed requests:\t{:.0}", m.failed_requests)?;
    writeln!(out, "Non-2xx responses:\t{:.0}", m.non_2xx_responses)?;
    writeln!(out, "Total Transferred:\t{:.0} bytes", m.total_transferred)?;
    writeln!(out, "Requests per second:\t{:.6} [#/sec] (mean)", m.requests_per_second)?;
    writeln!(out, "Time per request:\t{:.6} [ms] (mean)", m.ms_per_request)?;

    let percentiles = [
        ("50", m.percentiles.p50),
        ("75", m.percentiles.p75),
        ("90", m.percentiles.p90),
        ("95", m.percentiles.p95),
        ("99", m.percentiles.p99),
    ];
    for (pct, value) in percentiles {
        writeln!(out, "{pct}% response time:\t{value:.6} [ms] (mean)")?;
    }

    // max across bees, not fleet wall-clock
    writeln!(out, "Longest bee run:\t{:.3} seconds", m.time_taken)?;

    Ok(())
}

/// Write one line per bee: id, state and address
pub fn write_fleet_status<W: Write>(instances: &[BeeInstance], out: &mut W) -> io::Result<()> {
    for bee in instances {
        writeln!(
            out,
            "Bee {}: {} @ {}",
            bee.id,
            bee.state,
            bee.address.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}
