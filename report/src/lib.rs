//! Report generation for attack results
//!
//! This crate renders a [`FleetResult`] as:
//!
//! - Human-readable text
//! - A CSV row, optionally preceded by a header
//! - A JSON object
//!
//! Text is always written and carries the failure counts when some bees
//! failed. The machine-readable modes are suppressed with a warning unless
//! every bee succeeded, so downstream tooling never ingests partial numbers.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bees_core::FleetResult;

pub mod machine;
pub mod text;

pub use text::{write_fleet_status, write_text};

// ============================================================================
// Output Mode
// ============================================================================

/// How an attack result is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Labeled lines for humans
    #[default]
    Text,
    /// One CSV data row
    Csv,
    /// CSV header followed by one data row
    Csvh,
    /// One JSON object
    Json,
}

impl OutputMode {
    /// Returns the identifier string for this mode.
    pub fn id(&self) -> &'static str {
        match self {
            OutputMode::Text => "text",
            OutputMode::Csv => "csv",
            OutputMode::Csvh => "csvh",
            OutputMode::Json => "json",
        }
    }

    /// Whether output in this mode is meant for other programs
    pub fn is_machine_readable(&self) -> bool {
        !matches!(self, OutputMode::Text)
    }

    /// Returns all supported modes.
    pub fn all() -> &'static [OutputMode] {
        &[
            OutputMode::Text,
            OutputMode::Csv,
            OutputMode::Csvh,
            OutputMode::Json,
        ]
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputMode::Text),
            "csv" => Ok(OutputMode::Csv),
            "csvh" | "csv-header" => Ok(OutputMode::Csvh),
            "json" => Ok(OutputMode::Json),
            _ => Err(format!("Unknown output type: {}", s)),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

/// What [`render`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendered {
    /// The report was written
    Written,
    /// Nothing was written because some bees failed
    Suppressed,
}

/// Report writing errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write `result` to `out` in `mode`, applying the suppression rule
pub fn render<W: Write>(
    mode: OutputMode,
    result: &FleetResult,
    out: &mut W,
) -> Result<Rendered, ReportError> {
    if mode.is_machine_readable() && !result.valid {
        tracing::warn!(
            mode = %mode,
            failed = result.summary.failed(),
            total = result.summary.total,
            "Not all bees succeeded; suppressing machine-readable output"
        );
        return Ok(Rendered::Suppressed);
    }

    match mode {
        OutputMode::Text => text::write_text(result, out)?,
        OutputMode::Csv => machine::write_csv(result, false, out)?,
        OutputMode::Csvh => machine::write_csv(result, true, out)?,
        OutputMode::Json => machine::write_json(result, out)?,
    }
    Ok(Rendered::Written)
}
