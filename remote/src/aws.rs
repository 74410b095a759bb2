//! Thin async wrapper around the `aws` command line tool

use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;

/// Failure running an `aws` subcommand
#[derive(Debug, Error)]
pub enum AwsError {
    /// The binary could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was invoked
        program: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// The call ran and exited non-zero
    #[error("aws {subcommand} failed: {stderr}")]
    Failed {
        /// Service and operation, e.g. "ec2 run-instances"
        subcommand: String,
        /// What the tool printed on stderr
        stderr: String,
    },
}

impl AwsError {
    /// Whether the call failed because the addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            AwsError::Failed { stderr, .. } => {
                stderr.contains("Not Found") || stderr.contains("(404)") || stderr.contains("NoSuchKey")
            }
            AwsError::Spawn { .. } => false,
        }
    }
}

/// Invokes `aws` with a fixed region and JSON output
#[derive(Debug, Clone)]
pub struct AwsCli {
    program: String,
    region: String,
}

impl AwsCli {
    /// CLI bound to `region`
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            program: "aws".to_string(),
            region: region.into(),
        }
    }

    /// Use a different executable, such as a credential-wrapping script
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Region every call is bound to
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Full argument list for one call
    pub fn args<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut full = vec!["--region", self.region.as_str(), "--output", "json"];
        full.extend_from_slice(args);
        full
    }

    /// Run one call and return its trimmed stdout
    pub async fn run(&self, args: &[&str]) -> Result<String, AwsError> {
        let subcommand = args.iter().take(2).copied().collect::<Vec<_>>().join(" ");
        tracing::debug!(program = %self.program, %subcommand, region = %self.region, "Calling aws");

        let output = Command::new(&self.program)
            .args(self.args(args))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| AwsError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AwsError::Failed {
                subcommand,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
