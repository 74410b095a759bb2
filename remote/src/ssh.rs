//! Remote command execution through the system `ssh` binary
//!
//! Every command runs in its own `ssh` process with batch-mode options, so
//! a "session" is just the resolved argument list for one bee. Child
//! processes are killed when their future is dropped, which is how task
//! timeouts and shutdown reach the remote side.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use bees_core::{Credentials, RawOutput, RemoteSession, RemoteShell, TransportError, WorkerTarget};

/// Exit status `ssh` reserves for its own failures
const SSH_FAILURE_STATUS: i32 = 255;

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens bee sessions with the system `ssh`
#[derive(Debug, Clone)]
pub struct SshShell {
    program: String,
    connect_timeout: Duration,
}

impl Default for SshShell {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl SshShell {
    /// Shell with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Use a different client binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Arguments placed before the remote command
    pub fn base_args(&self, target: &WorkerTarget, credentials: &Credentials) -> Vec<String> {
        let secs = self.connect_timeout.as_secs().max(1);
        vec![
            "-o".into(),
            "BatchMode=yes".into(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            format!("ConnectTimeout={secs}"),
            "-o".into(),
            "ServerAliveInterval=30".into(),
            "-o".into(),
            "ServerAliveCountMax=10".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
            "-i".into(),
            credentials.key_path.to_string_lossy().into_owned(),
            format!("{}@{}", credentials.username, target.address),
        ]
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(
        &self,
        target: &WorkerTarget,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>, TransportError> {
        let mut session = SshSession {
            program: self.program.clone(),
            address: target.address.clone(),
            args: self.base_args(target, credentials),
        };

        // run `true` once so unreachable bees fail as connect errors
        session.exec("true").await?;
        tracing::debug!(worker_id = target.index, address = %target.address, "Bee connected");

        Ok(Box::new(session))
    }
}

/// One bee's command channel
#[derive(Debug)]
pub struct SshSession {
    program: String,
    address: String,
    args: Vec<String>,
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<RawOutput, TransportError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_status = output.status.code();

        if exit_status == Some(SSH_FAILURE_STATUS) {
            return Err(classify_failure(&self.address, &stderr));
        }

        Ok(RawOutput {
            stdout,
            stderr,
            exit_status,
        })
    }
}

/// Map an `ssh` failure to connect or auth
pub fn classify_failure(address: &str, stderr: &str) -> TransportError {
    let detail = stderr.trim().to_string();
    if detail.contains("Permission denied") || detail.contains("Too many authentication failures")
    {
        TransportError::Auth {
            address: address.to_string(),
            detail,
        }
    } else {
        TransportError::Connect {
            address: address.to_string(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> WorkerTarget {
        WorkerTarget {
            id: "i-0a1".into(),
            address: "ec2-54-1-2-3.compute-1.amazonaws.com".into(),
            index: 0,
        }
    }

    #[test]
    fn test_base_args() {
        let shell = SshShell::new().with_connect_timeout(Duration::from_secs(5));
        let creds = Credentials::new("newsapps", "/home/newsapps/.ssh/frontend.pem");
        let args = shell.base_args(&target(), &creds);

        assert!(args.contains(&"ConnectTimeout=5".to_string()));
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
        let key_at = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[key_at + 1], "/home/newsapps/.ssh/frontend.pem");
        assert_eq!(
            args.last().unwrap(),
            "newsapps@ec2-54-1-2-3.compute-1.amazonaws.com"
        );
    }

    #[test]
    fn test_subsecond_timeout_rounds_up() {
        let shell = SshShell::new().with_connect_timeout(Duration::from_millis(200));
        let creds = Credentials::new("newsapps", "/tmp/k.pem");
        assert!(shell
            .base_args(&target(), &creds)
            .contains(&"ConnectTimeout=1".to_string()));
    }

    #[test]
    fn test_classify_auth_failure() {
        let err = classify_failure(
            "10.0.0.1",
            "newsapps@10.0.0.1: Permission denied (publickey).\n",
        );
        assert!(matches!(err, TransportError::Auth { .. }));
    }

    #[test]
    fn test_classify_connect_failure() {
        let err = classify_failure(
            "10.0.0.1",
            "ssh: connect to host 10.0.0.1 port 22: Connection timed out\n",
        );
        match err {
            TransportError::Connect { address, detail } => {
                assert_eq!(address, "10.0.0.1");
                assert!(detail.ends_with("Connection timed out"));
            }
            other => panic!("expected connect error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_client_is_io_error() {
        let shell = SshShell::new().with_program("/nonexistent/ssh-for-bees");
        let creds = Credentials::new("newsapps", "/tmp/k.pem");
        let err = shell.connect(&target(), &creds).await.err().unwrap();
        assert!(matches!(err, TransportError::Io(_)));
    }
}
