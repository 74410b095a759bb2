//! Dispatcher execution logic

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::artifact::ArtifactFetch;
use crate::error::BeesResult;
use crate::outcome::{Outcome, OutcomeSummary, WorkerOutcome};
use crate::roster::WorkerTarget;
use crate::traits::{CommandSpec, Credentials, Engine, RemoteShell, TransportError};

use super::task_group::TaskGroup;

/// Dispatcher fans one attack out to every bee
///
/// One task per worker, all in flight at once. The dispatcher waits for
/// every task; a failing bee never aborts its siblings.
pub struct Dispatcher {
    /// Opens command channels (shared across tasks)
    pub(crate) shell: Arc<dyn RemoteShell>,

    /// Builds and parses the benchmark command (shared across tasks)
    pub(crate) engine: Arc<dyn Engine>,

    /// Fleet login material
    pub(crate) credentials: Arc<Credentials>,

    /// Artifact pull each bee runs before attacking
    pub(crate) fetch: Option<ArtifactFetch>,

    /// Per-task limit; `None` waits indefinitely
    pub(crate) task_timeout: Option<Duration>,

    /// Shutdown signal sender
    pub(crate) shutdown_tx: broadcast::Sender<()>,
}

/// Read-only state shared by every task of one run
struct TaskContext {
    shell: Arc<dyn RemoteShell>,
    engine: Arc<dyn Engine>,
    credentials: Arc<Credentials>,
    fetch: Option<ArtifactFetch>,
    command: String,
    task_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a new dispatcher
    ///
    /// Use `DispatcherBuilder` for a more ergonomic construction.
    pub fn new(
        shell: Arc<dyn RemoteShell>,
        engine: Arc<dyn Engine>,
        credentials: Credentials,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            shell,
            engine,
            credentials: Arc::new(credentials),
            fetch: None,
            task_timeout: None,
            shutdown_tx,
        }
    }

    /// Resolve every still-running task as [`Outcome::Timeout`]
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Attack with every target and gather one outcome per target
    ///
    /// Outcomes come back in `targets` order. Fails only if the engine
    /// cannot express `spec`, before anything is dispatched.
    pub async fn run(
        &self,
        targets: &[WorkerTarget],
        spec: &CommandSpec,
    ) -> BeesResult<Vec<WorkerOutcome>> {
        let command = self.engine.build_command(spec)?;

        let start = Instant::now();
        let context = Arc::new(TaskContext {
            shell: Arc::clone(&self.shell),
            engine: Arc::clone(&self.engine),
            credentials: Arc::clone(&self.credentials),
            fetch: self.fetch.clone(),
            command,
            task_timeout: self.task_timeout,
        });

        tracing::info!(
            bees = targets.len(),
            engine = self.engine.name(),
            requests = spec.requests,
            concurrency = spec.concurrency,
            target = %spec.target.describe(),
            timeout = ?self.task_timeout,
            "Organizing the swarm"
        );

        let units: Vec<_> = targets
            .iter()
            .cloned()
            .map(|target| {
                let context = Arc::clone(&context);
                let shutdown = self.shutdown_tx.subscribe();
                async move { attack_with_limits(&context, &target, shutdown).await }
            })
            .collect();

        let results = TaskGroup::new(targets.len()).run(units).await;

        let outcomes: Vec<WorkerOutcome> = targets
            .iter()
            .zip(results)
            .map(|(target, result)| {
                let outcome = result.unwrap_or_else(|e| {
                    tracing::error!(worker_id = target.index, error = %e, "Bee task panicked");
                    Outcome::TransportError(format!("bee task aborted: {e}"))
                });
                WorkerOutcome {
                    target: target.clone(),
                    outcome,
                }
            })
            .collect();

        let summary = OutcomeSummary::from_workers(&outcomes);
        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            succeeded = summary.succeeded,
            timed_out = summary.timed_out,
            transport_errors = summary.transport_errors,
            parse_errors = summary.parse_errors,
            "Offensive complete"
        );

        Ok(outcomes)
    }

    /// Run with Ctrl+C signal handling
    ///
    /// Ctrl+C resolves the bees still attacking as timed out.
    pub async fn run_with_signal_handling(
        &self,
        targets: &[WorkerTarget],
        spec: &CommandSpec,
    ) -> BeesResult<Vec<WorkerOutcome>> {
        let shutdown_tx = self.shutdown_tx.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("Received Ctrl+C, calling off the remaining bees...");
                    let _ = shutdown_tx.send(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run(targets, spec).await;

        signal_handle.abort();

        result
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.engine.name())
            .field("credentials", &self.credentials)
            .field("fetch", &self.fetch)
            .field("task_timeout", &self.task_timeout)
            .finish()
    }
}

async fn attack_with_limits(
    context: &TaskContext,
    target: &WorkerTarget,
    shutdown: broadcast::Receiver<()>,
) -> Outcome {
    let bounded = async {
        match context.task_timeout {
            Some(limit) => match tokio::time::timeout(limit, attack(context, target)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(worker_id = target.index, ?limit, "Bee timed out");
                    Outcome::Timeout
                }
            },
            None => attack(context, target).await,
        }
    };

    tokio::select! {
        outcome = bounded => outcome,
        _ = shutdown_signalled(shutdown) => {
            tracing::warn!(worker_id = target.index, "Bee called off before finishing");
            Outcome::Timeout
        }
    }
}

async fn shutdown_signalled(mut shutdown: broadcast::Receiver<()>) {
    match shutdown.recv().await {
        Ok(()) | Err(RecvError::Lagged(_)) => {}
        // sender gone without a signal: never cancel
        Err(RecvError::Closed) => std::future::pending::<()>().await,
    }
}

/// One bee: connect, pull the artifact, fire, parse
async fn attack(context: &TaskContext, target: &WorkerTarget) -> Outcome {
    tracing::info!(worker_id = target.index, bee = %target.id, "Bee is joining the swarm");

    let mut session = match context.shell.connect(target, &context.credentials).await {
        Ok(session) => session,
        Err(e) => return transport_failure(target, "connect", e),
    };

    if let Some(fetch) = &context.fetch {
        match session.exec(&fetch.command).await {
            Ok(output) if output.succeeded() => {
                tracing::debug!(worker_id = target.index, path = %fetch.remote_path, "Artifact fetched");
            }
            Ok(output) => {
                tracing::warn!(
                    worker_id = target.index,
                    status = ?output.exit_status,
                    "Artifact fetch failed"
                );
                return Outcome::TransportError(format!(
                    "artifact fetch exited with status {:?}: {}",
                    output.exit_status,
                    output.stderr.trim()
                ));
            }
            Err(e) => return transport_failure(target, "artifact fetch", e),
        }
    }

    tracing::info!(worker_id = target.index, "Bee is firing its machine gun. Bang bang!");

    let output = match session.exec(&context.command).await {
        Ok(output) => output,
        Err(e) => return transport_failure(target, "attack", e),
    };

    match context.engine.parse(&output) {
        Some(record) if !record.is_well_formed() => {
            tracing::warn!(worker_id = target.index, ?record, "Bee reported impossible measures");
            Outcome::ParseError(format!(
                "{} output yields negative or non-finite measures",
                context.engine.name()
            ))
        }
        Some(record) => {
            tracing::debug!(
                worker_id = target.index,
                complete_requests = record.complete_requests,
                ms_per_request = record.ms_per_request,
                "Bee reported"
            );
            Outcome::Success(record)
        }
        None => {
            tracing::warn!(
                worker_id = target.index,
                status = ?output.exit_status,
                "Bee output could not be parsed"
            );
            Outcome::ParseError(format!(
                "{} output has no mean time per request (exit status {:?})",
                context.engine.name(),
                output.exit_status
            ))
        }
    }
}

fn transport_failure(target: &WorkerTarget, stage: &str, err: TransportError) -> Outcome {
    tracing::error!(
        worker_id = target.index,
        address = %target.address,
        stage,
        error = %err,
        "Bee lost"
    );
    Outcome::TransportError(format!("{stage}: {err}"))
}
