//! Command handlers: up, attack, down, report

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use once_cell::sync::Lazy;
use regex::Regex;

use bees_core::{
    Artifact, ArtifactDistributor, ArtifactFetch, AttackConfig, AttackTarget, BeesError,
    BlobStore, DispatcherBuilder, FleetResult, Hive, LaunchRequest, Outcome, Roster, RosterStore,
};
use bees_engines::EngineRegistry;
use bees_remote::{keys, region_of, Ec2Hive, S3BlobStore, SshShell};
use bees_report::{render, write_fleet_status};
use bees_storage::LocalBlobStore;

use super::{AttackArgs, UpArgs};

/// URLs ending in `.something` with no path disorient the bees
static NO_TRAILING_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.*?\.\w+$").expect("trailing slash pattern must compile"));

const STING_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// up
// ============================================================================

pub async fn up(store: &RosterStore, args: &UpArgs) -> Result<()> {
    if store.load()?.is_some() {
        println!("Bees are already assembled and awaiting orders.");
        return Ok(());
    }
    if args.servers == 0 {
        bail!(BeesError::config("at least one bee is needed"));
    }

    keys::require_pem(&args.key)?;

    let region = region_of(&args.zone).to_string();
    tracing::info!(%region, "Connecting to the hive");
    let hive = Ec2Hive::new(region.clone());

    let request = LaunchRequest {
        count: args.servers,
        group: args.group.clone(),
        zone: args.zone.clone(),
        image_id: args.image.clone(),
        key_name: args.key.clone(),
        instance_type: args.instance_type.clone(),
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.yellow} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Calling up {} bees...", args.servers));

    let launched = hive.launch(&request).await;
    spinner.finish_and_clear();
    let instances = launched.context("failed to launch bees")?;

    for bee in &instances {
        println!("Bee {} is ready for the attack.", bee.id);
    }

    let ids: Vec<String> = instances.iter().map(|bee| bee.id.clone()).collect();
    let roster = Roster::new(region, &args.login, &args.key, ids.clone());

    if let Err(e) = store.save(&roster) {
        // an unrecorded fleet can never be stood down; don't leave it running
        tracing::error!(error = %e, "Could not record the swarm; terminating it");
        if let Err(term) = hive.terminate(&ids).await {
            tracing::error!(error = %term, "Failed to terminate unrecorded bees");
        }
        return Err(BeesError::from(e)).context("failed to save the roster");
    }

    println!("The swarm has assembled {} bees.", instances.len());
    Ok(())
}

// ============================================================================
// attack
// ============================================================================

pub async fn attack(store: &RosterStore, args: &AttackArgs) -> Result<()> {
    let roster = store.load()?.ok_or_else(BeesError::no_fleet)?;

    let registry = EngineRegistry::with_defaults();
    let engine = registry.get(&args.engine).map_err(BeesError::from)?;

    let target = resolve_target(args, &roster.region).await?;
    let sting_url = sting_url(args)?;

    tracing::info!("Assembling bees");
    let hive = Ec2Hive::new(roster.region.clone());
    let instances = hive.describe(&roster.workers).await?;
    let targets = roster.targets(&instances);
    if targets.is_empty() {
        return Err(BeesError::no_fleet().into());
    }

    let mut config = AttackConfig::default()
        .with_requests(args.number)
        .with_concurrency(args.concurrent)
        .with_keepalive(args.keepalive)
        .with_engine(engine.name())
        .with_target(target.attack);
    if let Some(secs) = args.timeout {
        config = config.with_task_timeout(Duration::from_secs(secs));
    }
    let plan = config.split(targets.len()).map_err(BeesError::from)?;

    // stdout carries the report; narration goes through the log
    tracing::info!(
        "Each of {} bees will fire {} rounds, {} at a time.",
        plan.workers,
        plan.command.requests,
        plan.command.concurrency
    );

    if !args.no_sting {
        sting(&sting_url).await?;
    }

    let credentials = keys::credentials(&roster.username, &roster.key_name)?;
    let dispatcher = DispatcherBuilder::new()
        .shell(Arc::new(SshShell::new()))
        .engine(engine)
        .credentials(credentials)
        .fetch(target.fetch)
        .task_timeout(plan.task_timeout)
        .build()?;

    let outcomes = dispatcher
        .run_with_signal_handling(&targets, &plan.command)
        .await?;

    for worker in &outcomes {
        match &worker.outcome {
            Outcome::Success(_) => {}
            Outcome::Timeout => tracing::warn!(
                bee = %worker.target.id,
                "Bee {} lost sight of the target (timed out).",
                worker.target.index
            ),
            Outcome::TransportError(detail) | Outcome::ParseError(detail) => tracing::warn!(
                bee = %worker.target.id,
                kind = worker.outcome.label(),
                "Bee {} is out of action: {}",
                worker.target.index,
                detail
            ),
        }
    }

    let result = FleetResult::from_outcomes(&outcomes)
        .map_err(BeesError::from)
        .context("no bees completed the attack")?;

    let stdout = std::io::stdout();
    render(args.output, &result, &mut stdout.lock())?;

    tracing::info!("The swarm is awaiting new orders.");
    Ok(())
}

/// What the bees attack, plus the fetch each bee runs first
struct ResolvedTarget {
    attack: AttackTarget,
    fetch: Option<ArtifactFetch>,
}

async fn resolve_target(args: &AttackArgs, region: &str) -> Result<ResolvedTarget> {
    if let Some(url) = &args.url {
        check_url(url)?;
        return Ok(ResolvedTarget {
            attack: AttackTarget::Url(url.clone()),
            fetch: None,
        });
    }

    let path = args
        .url_file
        .as_deref()
        .ok_or_else(|| BeesError::config("specify either a url with -u or a file with -f"))?;

    let store: Arc<dyn BlobStore> = match (&args.bucket, &args.blob_dir) {
        (Some(bucket), _) => Arc::new(S3BlobStore::new(region, bucket)),
        (None, Some(dir)) => Arc::new(LocalBlobStore::new(dir)),
        // nowhere to stage the file: attack its first URL
        (None, None) => {
            return Ok(ResolvedTarget {
                attack: AttackTarget::Url(first_url(path)?),
                fetch: None,
            })
        }
    };

    let artifact = Artifact::from_path(path)
        .map_err(BeesError::from)
        .with_context(|| format!("could not read url file {}", path.display()))?;
    let fetch = ArtifactDistributor::new(store).stage_or_fail(&artifact).await?;

    Ok(ResolvedTarget {
        attack: AttackTarget::UrlFile {
            remote_path: fetch.remote_path.clone(),
        },
        fetch: Some(fetch),
    })
}

/// Reject URLs that end in `.something` without a trailing slash
pub(crate) fn check_url(url: &str) -> Result<(), BeesError> {
    if NO_TRAILING_SLASH.is_match(url) {
        return Err(BeesError::config(
            "it appears your URL lacks a trailing slash, this will disorient the bees; \
             please try again with a trailing slash",
        ));
    }
    Ok(())
}

/// First non-empty line of a URL file
pub(crate) fn first_url(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("could not open url file {}", path.display()))?;

    for line in BufReader::new(file).lines() {
        let line = line?;
        let url = line.trim();
        if !url.is_empty() {
            return Ok(url.to_string());
        }
    }
    Err(BeesError::config(format!("url file {} is empty", path.display())).into())
}

fn sting_url(args: &AttackArgs) -> Result<String> {
    match (&args.url, &args.url_file) {
        (Some(url), _) => Ok(url.clone()),
        (None, Some(path)) => first_url(path),
        (None, None) => Err(BeesError::config("no target to sting").into()),
    }
}

/// One GET so the target has the page cached for the attack
async fn sting(url: &str) -> Result<()> {
    tracing::info!(%url, "Stinging URL so it will be cached for the attack");

    let client = reqwest::Client::builder()
        .timeout(STING_TIMEOUT)
        .build()
        .context("failed to build http client")?;
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("could not sting {url}"))?;

    tracing::debug!(status = %response.status(), "Target answered the sting");
    Ok(())
}

// ============================================================================
// down / report
// ============================================================================

pub async fn down(store: &RosterStore) -> Result<()> {
    let Some(roster) = store.load()? else {
        println!("No bees have been mobilized.");
        return Ok(());
    };

    tracing::info!("Calling off the swarm");
    let hive = Ec2Hive::new(roster.region.clone());
    let stood_down = hive
        .terminate(&roster.workers)
        .await
        .context("failed to terminate bees")?;

    println!("Stood down {} bees.", stood_down.len());
    store.delete()?;
    Ok(())
}

pub async fn report(store: &RosterStore) -> Result<()> {
    let Some(roster) = store.load()? else {
        println!("No bees have been mobilized.");
        return Ok(());
    };

    let hive = Ec2Hive::new(roster.region.clone());
    let instances = hive.describe(&roster.workers).await?;

    let stdout = std::io::stdout();
    write_fleet_status(&instances, &mut stdout.lock())?;
    Ok(())
}
