//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};

use bees_core::RosterStore;
use bees_report::OutputMode;

mod commands;

#[derive(Parser)]
#[command(name = "bees")]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "A utility for arming (creating) many bees (small EC2 instances) to attack \
                  (load test) targets (web applications)."
)]
pub struct Cli {
    /// Log verbosely to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Roster file (default: ~/.bees)
    #[arg(long, global = true, env = "BEES_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a batch of load testing servers
    Up(UpArgs),
    /// Begin the attack on a specific url
    Attack(AttackArgs),
    /// Shutdown and deactivate the load testing servers
    Down,
    /// Report the status of the load testing servers
    Report,
}

/// Options for `up`
///
/// The bees expect to find a .pem file named after the key pair in ~/.ssh/.
#[derive(Args, Debug, Clone)]
pub struct UpArgs {
    /// The ssh key pair name to use to connect to the new servers
    #[arg(short, long)]
    pub key: String,

    /// The number of servers to start
    #[arg(short, long, default_value_t = 5)]
    pub servers: usize,

    /// The security group to run the instances under
    #[arg(short, long, default_value = "default")]
    pub group: String,

    /// The availability zone to start the instances in
    #[arg(short, long, default_value = "us-east-1d")]
    pub zone: String,

    /// The image id to start each server from
    #[arg(short = 'i', long = "instance", default_value = "ami-ff17fb96")]
    pub image: String,

    /// The ssh username to use to connect to the new servers
    #[arg(short, long, default_value = "newsapps")]
    pub login: String,

    /// The instance type to launch
    #[arg(short = 't', long = "type", default_value = "t1.micro")]
    pub instance_type: String,
}

/// Options for `attack`
#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("target").required(true).args(["url", "url_file"])))]
pub struct AttackArgs {
    /// URL of the target to attack
    #[arg(short, long)]
    pub url: Option<String>,

    /// File containing URLs of the targets to attack
    #[arg(short = 'f', long)]
    pub url_file: Option<PathBuf>,

    /// The number of total connections to make to the target
    #[arg(short, long, default_value_t = 1000)]
    pub number: usize,

    /// The number of concurrent connections to make to the target
    #[arg(short, long, default_value_t = 100)]
    pub concurrent: usize,

    /// Whether or not to use keepalive
    #[arg(long)]
    pub keepalive: bool,

    /// Benchmark tool the bees run (ab, siege)
    #[arg(short, long, default_value = "ab")]
    pub engine: String,

    /// Output type: text, csv, csvh (csv with header row) or json
    #[arg(short, long, default_value_t = OutputMode::Text)]
    pub output: OutputMode,

    /// Give up on a bee after this many seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// S3 bucket used to hand the URL file to the bees
    #[arg(long, requires = "url_file", conflicts_with = "blob_dir")]
    pub bucket: Option<String>,

    /// Shared directory used to hand the URL file to the bees
    #[arg(long, requires = "url_file")]
    pub blob_dir: Option<PathBuf>,

    /// Skip the warm-up request before the attack
    #[arg(long)]
    pub no_sting: bool,
}

/// Run the parsed command
pub async fn run(cli: Cli) -> Result<()> {
    let store = match cli.state_file {
        Some(path) => RosterStore::new(path),
        None => RosterStore::in_home().context("cannot locate the roster file")?,
    };

    match cli.command {
        Commands::Up(args) => commands::up(&store, &args).await,
        Commands::Attack(args) => commands::attack(&store, &args).await,
        Commands::Down => commands::down(&store).await,
        Commands::Report => commands::report(&store).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_defaults() {
        let cli = Cli::try_parse_from(["bees", "up", "-k", "frontend"]).unwrap();
        match cli.command {
            Commands::Up(args) => {
                assert_eq!(args.key, "frontend");
                assert_eq!(args.servers, 5);
                assert_eq!(args.group, "default");
                assert_eq!(args.zone, "us-east-1d");
                assert_eq!(args.image, "ami-ff17fb96");
                assert_eq!(args.login, "newsapps");
                assert_eq!(args.instance_type, "t1.micro");
            }
            _ => panic!("Expected up"),
        }
    }

    #[test]
    fn test_up_requires_key() {
        assert!(Cli::try_parse_from(["bees", "up"]).is_err());
    }

    #[test]
    fn test_attack_defaults() {
        let cli = Cli::try_parse_from(["bees", "attack", "-u", "http://www.example.com/"]).unwrap();
        match cli.command {
            Commands::Attack(args) => {
                assert_eq!(args.url.as_deref(), Some("http://www.example.com/"));
                assert_eq!(args.number, 1000);
                assert_eq!(args.concurrent, 100);
                assert!(!args.keepalive);
                assert_eq!(args.engine, "ab");
                assert_eq!(args.output, OutputMode::Text);
                assert_eq!(args.timeout, None);
                assert!(!args.no_sting);
            }
            _ => panic!("Expected attack"),
        }
    }

    #[test]
    fn test_attack_needs_exactly_one_target() {
        assert!(Cli::try_parse_from(["bees", "attack"]).is_err());
        assert!(Cli::try_parse_from([
            "bees",
            "attack",
            "-u",
            "http://www.example.com/",
            "-f",
            "urls.txt"
        ])
        .is_err());
    }

    #[test]
    fn test_attack_output_mode() {
        let cli = Cli::try_parse_from([
            "bees",
            "attack",
            "-u",
            "http://www.example.com/",
            "-o",
            "csvh",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Attack(ref a) if a.output == OutputMode::Csvh));
    }

    #[test]
    fn test_bucket_requires_url_file() {
        assert!(Cli::try_parse_from([
            "bees",
            "attack",
            "-u",
            "http://www.example.com/",
            "--bucket",
            "hive"
        ])
        .is_err());
        assert!(Cli::try_parse_from([
            "bees", "attack", "-f", "urls.txt", "--bucket", "hive", "--blob-dir", "/srv"
        ])
        .is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bees", "report", "-v", "--state-file", "/tmp/roster"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.state_file, Some(PathBuf::from("/tmp/roster")));
    }
}
