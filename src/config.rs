use crate::domain::Threshold;
use crate::infrastructure::PacingPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// activity-audit - Find inactive members of GitHub organizations
#[derive(Parser, Debug)]
#[command(name = "activity-audit")]
#[command(author, version)]
#[command(
    about = "Report commit, issue and pull request activity of every organization member",
    long_about = None
)]
pub struct Cli {
    /// GitHub Personal Access Token
    #[arg(global = true, long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Organizations to audit, comma separated
    #[arg(global = true, long, env = "ORG_NAMES", value_delimiter = ',')]
    pub orgs: Vec<String>,

    /// Days without activity after which a member is reported inactive
    #[arg(
        global = true,
        long,
        env = "DAYS_INACTIVE_THRESHOLD",
        default_value = "60",
        value_parser = parse_threshold
    )]
    pub threshold_days: Threshold,

    /// Directory the CSV reports are written to
    #[arg(global = true, long, env = "AUDIT_OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Seconds to wait between two pages of results
    #[arg(global = true, long, default_value_t = 3)]
    pub page_delay_secs: u64,

    /// Seconds before a single API request is abandoned
    #[arg(global = true, long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Attempts per API request before giving up
    #[arg(
        global = true,
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Suppress progress indicators and non-error output
    #[arg(global = true, long, short)]
    pub quiet: bool,

    /// Log every processed commit, issue and pull request
    #[arg(global = true, long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Audit the configured organizations and write one CSV report each (default)
    Audit,

    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: clap_complete::Shell,
    },

    /// Show the current version
    Version,
}

/// Problems with the configuration, reported before anything is fetched
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid inactivity threshold '{0}': expected a non-negative whole number of days")]
    InvalidThreshold(String),

    #[error("no organizations to audit. Set ORG_NAMES env var or use --orgs")]
    NoOrganizations,

    #[error("GitHub token required. Set GITHUB_TOKEN env var or use --token flag")]
    MissingToken,
}

pub fn parse_threshold(value: &str) -> Result<Threshold, ConfigError> {
    value
        .trim()
        .parse::<u32>()
        .map(Threshold::days)
        .map_err(|_| ConfigError::InvalidThreshold(value.to_string()))
}

/// Validated settings for an audit run
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub organizations: Vec<String>,
    pub threshold: Threshold,
    pub token: String,
    pub output_dir: PathBuf,
    pub pacing: PacingPolicy,
}

impl AuditConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let organizations: Vec<String> = cli
            .orgs
            .iter()
            .map(|org| org.trim())
            .filter(|org| !org.is_empty())
            .map(str::to_string)
            .collect();
        if organizations.is_empty() {
            return Err(ConfigError::NoOrganizations);
        }

        let token = cli
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let pacing = PacingPolicy {
            page_delay: Duration::from_secs(cli.page_delay_secs),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            max_attempts: cli.max_attempts,
            ..PacingPolicy::default()
        };

        Ok(Self {
            organizations,
            threshold: cli.threshold_days,
            token,
            output_dir: cli.output_dir.clone(),
            pacing,
        })
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
