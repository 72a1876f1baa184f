mod application;
mod config;
mod domain;
mod infrastructure;
mod logging;

use application::run_audit;
use clap::CommandFactory;
use config::{parse_args, AuditConfig, Cli, Commands};
use indicatif::MultiProgress;
use infrastructure::GitHubClient;
use logging::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();
    let progress = MultiProgress::new();
    init_logging(&cli, &progress);

    // Default to Audit if no subcommand provided
    match cli.command.clone().unwrap_or(Commands::Audit) {
        Commands::Audit => {
            // Validate everything before the first request goes out
            let config = AuditConfig::from_cli(&cli)?;
            let client = GitHubClient::new(config.token.clone(), config.pacing)?;
            let summary = run_audit(&client, &config, (!cli.quiet).then_some(&progress)).await?;
            if !cli.quiet {
                println!("{}", summary);
            }
        }

        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "activity-audit",
                &mut std::io::stdout(),
            );
        }

        Commands::Version => {
            println!("activity-audit {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
