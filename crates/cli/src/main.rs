//! reviewloop CLI — the main entry point.
//!
//! Commands:
//! - `agents`  — Show the agent catalog resolved from config
//! - `config`  — Show, validate or print the default configuration
//! - `review`  — Run a review against a recorded model transcript

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod replay;

#[derive(Parser)]
#[command(
    name = "reviewloop",
    about = "reviewloop — agent execution engine for automated code review",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.reviewloop/config.toml
    #[arg(short, long, global = true, env = "REVIEWLOOP_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the agents a review would run
    Agents {
        /// Only these agents (repeatable)
        #[arg(long)]
        include: Vec<String>,

        /// Leave these agents out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Review a pull request, replaying model responses from a transcript
    Review {
        /// Pull request context (JSON: pr_title, pr_description, diff, user_story, repo_root)
        #[arg(long)]
        context: PathBuf,

        /// Recorded model responses per agent (JSON)
        #[arg(long)]
        transcript: PathBuf,

        /// Only these agents (repeatable)
        #[arg(long)]
        include: Vec<String>,

        /// Leave these agents out (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
    /// Print the default configuration
    Default,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Agents { include, exclude } => commands::agents::run(config_path, include, exclude).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Default => commands::config_cmd::default().await?,
        },
        Commands::Review {
            context,
            transcript,
            include,
            exclude,
        } => commands::review::run(config_path, &context, &transcript, include, exclude).await?,
    }

    Ok(())
}
