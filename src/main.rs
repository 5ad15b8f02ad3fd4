use anyhow::Result;
use clap::{Parser, Subcommand};
use codedrop::settings::GitMode;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cmd;

#[derive(Parser)]
#[command(name = "codedrop")]
#[command(version, about = "Clipboard-driven file drop agent for AI chat workflows")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root to write files into. Overrides [project] root in config.
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Git policy after a validated commit: local-only, safe, yolo
    #[arg(long, global = true)]
    pub git_mode: Option<GitMode>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch the clipboard for triggered file payloads
    Watch,
    /// Run the current clipboard content through the pipeline once
    Apply,
    /// Copy a review prompt for the newest logged commit to the clipboard
    Review,
    /// List logged changes for this project
    Logs,
    /// Delete a logged change's review branch and drop it from the log
    Close {
        /// Short commit hash of the entry to close
        hash: String,
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Write a default config file
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "codedrop=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Watch => {
            let agent = cmd::build_agent(cli.project_root.clone(), cli.git_mode)?;
            cmd::cmd_watch(agent).await?;
        }
        Commands::Apply => {
            let agent = cmd::build_agent(cli.project_root.clone(), cli.git_mode)?;
            cmd::cmd_apply(agent).await?;
        }
        Commands::Review => {
            let agent = cmd::build_agent(cli.project_root.clone(), cli.git_mode)?;
            cmd::cmd_review(agent).await?;
        }
        Commands::Logs => {
            let agent = cmd::build_agent(cli.project_root.clone(), cli.git_mode)?;
            cmd::cmd_logs(agent).await?;
        }
        Commands::Close { hash, yes } => {
            let agent = cmd::build_agent(cli.project_root.clone(), cli.git_mode)?;
            cmd::cmd_close(agent, hash, *yes).await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(cli.project_root.as_deref(), command.clone())?;
        }
    }

    Ok(())
}
