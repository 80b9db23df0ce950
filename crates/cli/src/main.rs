//! WellCoach CLI entry point.
//!
//! Commands:
//! - `onboard`  Write a starter config
//! - `plan`     Run the agent pipeline over a Plan State
//! - `agents`   Show how each agent resolves through the model gateway
//! - `doctor`   Diagnose configuration and credentials

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "wellcoach",
    about = "WellCoach: daily wellness plans from a team of AI coaches",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "WELLCOACH_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.wellcoach/config.toml
    Onboard,

    /// Generate a daily plan
    Plan {
        /// Plan State JSON file ("-" for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Start from an empty profile for this user
        #[arg(short, long)]
        user_id: Option<String>,

        /// Print the per-step execution trace to stderr
        #[arg(long)]
        trace: bool,
    },

    /// Show agent → model resolution
    Agents,

    /// Diagnose configuration health
    Doctor {
        /// Also call each provider's health check
        #[arg(long)]
        ping: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Plan {
            input,
            user_id,
            trace,
        } => commands::plan::run(input, user_id, trace).await?,
        Commands::Agents => commands::agents::run().await?,
        Commands::Doctor { ping } => commands::doctor::run(ping).await?,
    }

    Ok(())
}
