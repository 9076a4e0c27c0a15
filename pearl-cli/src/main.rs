//! Pearl CLI: API server, one-off research runs and auto-runner control.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Pearl: research and verify real-estate marketing ideas
#[derive(Parser, Debug)]
#[command(name = "pearl", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Keep all data in memory instead of the workspace store
        #[arg(long)]
        ephemeral: bool,
        /// Bind address (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,
        /// Port (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Research one country, optionally narrowed to a topic
    Run {
        /// ISO country code, e.g. ES
        code: String,
        /// Research a topic around the focus market instead of the country
        #[arg(short, long)]
        topic: Option<String>,
        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List countries, optionally filtered by name or code
    Countries {
        query: Option<String>,
    },
    /// Show provider keys, model, store location and runner progress
    Status,
    /// Control the auto-runner
    Runner {
        #[command(subcommand)]
        action: RunnerAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum RunnerAction {
    /// Show cursor and status
    Status,
    /// Set the runner RUNNING
    Start {
        /// Rewind to the first country and clear history
        #[arg(long)]
        reset: bool,
    },
    /// Pause the runner
    Stop,
    /// Record an externally executed run and move the cursor
    Advance {
        /// Record the run as failed
        #[arg(long)]
        failed: bool,
        /// Country code the run was for
        #[arg(long)]
        country: Option<String>,
        /// Reject the advance unless the cursor is still here
        #[arg(long)]
        expected_cursor: Option<usize>,
    },
    /// Run the next country and advance
    Step,
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default workspace configuration file
    Init,
    /// Show the effective configuration and any warnings
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "pearl", "pearl")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "pearl.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref()).await
}
