//! test-genie - suite orchestration and agent supervision control plane
//!
//! - `test-genie serve` runs the HTTP/SSE/WebSocket server
//! - `test-genie replay` compiles an execution timeline into a replay movie spec

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod replay;
mod serve;

/// test-genie control plane
#[derive(Parser)]
#[command(name = "test-genie")]
#[command(about = "Queue and run test suites, supervise test agents, export replays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    ///
    /// Configuration is read from the environment (VROOLI_ROOT, SCENARIOS_ROOT,
    /// API_PORT, TEST_GENIE_DB, TEST_GENIE_AGENT_BIN); flags override it.
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Repository root containing `scenarios/`
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Build a replay movie spec from an execution timeline JSON file
    Replay {
        /// JSON file with `execution`, `workflow`, `timeline` and optional `accent_color`
        #[arg(short, long)]
        input: PathBuf,

        /// Write the spec here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Force the built-in watermark on
        #[arg(long)]
        watermark: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command {
        Commands::Serve { port, db, root } => serve::run(port, db, root).await,
        Commands::Replay {
            input,
            output,
            watermark,
        } => replay::run(&input, output.as_deref(), watermark),
    }
}
