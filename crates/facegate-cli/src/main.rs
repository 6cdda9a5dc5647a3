use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod admin;
mod models;
mod probe;
mod setup;

#[derive(Parser)]
#[command(name = "facegate", version, about = "Facegate face authentication administration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configuration, landmark model state and enrollment count
    Status,
    /// List enrolled users
    List,
    /// Remove one user's enrollment
    Revoke {
        /// User identity to revoke
        #[arg(long)]
        user: String,
    },
    /// Remove every enrollment
    Reset {
        /// Confirm the irreversible wipe
        #[arg(long)]
        yes: bool,
    },
    /// Write a JSON enrollment report (no biometric data)
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<String>,
    },
    /// Verify the landmark model file is installed and intact
    CheckModels {
        /// Model directory (defaults to FACEGATE_MODEL_DIR or the data dir)
        #[arg(long)]
        model_dir: Option<String>,
    },
    /// Download and install the landmark model
    SetupModels {
        /// Model directory (defaults to FACEGATE_MODEL_DIR or the data dir)
        #[arg(long)]
        model_dir: Option<String>,
        /// Re-download even when a usable model is present
        #[arg(long)]
        force: bool,
    },
    /// Decode a captured frame and report its dimensions
    Probe {
        /// File containing a base64 or data-URI payload
        file: String,
        /// Treat the file as raw image bytes instead
        #[arg(long)]
        raw: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Status => admin::status().await,
        Command::List => admin::list().await,
        Command::Revoke { user } => admin::revoke(&user).await,
        Command::Reset { yes } => admin::reset(yes).await,
        Command::Export { output } => admin::export(output).await,
        Command::CheckModels { model_dir } => models::run(model_dir),
        Command::SetupModels { model_dir, force } => setup::run(model_dir, force),
        Command::Probe { file, raw } => probe::run(&file, raw),
    }
}
