//! CLI application for TISS claim auditing.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{audit, batch, dedupe};

/// TISS claim auditing - extract batch lots from TISS XML and reconcile
/// them against payment demonstratives
#[derive(Parser)]
#[command(name = "tissrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a batch of TISS XML files and reconcile against demonstratives
    Batch(batch::BatchArgs),

    /// Per-guide audit of a single file
    Audit(audit::AuditArgs),

    /// Remove guides from a base file that also occur in other files
    Dedupe(dedupe::DedupeArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Batch(args) => batch::run(args, cli.config.as_deref()),
        Commands::Audit(args) => audit::run(args, cli.config.as_deref()),
        Commands::Dedupe(args) => dedupe::run(args),
    }
}
