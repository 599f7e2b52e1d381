use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod transport;

#[derive(Parser)]
#[command(name = "fileseq", version, about = "File sequencing CLI")]
struct Cli {
    /// Database file (overrides FILESEQ_DB and storage.db_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Config file (default: ~/.config/fileseq/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send the welcome reply to a user
    Start {
        /// External user ID
        user: String,
        /// Chat to reply into (default: the user ID)
        #[arg(long)]
        chat: Option<String>,
    },
    /// Sequence lifecycle
    Sequence {
        #[command(subcommand)]
        action: commands::sequence::SequenceAction,
    },
    /// Apply inbound events read as JSON lines from stdin
    Events,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = commands::Context::new(cli.db, cli.config);
    let result = match cli.command {
        Commands::Start { user, chat } => commands::start::run(&ctx, user, chat),
        Commands::Sequence { action } => commands::sequence::run(&ctx, action),
        Commands::Events => commands::events::run(&ctx),
        Commands::Config { action } => commands::config::run(&ctx, action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
