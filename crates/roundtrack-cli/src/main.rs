use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "roundtrack", version, about = "Roundtrack CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive round session
    Session(commands::session::SessionArgs),
    /// Daily, rolling and range statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Gamification profile
    Profile {
        #[command(subcommand)]
        action: commands::profile::ProfileAction,
    },
    /// User administration
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Offline outbox and remote sync
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Workday management
    Day {
        #[command(subcommand)]
        action: commands::day::DayAction,
    },
    /// Import blocks from a JSON file
    Import {
        file: PathBuf,
        #[arg(long)]
        user: Option<i64>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Print shell completions
    Completions { shell: Shell },
}

/// Logs go to stderr so JSON on stdout stays parseable.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("ROUNDTRACK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session(args) => commands::session::run(args).await,
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Profile { action } => commands::profile::run(action),
        Commands::User { action } => commands::user::run(action),
        Commands::Sync { action } => commands::sync::run(action).await,
        Commands::Day { action } => commands::day::run(action),
        Commands::Import { file, user } => commands::import::run(file, user),
        Commands::Config { action } => commands::config::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "roundtrack",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
