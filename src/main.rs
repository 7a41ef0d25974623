use clap::{Parser, Subcommand};
use pikaworld_core::CalendarStore;
use std::path::PathBuf;

mod commands;
mod config;
mod sync;

use commands::{AuthCommand, CalendarCommand, ConfigCommand, SyncCommand, WorkspaceCommand};
use config::Config;
use sync::Workspaces;

#[derive(Parser)]
#[command(name = "pika")]
#[command(version)]
#[command(about = "Exercise calendar and note workspaces", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log exercises by date
    Calendar(CalendarCommand),

    /// Manage note workspaces
    Workspace(WorkspaceCommand),

    /// Inspect workspace mirroring
    Sync(SyncCommand),

    /// Manage the sync server account
    Auth(AuthCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Calendar(cmd)) => {
            let calendar = CalendarStore::new(sync::local_storage(&config));
            cmd.run(&calendar)?;
        }
        Some(Commands::Workspace(cmd)) => {
            let workspaces = Workspaces::open(&config).await;
            cmd.run(&workspaces).await?;
        }
        Some(Commands::Sync(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Auth(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
