//! Sync CLI commands for inspecting the workspace mirror.

use clap::{Args, Subcommand};
use pikaworld_core::IdentityProvider;

use super::{truncate, OutputFormat};
use crate::config::Config;
use crate::sync::connect;

/// Inspect the connection to the sync server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: Option<SyncSubcommand>,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and server status
    Status,

    /// Probe the server once
    Check,

    /// List the workspaces mirrored for the signed-in user
    Remote {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl SyncCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            None | Some(SyncSubcommand::Status) => status(config).await,
            Some(SyncSubcommand::Check) => check(config).await,
            Some(SyncSubcommand::Remote { format }) => remote(config, format).await,
        }
    }
}

async fn status(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Sync Configuration");
    println!("==================");
    println!();

    let Some(server_url) = config.sync.server_url.as_deref() else {
        println!("Status: Not configured (workspaces are stored locally only)");
        println!();
        println!("To enable sync, add to your config file:");
        println!();
        println!("  sync:");
        println!("    server_url: \"http://localhost:8080\"");
        println!();
        println!("Or set environment variables:");
        println!("  PIKAWORLD_SERVER_URL");
        return Ok(());
    };

    println!("Server:         {}", server_url);
    println!("Remote timeout: {}s", config.sync.remote_timeout_secs);
    println!(
        "Follow-up:      {}",
        if config.sync.follow_up_mirror {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let coordinator = connect(config).await?;
    print!("{}", coordinator.get_autosave_status());
    match coordinator.identity().current_user() {
        Some(user) if user.is_anonymous => println!("User:        {} (anonymous)", user.user_id),
        Some(user) => println!(
            "User:        {} ({})",
            user.user_id,
            user.email.as_deref().unwrap_or("registered")
        ),
        None => println!("User:        not signed in"),
    }
    Ok(())
}

async fn check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = connect(config).await?;

    print!("Server status: ");
    if coordinator.check_connection().await {
        println!("✓ connected");
    } else {
        println!("✗ unreachable");
    }
    Ok(())
}

async fn remote(config: &Config, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = connect(config).await?;
    if !coordinator.get_autosave_status().is_online {
        return Err("Sync server is unreachable".into());
    }

    let workspaces = coordinator.load_remote_workspaces().await;
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&workspaces)?);
        }
        OutputFormat::Text => {
            if workspaces.is_empty() {
                println!("No mirrored workspaces.");
                return Ok(());
            }

            println!("{:<20}  {:<30}  Updated", "ID", "Name");
            println!("{}", "-".repeat(72));
            for workspace in &workspaces {
                println!(
                    "{:<20}  {:<30}  {}",
                    workspace.id,
                    truncate(&workspace.name, 30),
                    workspace.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
            println!();
            println!("Total: {} workspace(s)", workspaces.len());
        }
    }
    Ok(())
}
