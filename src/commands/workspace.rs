use clap::{Args, Subcommand};
use pikaworld_core::{Workspace, WorkspacePatch};
use std::path::PathBuf;

use super::{confirm, format_bytes, truncate, OutputFormat};
use crate::sync::Workspaces;

#[derive(Args)]
pub struct WorkspaceCommand {
    #[command(subcommand)]
    pub command: WorkspaceSubcommand,
}

#[derive(Subcommand)]
pub enum WorkspaceSubcommand {
    /// List all workspaces, most recently updated first
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a workspace
    Show {
        /// Workspace ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the current workspace, creating a default one if needed
    Current {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a workspace and make it current
    Create {
        /// Workspace name
        name: String,
    },

    /// Rename a workspace
    Rename {
        /// Workspace ID
        id: String,

        /// New name
        name: String,
    },

    /// Replace the text content of a workspace
    Text {
        /// Workspace ID
        id: String,

        /// New text content
        #[arg(conflicts_with = "file")]
        content: Option<String>,

        /// Read the content from a file
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Replace or clear the drawing of a workspace
    Drawing {
        /// Workspace ID
        id: String,

        /// Read the drawing data from a file
        #[arg(long, short, required_unless_present = "clear")]
        file: Option<PathBuf>,

        /// Remove the drawing
        #[arg(long, conflicts_with = "file")]
        clear: bool,
    },

    /// Make a workspace current
    Switch {
        /// Workspace ID
        id: String,
    },

    /// Delete a workspace
    Delete {
        /// Workspace ID
        id: String,

        /// Skip confirmation
        #[arg(long, short)]
        force: bool,
    },

    /// Export a workspace as JSON
    Export {
        /// Workspace ID
        id: String,

        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Import a workspace from an exported JSON file
    Import {
        /// Path to the exported file
        file: PathBuf,

        /// Name for the imported workspace
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Show how much storage the workspaces use
    Usage,
}

impl WorkspaceCommand {
    pub async fn run(&self, workspaces: &Workspaces) -> Result<(), Box<dyn std::error::Error>> {
        let store = workspaces.store();

        match &self.command {
            WorkspaceSubcommand::List { format } => {
                let all = store.get_all_workspaces();
                let current = store.current_workspace_id();

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&all)?);
                    }
                    OutputFormat::Text => {
                        if all.is_empty() {
                            println!("No workspaces found.");
                            return Ok(());
                        }

                        println!("  {:<20}  {:<30}  Updated", "ID", "Name");
                        println!("{}", "-".repeat(72));
                        for workspace in &all {
                            let marker = if current.as_deref() == Some(workspace.id.as_str()) {
                                "*"
                            } else {
                                " "
                            };
                            println!(
                                "{} {:<20}  {:<30}  {}",
                                marker,
                                workspace.id,
                                truncate(&workspace.name, 30),
                                workspace.updated_at.format("%Y-%m-%d %H:%M")
                            );
                        }
                        println!();
                        println!("Total: {} workspace(s)", all.len());
                        if let Some(status) = workspaces.status() {
                            println!(
                                "Sync: {}",
                                if status.is_online { "online" } else { "offline" }
                            );
                        }
                    }
                }
                Ok(())
            }

            WorkspaceSubcommand::Show { id, format } => {
                let workspace = store
                    .get_workspace(id)
                    .ok_or_else(|| format!("Workspace not found: {}", id))?;
                print_workspace(&workspace, format)
            }

            WorkspaceSubcommand::Current { format } => {
                let workspace = store.get_or_create_default_workspace();
                print_workspace(&workspace, format)
            }

            WorkspaceSubcommand::Create { name } => {
                let workspace = workspaces.create(name).await?;
                println!("Created workspace: {} ({})", workspace.name, workspace.id);
                Ok(())
            }

            WorkspaceSubcommand::Rename { id, name } => {
                let workspace = workspaces
                    .update(id, &WorkspacePatch::new().with_name(name.as_str()))
                    .await?;
                println!("Renamed workspace {} to '{}'", workspace.id, workspace.name);
                Ok(())
            }

            WorkspaceSubcommand::Text { id, content, file } => {
                let text = match (content, file) {
                    (Some(content), _) => content.clone(),
                    (None, Some(path)) => std::fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
                    (None, None) => {
                        println!("Nothing to update. Give the text or use --file.");
                        return Ok(());
                    }
                };

                let workspace = workspaces
                    .update(id, &WorkspacePatch::new().with_text(text))
                    .await?;
                println!(
                    "Updated text of '{}' ({} bytes)",
                    workspace.name,
                    workspace.text_content.len()
                );
                Ok(())
            }

            WorkspaceSubcommand::Drawing { id, file, clear } => {
                let drawing = if *clear {
                    None
                } else {
                    match file {
                        Some(path) => Some(
                            std::fs::read_to_string(path)
                                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?,
                        ),
                        None => return Err("Give --file or --clear".into()),
                    }
                };

                let workspace = workspaces
                    .update(id, &WorkspacePatch::new().with_drawing(drawing))
                    .await?;
                match &workspace.drawing_data {
                    Some(data) => println!(
                        "Updated drawing of '{}' ({} bytes)",
                        workspace.name,
                        data.len()
                    ),
                    None => println!("Cleared drawing of '{}'", workspace.name),
                }
                Ok(())
            }

            WorkspaceSubcommand::Switch { id } => {
                let workspace = store.switch_to_workspace(id)?;
                println!("Switched to workspace: {} ({})", workspace.name, workspace.id);
                Ok(())
            }

            WorkspaceSubcommand::Delete { id, force } => {
                let workspace = store
                    .get_workspace(id)
                    .ok_or_else(|| format!("Workspace not found: {}", id))?;

                if !force
                    && !confirm(&format!("Delete workspace '{}'?", workspace.name))?
                {
                    println!("Cancelled.");
                    return Ok(());
                }

                workspaces.delete(id).await?;
                println!("Deleted workspace: {}", workspace.name);
                Ok(())
            }

            WorkspaceSubcommand::Export { id, output } => {
                let serialized = store.export_workspace(id)?;
                match output {
                    Some(path) => {
                        std::fs::write(path, serialized)?;
                        println!("Exported workspace to {}", path.display());
                    }
                    None => println!("{}", serialized),
                }
                Ok(())
            }

            WorkspaceSubcommand::Import { file, name } => {
                let contents = std::fs::read_to_string(file)
                    .map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
                let workspace = workspaces.import(&contents, name.as_deref()).await?;
                println!("Imported workspace: {} ({})", workspace.name, workspace.id);
                Ok(())
            }

            WorkspaceSubcommand::Usage => {
                let info = store.get_storage_info();
                println!("Workspace storage");
                println!("  Used:      {}", format_bytes(info.used));
                println!("  Available: {}", format_bytes(info.available));
                println!("  Usage:     {:.2}%", info.percentage);
                Ok(())
            }
        }
    }
}

fn print_workspace(
    workspace: &Workspace,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(workspace)?),
        OutputFormat::Text => {
            print!("{}", workspace);
            if !workspace.text_content.is_empty() {
                println!();
                println!("{}", workspace.text_content);
            }
        }
    }
    Ok(())
}
