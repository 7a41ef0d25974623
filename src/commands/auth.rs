//! Account commands for the sync server.
//!
//! Mirroring signs in anonymously on first use. These commands attach a
//! registered account instead, so workspaces follow the user across devices.

use clap::{Args, Subcommand};
use pikaworld_core::{IdentityProvider, UserIdentity};
use std::io::{self, Write};

use crate::config::Config;
use crate::sync::identity;

/// Authentication commands
#[derive(Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Subcommand)]
enum AuthSubcommand {
    /// Show the signed-in user
    Status,

    /// Sign in with email and password
    Signin {
        /// Account email (prompted if omitted)
        #[arg(long, short)]
        email: Option<String>,
    },

    /// Create an account and sign in
    Signup {
        /// Account email (prompted if omitted)
        #[arg(long, short)]
        email: Option<String>,

        /// Display name
        #[arg(long, short)]
        name: Option<String>,
    },

    /// Sign out and forget the stored session
    Signout,
}

impl AuthCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let provider = identity(config)?;

        match &self.command {
            AuthSubcommand::Status => {
                match provider.restore_session() {
                    Some(user) => print_user(&user),
                    None => {
                        println!("Not signed in.");
                        println!();
                        println!("Run 'pika auth signin' or 'pika auth signup' to use an account.");
                    }
                }
                println!("Server: {}", provider.server_url());
                Ok(())
            }

            AuthSubcommand::Signin { email } => {
                let email = prompt_if_missing(email.as_deref(), "Email")?;
                let password = prompt("Password")?;

                let user = provider.sign_in(&email, &password).await?;
                println!("Signed in.");
                print_user(&user);
                Ok(())
            }

            AuthSubcommand::Signup { email, name } => {
                let email = prompt_if_missing(email.as_deref(), "Email")?;
                let password = prompt("Password")?;
                let repeated = prompt("Repeat password")?;
                if password != repeated {
                    return Err("Passwords do not match".into());
                }

                let user = provider.sign_up(&email, &password, name.as_deref()).await?;
                println!("Account created.");
                print_user(&user);
                Ok(())
            }

            AuthSubcommand::Signout => {
                if provider.restore_session().is_none() {
                    println!("Not signed in.");
                    return Ok(());
                }

                provider.sign_out().await?;
                println!("Signed out.");
                Ok(())
            }
        }
    }
}

fn print_user(user: &UserIdentity) {
    println!("User:  {}", user.user_id);
    if user.is_anonymous {
        println!("Type:  anonymous");
    } else {
        println!("Type:  registered");
    }
    if let Some(email) = &user.email {
        println!("Email: {}", email);
    }
    if let Some(name) = &user.display_name {
        println!("Name:  {}", name);
    }
}

fn prompt_if_missing(value: Option<&str>, label: &str) -> io::Result<String> {
    match value {
        Some(value) => Ok(value.to_string()),
        None => prompt(label),
    }
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();

    if value.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} cannot be empty", label),
        ));
    }
    Ok(value)
}
