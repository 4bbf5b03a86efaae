//! Pasta Haus CLI - Database migrations and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! ph-cli migrate
//!
//! # Load the menu
//! ph-cli seed products crates/cli/seed/products.yaml
//!
//! # Hash the admin password for STOREFRONT_ADMIN_PASSWORD_HASH
//! ph-cli admin hash-password 'correct horse battery staple'
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ph-cli")]
#[command(author, version, about = "Pasta Haus CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Load data into the store
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Admin dashboard tools
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert or replace menu products from a YAML file
    Products {
        /// Path to the YAML file
        file: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Print the Argon2 hash of an admin password
    HashPassword {
        /// The password to hash
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Products { file } => {
                commands::seed::products(&file).await?;
            }
        },
        Commands::Admin { action } => match action {
            AdminAction::HashPassword { password } => {
                commands::admin::hash_password(&password)?;
            }
        },
    }
    Ok(())
}
