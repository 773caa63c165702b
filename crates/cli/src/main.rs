//! Re:Space CLI - Database migrations and operations tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! respace-cli migrate
//!
//! # Load catalog products from a YAML file
//! respace-cli seed products crates/cli/seed/products.yaml
//!
//! # Re-poll PortOne for a payment and reconcile it
//! respace-cli payments sync pay-0f8fad5bd9cb469fa16570867728950e
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `seed products` - Insert catalog products
//! - `payments sync` - Reconcile one payment against `PortOne`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "respace-cli")]
#[command(author, version, about = "Re:Space storefront CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Seed the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Payment operations
    Payments {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Insert catalog products from a YAML file
    Products {
        /// Path to a YAML list of products
        file: String,
    },
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Re-poll `PortOne` for a payment and reconcile the order
    Sync {
        /// Merchant payment id (`pay-...`)
        payment_id: String,
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
            SeedTarget::Products { file } => commands::seed::products(&file).await?,
        },
        Commands::Payments { action } => match action {
            PaymentAction::Sync { payment_id } => commands::payments::sync(&payment_id).await?,
        },
    }
    Ok(())
}
