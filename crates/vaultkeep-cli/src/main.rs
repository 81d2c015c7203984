//! CLI entry point for vaultkeep.
//!
//! This binary provides the `vaultkeep` command for inspecting quotas and
//! reading or editing vault contents against the configured store.

mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Console;
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// vaultkeep: numbered per-player storage vaults.
#[derive(Parser)]
#[command(
    name = "vaultkeep",
    version,
    about = "vaultkeep: numbered per-player storage vaults",
    long_about = "Inspect vault quotas and read or edit vault contents, with the same \
                  permission and quota rules the game server applies."
)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how many vaults a player may open.
    Quota {
        player: String,
    },

    /// Open a vault and print its contents.
    Open {
        number: u32,
        /// Owner of the vault, if not the acting player.
        owner: Option<String>,
        /// Player the command runs as.
        #[arg(long = "as")]
        player: String,
    },

    /// Put an item into a vault slot.
    Put {
        number: u32,
        slot: usize,
        item: String,
        #[arg(long = "as")]
        player: String,
        #[arg(long)]
        owner: Option<String>,
    },

    /// Empty a vault slot.
    Clear {
        number: u32,
        slot: usize,
        #[arg(long = "as")]
        player: String,
        #[arg(long)]
        owner: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("warn");

    let config = AppConfig::load(&cli.config)?;
    debug!(backend = %config.storage.backend, "configuration loaded");

    let console = Console::from_config(&config).await?;
    let outcome = run(&console, cli.command).await;
    console.shutdown().await?;

    for line in outcome? {
        println!("{line}");
    }
    Ok(())
}

async fn run(console: &Console, command: Commands) -> Result<Vec<String>> {
    match command {
        Commands::Quota { player } => Ok(console.quota(&player)),
        Commands::Open {
            number,
            owner,
            player,
        } => console.open(number, owner.as_deref(), &player).await,
        Commands::Put {
            number,
            slot,
            item,
            player,
            owner,
        } => {
            console
                .put(number, slot, &item, owner.as_deref(), &player)
                .await
        }
        Commands::Clear {
            number,
            slot,
            player,
            owner,
        } => console.clear(number, slot, owner.as_deref(), &player).await,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber, honouring `RUST_LOG` when set.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}
