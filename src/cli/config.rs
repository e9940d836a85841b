//! The `config` command: read and write `/etc/pinet`.
//!
//! ```bash
//! pinet config get ReleaseChannel
//! pinet config set NBDuse true
//! pinet config settings --json
//! ```
//!
//! Missing keys print `None`, matching what the PiNet shell scripts expect.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use super::CommandStatus;
use crate::config::MatchMode;
use crate::context::PinetContext;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Print the value of a key
    Get {
        /// Key name, e.g. ReleaseChannel
        key: String,

        /// Use the first matching line instead of the last
        #[arg(long)]
        first: bool,
    },

    /// Set a key, replacing its line or appending a new one
    Set {
        /// Key name
        key: String,

        /// New value
        value: String,
    },

    /// Print the effective tool settings
    Settings {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(self, ctx: &PinetContext) -> Result<CommandStatus> {
        match self.command {
            ConfigSubcommands::Get {
                key,
                first,
            } => {
                let mode = if first {
                    MatchMode::First
                } else {
                    MatchMode::Last
                };
                println!("{}", ctx.store.get_with(&key, mode).await?);
            }
            ConfigSubcommands::Set {
                key,
                value,
            } => {
                ctx.store.set(&key, &value).await?;
                tracing::info!("Set {} in {}", key, ctx.store.path().display());
            }
            ConfigSubcommands::Settings {
                json,
            } => {
                if json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&ctx.settings).context("Failed to serialize settings")?
                    );
                } else {
                    println!("{}", format!("# release channel: {} ({})", ctx.channel, ctx.branch()).dimmed());
                    println!("{}", toml::to_string_pretty(&ctx.settings).context("Failed to serialize settings")?);
                }
            }
        }
        Ok(CommandStatus::Success)
    }
}
