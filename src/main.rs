//! PiNet CLI entry point
//!
//! Parses the command line, runs the subcommand and turns the result into
//! the exit status the PiNet menu scripts read: 0 for success, 10 when the
//! caller should act on what happened, 1 for errors.

use clap::Parser;
use pinet_cli::cli;
use pinet_cli::core::user_friendly_error;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    match cli.execute().await {
        Ok(status) => std::process::exit(status.code()),
        Err(e) => {
            tracing::error!("{e:#}");
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
