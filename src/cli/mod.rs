//! Command-line interface for Voxgate.

use clap::{Parser, Subcommand};

/// Voxgate - text-to-speech and voice conversion behind a login
#[derive(Parser)]
#[command(name = "voxgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the web server (default)
    #[command(alias = "daemon")]
    Serve,

    /// Write a default config.toml to the working directory
    Init,
}

impl Cli {
    #[must_use]
    pub fn command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
