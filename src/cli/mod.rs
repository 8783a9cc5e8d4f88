//! CLI entry point for zcrm.

pub mod commands;

use clap::{Parser, Subcommand};

/// Zoho CRM token and record CLI
#[derive(Parser, Debug)]
#[command(name = "zcrm", version, about = "Zoho CRM token flow and record listing")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List records of a CRM module
    Records(RecordsArgs),
    /// Token management
    Token(TokenArgs),
}

/// Arguments for `zcrm records`.
#[derive(Parser, Debug)]
pub struct RecordsArgs {
    /// Module API name (e.g. Purchase_Orders)
    pub module: String,

    /// Reuse and update the on-disk token cache
    #[arg(long)]
    pub cache: bool,

    /// Page number
    #[arg(long)]
    pub page: Option<u32>,

    /// Records per page
    #[arg(long)]
    pub per_page: Option<u32>,
}

/// Arguments for the `token` subcommand group.
#[derive(Parser, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

/// Token subcommands.
#[derive(Subcommand, Debug)]
pub enum TokenCommands {
    /// Show the cached token for the configured client
    Status,
    /// Delete the cached token for the configured client
    Clear,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
