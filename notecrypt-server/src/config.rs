//! Command-line and environment configuration.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "notecrypt-server")]
#[command(about = "Note store and encryption profile service")]
pub struct Args {
    /// SQLite database file
    #[arg(long, env = "NOTECRYPT_DATABASE", default_value = "notecrypt.db", global = true)]
    pub database: PathBuf,

    /// Log filter directive, e.g. `info` or `notecrypt_server=debug`
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_filter: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve(ServeArgs),

    /// Run a one-shot data migration and exit
    Migrate {
        #[arg(value_enum)]
        migration: Migration,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "NOTECRYPT_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Expose the destructive profile reset endpoint
    #[arg(long, env = "NOTECRYPT_ALLOW_RESET")]
    pub allow_reset: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            allow_reset: false,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// Rewrite `_encrypted` markers to match field shapes
    RecomputeMarkers,
    /// Provision stable keys for accounts that only have a salt
    BackfillKeys,
    /// Make sure plaintext notes carry an explicit marker
    MarkLegacy,
}
