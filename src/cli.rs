//! CLI definitions for EZPass.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// EZPass CLI.
#[derive(Parser)]
#[command(name = "ezpass")]
#[command(about = "Field-mapping autofill client for a local credential service")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: ~/.ezpass/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Credential service endpoint, overrides the configured one
    #[arg(short, long, global = true, env = "EZPASS_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the origin key of a page address
    Normalize {
        /// Page address
        address: String,
    },

    /// Request credentials for a page address and print the answer
    Fetch {
        /// Page address
        address: String,
    },

    /// Fill a page snapshot with the credentials stored for its origin
    Fill {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: PathBuf,

        /// Write the filled snapshot back to disk
        #[arg(long)]
        write: bool,
    },

    /// Assign a role to an input of a page snapshot
    Map {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: PathBuf,

        /// Locator of the drop target
        #[arg(long)]
        target: String,

        /// Role to assign
        #[arg(long, value_parser = ["username", "password"])]
        role: String,
    },

    /// List stored field mappings
    Mappings {
        /// Only show the mapping for this page address
        address: Option<String>,
    },

    /// Save the credentials typed into a page snapshot
    Save {
        /// Page snapshot (JSON)
        #[arg(long)]
        page: PathBuf,
    },
}
