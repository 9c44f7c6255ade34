//! CLI interface for Switchboard
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for running the orchestrator.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Switchboard service orchestrator
///
/// Keeps a registry of downstream services, routes each query to one of them
/// by keyword or with a local language model, and dispatches it.
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP intake until interrupted
    Serve {
        /// Override the configured bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Route and dispatch a single query
    Ask {
        /// The query to dispatch
        prompt: String,
    },

    /// List the persisted service registry
    Services,

    /// Register a service
    Register {
        /// Stable service id
        #[arg(long)]
        id: String,

        /// Routable service name
        #[arg(long)]
        name: String,

        /// Base URL, or `internal`
        #[arg(long)]
        endpoint: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        system_prompt: Option<String>,

        /// Fast-path keyword (repeatable)
        #[arg(short, long = "keyword", value_name = "KEYWORD")]
        keywords: Vec<String>,
    },

    /// Run one reconciliation pass and print the report
    Reconcile,
}
