//! CLI interface for Parley
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for driving the debate engine.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley Debate Engine
///
/// Orchestrates a moderated debate between two configurable bots, with a
/// facilitator judging every exchange and a quota bounding unsupervised runs.
#[derive(Parser, Debug)]
#[command(name = "parley")]
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
    /// Start an interactive debate session
    Chat {
        /// Opening topic; when omitted the session starts empty
        topic: Option<String>,
    },

    /// List models available from the configured backends
    Models {
        /// Restrict the listing to one provider (openai or ollama)
        #[arg(long)]
        provider: Option<String>,
    },

    /// Manage saved bot templates
    Bank {
        #[command(subcommand)]
        action: BankAction,
    },

    /// Export the conversation and bot bank to a JSON file
    Export {
        /// Destination path
        path: PathBuf,
    },

    /// Import a conversation and bot bank from a JSON file
    Import {
        /// Source path
        path: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Bot bank management actions
#[derive(Subcommand, Debug)]
pub enum BankAction {
    /// List saved bot templates
    List,

    /// Show a template's full configuration
    Show {
        /// Template uid
        uid: String,
    },

    /// Remove a template
    Rm {
        /// Template uid
        uid: String,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate,
}
