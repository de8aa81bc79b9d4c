//! # Stagetrack CLI Module
//!
//! This module implements the CLI interface for Stagetrack.
//!
//! ## Available Commands
//!
//! - `serve` - Start the view server
//! - `stages` - List the pipeline stages
//! - `access` - Show the stages the session may reach
//! - `pending` - Upstream records waiting on a stage
//! - `history` - A stage's own records
//! - `show` - One record by id
//! - `submit` - Submit a new record from a JSON file
//!
//! Every command except `serve` and `stages` acts for a session: pass the
//! login JWT with `--token` (or `STAGETRACK_TOKEN`), or name the user with
//! `--user`/`--role` when the stage services accept unauthenticated calls.

mod commands;

use clap::{Parser, Subcommand};
use stagetrack_core::TrackError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stagetrack - production stage tracker
///
/// Shows which records of each production stage are still waiting on the
/// next stage, and submits the next stage's records.
#[derive(Parser, Debug)]
#[command(name = "stagetrack")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Login JWT of the session
    #[arg(long, global = true, env = "STAGETRACK_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username of the session (when no token is given)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Role of the session: admin or user
    #[arg(short, long, global = true, default_value = "user")]
    pub role: String,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the view server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// List the pipeline stages
    Stages,

    /// Show the stages the session may reach
    Access,

    /// Upstream records waiting on a stage
    Pending {
        /// Stage name, e.g. "Hot Coil"
        #[arg(short, long)]
        stage: String,

        /// Search text
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Records of a stage
    History {
        /// Stage name
        #[arg(short, long)]
        stage: String,

        /// Search text
        #[arg(long, default_value = "")]
        query: String,
    },

    /// Show one record
    Show {
        /// Stage name
        #[arg(short, long)]
        stage: String,

        /// Record id
        #[arg(long)]
        id: String,
    },

    /// Submit a new record
    Submit {
        /// Stage name
        #[arg(short, long)]
        stage: String,

        /// JSON object with the form fields
        #[arg(short, long)]
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TrackError> {
    let ctx = CommandContext::from_cli(&cli)?;

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(&ctx, &host, port).await,
        Some(Commands::Stages) | None => cmd_stages(&ctx),
        Some(Commands::Access) => cmd_access(&ctx).await,
        Some(Commands::Pending { stage, query }) => cmd_pending(&ctx, &stage, &query).await,
        Some(Commands::History { stage, query }) => cmd_history(&ctx, &stage, &query).await,
        Some(Commands::Show { stage, id }) => cmd_show(&ctx, &stage, &id).await,
        Some(Commands::Submit { stage, file }) => cmd_submit(&ctx, &stage, &file).await,
    }
}
