//! # Opptak CLI Module
//!
//! This module implements the CLI interface for Opptak.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize new database
//! - `status` - Show store status
//! - `import` - Import a catalog (requirements, codes, applicants, pathways)
//! - `save-rule` - Persist a rule expression
//! - `show-rule` - Print a persisted rule tree as JSON and text
//! - `delete-rule` - Delete a persisted rule tree
//! - `set-pathway-rule` - Replace or detach a pathway's rule tree
//! - `evaluate` - Evaluate an applicant against one or all pathways

mod commands;

use clap::{Parser, Subcommand};
use opptak_core::OpptakError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Opptak - admission eligibility engine
///
/// Stores boolean requirement trees for admission pathways and evaluates
/// applicants against them.
#[derive(Parser, Debug)]
#[command(name = "opptak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the rule database
    #[arg(short = 'D', long, global = true, default_value = "opptak.db")]
    pub database: PathBuf,

    /// Storage backend: "file" (snapshot file) or "redb" (ACID database)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Path to the engine configuration (TOML)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show store status
    Status,

    /// Import a catalog JSON file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Persist a rule expression read from a JSON file
    SaveRule {
        /// Expression file path
        #[arg(short, long)]
        file: PathBuf,

        /// Display name of the top node
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Print a persisted rule tree
    ShowRule {
        /// Rule node id
        #[arg(short, long)]
        id: u64,
    },

    /// Delete a persisted rule tree
    DeleteRule {
        /// Rule node id
        #[arg(short, long)]
        id: u64,
    },

    /// Replace a pathway's rule tree (omit --file to detach it)
    SetPathwayRule {
        /// Pathway id
        #[arg(short, long)]
        pathway: u64,

        /// Expression file path
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Evaluate an applicant
    Evaluate {
        /// Applicant id
        #[arg(short, long)]
        applicant: u64,

        /// Pathway id (all pathways when omitted)
        #[arg(short, long)]
        pathway: Option<u64>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), OpptakError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;
    let ctx = StoreContext {
        db_path: &cli.database,
        backend,
        config: cli.config.as_deref(),
    };

    if cli.verbose {
        tracing::info!(
            database = %cli.database.display(),
            backend,
            "Executing command"
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, &host, port).await,
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Status) => cmd_status(&ctx, json_mode),
        Some(Commands::Import { input }) => cmd_import(&ctx, json_mode, &input),
        Some(Commands::SaveRule { file, label }) => {
            cmd_save_rule(&ctx, json_mode, &file, label.as_deref())
        }
        Some(Commands::ShowRule { id }) => cmd_show_rule(&ctx, json_mode, id),
        Some(Commands::DeleteRule { id }) => cmd_delete_rule(&ctx, json_mode, id),
        Some(Commands::SetPathwayRule { pathway, file }) => {
            cmd_set_pathway_rule(&ctx, json_mode, pathway, file.as_deref())
        }
        Some(Commands::Evaluate { applicant, pathway }) => {
            cmd_evaluate(&ctx, json_mode, applicant, pathway)
        }
        None => {
            // No subcommand - show status by default
            cmd_status(&ctx, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
