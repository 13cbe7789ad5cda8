//! # Opptak - Admission Eligibility Server
//!
//! The main binary for the Opptak eligibility rule engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for rule and catalog operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │               apps/opptak (THE BINARY)           │
//! │                                                  │
//! │   ┌─────────────┐            ┌─────────────┐     │
//! │   │    CLI      │            │  HTTP API   │     │
//! │   │   (clap)    │            │   (axum)    │     │
//! │   └──────┬──────┘            └──────┬──────┘     │
//! │          └──────────────┬───────────┘            │
//! │                         ▼                        │
//! │                 ┌───────────────┐                │
//! │                 │  opptak-core  │                │
//! │                 │ (THE ENGINE)  │                │
//! │                 └───────────────┘                │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! opptak server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! opptak import -i catalog.json
//! opptak set-pathway-rule -p 1 -f rule.json
//! opptak evaluate -a 7
//! ```

use clap::Parser;
use opptak::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // OPPTAK_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("OPPTAK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "opptak=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Opptak startup banner.
fn print_banner() {
    println!(
        r#"
   ___  ____  ____  _____  _    _  __
  / _ \|  _ \|  _ \|_   _|/ \  | |/ /
 | | | | |_) | |_) | | | / _ \ | ' /
 | |_| |  __/|  __/  | |/ ___ \| . \
  \___/|_|   |_|     |_/_/   \_\_|\_\

  Admission Eligibility Engine v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
