//! # Stagetrack - Production Stage Tracker
//!
//! The main binary for Stagetrack.
//!
//! This application provides:
//! - JSON view server (axum-based)
//! - CLI interface for the pending, history and submit flows
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   apps/stagetrack (THE BINARY)                  │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │ View server │    │  Stage client    │     │
//! │  │  (clap)     │    │   (axum)    │    │   (reqwest)      │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                  ┌──────────────────┐                           │
//! │                  │ stagetrack-core  │                           │
//! │                  │   (THE RULES)    │                           │
//! │                  └──────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the view server
//! stagetrack serve --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! stagetrack stages
//! stagetrack --user asha pending --stage "Hot Coil"
//! stagetrack --token "$JWT" submit --stage "Hot Coil" --file coil.json
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Logs go to stderr; STAGETRACK_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("STAGETRACK_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stagetrack=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = stagetrack::cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = stagetrack::cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stagetrack startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┌─┐┌─┐┌┬┐┬─┐┌─┐┌─┐┬┌─
  └─┐ │ ├─┤│ ┬├┤  │ ├┬┘├─┤│  ├┴┐
  └─┘ ┴ ┴ ┴└─┘└─┘ ┴ ┴└─┴ ┴└─┘┴ ┴

  Production Stage Tracker v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
