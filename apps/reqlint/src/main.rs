//! # reqlint - Requirements Manifest Linter
//!
//! The main binary for reqlint.
//!
//! This application provides:
//! - CLI interface for checking, formatting and comparing manifests
//! - HTTP REST API server (axum-based)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │            apps/reqlint (THE BINARY)          │
//! │                                               │
//! │     ┌─────────────┐      ┌─────────────┐      │
//! │     │    CLI      │      │  HTTP API   │      │
//! │     │   (clap)    │      │   (axum)    │      │
//! │     └──────┬──────┘      └──────┬──────┘      │
//! │            └─────────┬──────────┘             │
//! │                      ▼                        │
//! │              ┌───────────────┐                │
//! │              │ reqlint-core  │                │
//! │              │  (THE LOGIC)  │                │
//! │              └───────────────┘                │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! reqlint check requirements.txt --follow-includes
//! reqlint fmt requirements.txt --check
//! reqlint baseline save main requirements.txt
//! reqlint diff requirements.txt --baseline main
//! reqlint serve --port 8080
//! ```

use clap::Parser;
use reqlint::cli;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    // REQLINT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("REQLINT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "reqlint=debug,reqlint_core=debug,tower_http=debug"
    } else {
        "reqlint=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    // Logs go to stderr so that stdout stays parseable with --json.
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

    match cli::execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("error: {}", e);
            cli::exit_code_for(&e)
        }
    }
}
