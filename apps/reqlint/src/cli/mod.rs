//! # reqlint CLI Module
//!
//! This module implements the CLI interface for reqlint.
//!
//! ## Available Commands
//!
//! - `check` - Lint manifests (exit 1 on errors)
//! - `parse` - Show parsed entries
//! - `list` - List declared packages
//! - `fmt` - Print or write the normalized manifest
//! - `diff` - Compare two manifests, or a manifest with a baseline
//! - `baseline` - Save, show, list and remove baselines
//! - `snapshot` - Write the canonical snapshot
//! - `hash` - BLAKE3 hash of the canonical snapshot
//! - `coverage` - Check that every third-party import is declared
//! - `serve` - Start the HTTP server

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand, ValueEnum};
use reqlint_core::ReqlintError;
use std::path::PathBuf;
use std::process::ExitCode;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// reqlint - requirements manifest linter
///
/// Checks that every entry names a package and a minimum version, that no
/// package is declared twice, and that comment lines stay section labels.
#[derive(Parser, Debug)]
#[command(name = "reqlint")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print findings, no summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to reqlint.toml (default: ./reqlint.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the baseline database
    #[arg(short = 'D', long, global = true, default_value = "reqlint.redb")]
    pub database: PathBuf,

    /// Baseline storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Baseline storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Volatile, per-process
    Memory,
    /// ACID database file
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redb => "redb",
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lint one or more manifests
    Check {
        /// Manifest files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Also lint files pulled in with -r
        #[arg(short = 'r', long)]
        follow_includes: bool,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Show parsed entries
    Parse {
        /// Manifest file
        file: PathBuf,
    },

    /// List declared packages
    List {
        /// Manifest file
        file: PathBuf,

        /// Only packages under this section label
        #[arg(short, long)]
        section: Option<String>,

        /// Skip packages in sections labelled "Optional..."
        #[arg(long)]
        required_only: bool,
    },

    /// Print the normalized manifest
    Fmt {
        /// Manifest file
        file: PathBuf,

        /// Rewrite the file in place
        #[arg(short, long, conflicts_with = "check")]
        write: bool,

        /// Exit 1 if the file is not normalized
        #[arg(long)]
        check: bool,
    },

    /// Compare two manifests, or one manifest with a stored baseline
    Diff {
        /// Old manifest (or the manifest to compare with --baseline)
        first: PathBuf,

        /// New manifest
        #[arg(required_unless_present = "baseline", conflicts_with = "baseline")]
        second: Option<PathBuf>,

        /// Baseline to compare against
        #[arg(short, long)]
        baseline: Option<String>,
    },

    /// Manage stored baselines
    Baseline {
        #[command(subcommand)]
        action: BaselineAction,
    },

    /// Write the canonical snapshot of a manifest
    Snapshot {
        /// Manifest file
        file: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Snapshot format
        #[arg(short = 't', long, value_enum, default_value_t = SnapshotFormat::Canonical)]
        format: SnapshotFormat,
    },

    /// Compute BLAKE3 cryptographic hash of the canonical snapshot
    Hash {
        /// Manifest file
        file: PathBuf,
    },

    /// Check that imports in Python sources are declared
    Coverage {
        /// Manifest file
        manifest: PathBuf,

        /// Python source files
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Host to bind to (default from config, else 127.0.0.1)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (default from config, else 8080)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Baseline subcommands.
#[derive(Subcommand, Debug)]
pub enum BaselineAction {
    /// Store the current state of a manifest
    Save {
        /// Baseline name
        name: String,
        /// Manifest file
        file: PathBuf,
    },
    /// Print a stored baseline
    Show {
        /// Baseline name
        name: String,
    },
    /// List stored baselines
    List,
    /// Delete a baseline
    Remove {
        /// Baseline name
        name: String,
    },
}

/// Output format for `snapshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SnapshotFormat {
    Canonical,
    Json,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Options shared by every command.
#[derive(Debug)]
pub struct Context {
    pub json: bool,
    pub quiet: bool,
    pub database: PathBuf,
    pub backend: Backend,
    pub config: Config,
}

/// Execute the CLI with parsed arguments.
///
/// `Ok(ExitCode::FAILURE)` means the command ran and found problems.
pub async fn execute(cli: Cli) -> Result<ExitCode, ReqlintError> {
    let config = Config::load(cli.config.as_deref())?;
    let ctx = Context {
        json: cli.json,
        quiet: cli.quiet,
        database: cli.database,
        backend: cli.backend,
        config,
    };

    match cli.command {
        Commands::Check {
            files,
            follow_includes,
            strict,
        } => cmd_check(&ctx, &files, follow_includes, strict),
        Commands::Parse { file } => cmd_parse(&ctx, &file),
        Commands::List {
            file,
            section,
            required_only,
        } => cmd_list(&ctx, &file, section.as_deref(), required_only),
        Commands::Fmt { file, write, check } => cmd_fmt(&ctx, &file, write, check),
        Commands::Diff {
            first,
            second,
            baseline,
        } => cmd_diff(&ctx, &first, second.as_deref(), baseline.as_deref()),
        Commands::Baseline { action } => cmd_baseline(&ctx, action),
        Commands::Snapshot {
            file,
            output,
            format,
        } => cmd_snapshot(&ctx, &file, &output, format),
        Commands::Hash { file } => cmd_hash(&ctx, &file),
        Commands::Coverage { manifest, sources } => cmd_coverage(&ctx, &manifest, &sources),
        Commands::Serve { host, port } => cmd_serve(&ctx, host, port).await,
    }
}

/// Exit code for an error that aborted a command: 2 for bad configuration
/// or arguments, 1 for everything else.
#[must_use]
pub fn exit_code_for(error: &ReqlintError) -> ExitCode {
    match error {
        ReqlintError::Config(_) | ReqlintError::UnknownRule(_) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::try_parse_from([
            "reqlint",
            "--json",
            "check",
            "requirements.txt",
            "dev.txt",
            "--follow-includes",
            "--strict",
        ])
        .expect("valid arguments");
        assert!(cli.json);
        assert_eq!(cli.backend, Backend::Redb);
        let Commands::Check {
            files,
            follow_includes,
            strict,
        } = cli.command
        else {
            panic!("expected check");
        };
        assert_eq!(files.len(), 2);
        assert!(follow_includes && strict);
    }

    #[test]
    fn diff_needs_second_file_or_baseline() {
        assert!(Cli::try_parse_from(["reqlint", "diff", "a.txt"]).is_err());
        assert!(Cli::try_parse_from(["reqlint", "diff", "a.txt", "--baseline", "main"]).is_ok());
        assert!(
            Cli::try_parse_from(["reqlint", "diff", "a.txt", "b.txt", "--baseline", "main"])
                .is_err()
        );
    }
}
