//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{Backend, BaselineAction, Context, SnapshotFormat};
use crate::api::{self, AppState};
use reqlint_core::{
    BaselineStore, Baselines, Linter, Manifest, ReqlintError, Report, Severity, Snapshot,
    check_coverage, diff, export_snapshot, primitives::MAX_INCLUDE_DEPTH,
    primitives::MAX_MANIFEST_BYTES, scan_imports, snapshot_checksum, snapshot_crypto_hash,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a Python source scanned by `coverage` (10 MB).
const MAX_SOURCE_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), ReqlintError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| ReqlintError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(ReqlintError::ManifestTooLarge(format!(
            "'{}' is {} bytes, maximum is {}",
            path.display(),
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve a path to an existing regular file.
///
/// Canonicalizing resolves `..` and symlinks, so include cycles are detected
/// by comparing canonical paths.
fn validate_file_path(path: &Path) -> Result<PathBuf, ReqlintError> {
    let canonical = path.canonicalize().map_err(|e| {
        ReqlintError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(ReqlintError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path: its parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, ReqlintError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        ReqlintError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(ReqlintError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| ReqlintError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_text(path: &Path, max_size: u64) -> Result<String, ReqlintError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read_to_string(&validated)
        .map_err(|e| ReqlintError::IoError(format!("Read '{}': {}", path.display(), e)))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// MANIFEST LOADING
// =============================================================================

/// A manifest read from disk.
#[derive(Debug)]
pub struct LoadedManifest {
    /// Path as the user (or the including file) wrote it.
    pub origin: String,
    pub manifest: Manifest,
}

/// Read and parse one manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest, ReqlintError> {
    let text = read_text(path, MAX_MANIFEST_BYTES as u64)?;
    Manifest::parse(&text)
}

/// Read `root` and, when `follow` is set, every file it pulls in with `-r`.
///
/// Include paths are relative to the including file. Each file is loaded
/// once even if included repeatedly, so cycles terminate.
pub fn load_with_includes(root: &Path, follow: bool) -> Result<Vec<LoadedManifest>, ReqlintError> {
    let mut loaded = Vec::new();
    let mut visited = BTreeSet::new();
    visit(root, 0, follow, &mut visited, &mut loaded)?;
    Ok(loaded)
}

fn visit(
    path: &Path,
    depth: usize,
    follow: bool,
    visited: &mut BTreeSet<PathBuf>,
    loaded: &mut Vec<LoadedManifest>,
) -> Result<(), ReqlintError> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(ReqlintError::IoError(format!(
            "'{}' is nested more than {} includes deep",
            path.display(),
            MAX_INCLUDE_DEPTH
        )));
    }

    let canonical = validate_file_path(path)?;
    if !visited.insert(canonical.clone()) {
        tracing::debug!(path = %path.display(), "Already loaded, skipping");
        return Ok(());
    }

    let manifest = load_manifest(&canonical)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let includes: Vec<PathBuf> = if follow {
        manifest.includes().map(|inc| base.join(inc)).collect()
    } else {
        Vec::new()
    };

    tracing::debug!(
        path = %path.display(),
        entries = manifest.requirement_count(),
        includes = includes.len(),
        "Loaded manifest"
    );
    loaded.push(LoadedManifest {
        origin: path.display().to_string(),
        manifest,
    });

    for include in includes {
        visit(&include, depth + 1, follow, visited, loaded)?;
    }
    Ok(())
}

/// Open the baseline store selected on the command line.
pub fn open_store(database: &Path, backend: Backend) -> Result<Baselines, ReqlintError> {
    match backend {
        Backend::Memory => Ok(Baselines::in_memory()),
        Backend::Redb => Baselines::open_redb(database),
    }
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Lint manifests.
pub fn cmd_check(
    ctx: &Context,
    files: &[PathBuf],
    follow_includes: bool,
    strict: bool,
) -> Result<ExitCode, ReqlintError> {
    let mut lint_config = ctx.config.lint.clone();
    lint_config.strict |= strict;
    let linter = Linter::new(lint_config);

    let mut report = Report::default();
    let mut checked: Vec<String> = Vec::new();

    for file in files {
        let loaded = load_with_includes(file, follow_includes)?;
        let set: Vec<(&str, &Manifest)> = loaded
            .iter()
            .map(|l| (l.origin.as_str(), &l.manifest))
            .collect();
        report
            .diagnostics
            .extend(linter.lint_set(&set).diagnostics);
        checked.extend(loaded.iter().map(|l| l.origin.clone()));
    }

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    let infos = report.count(Severity::Info);
    tracing::info!(files = checked.len(), errors, warnings, infos, "Check finished");

    if ctx.json {
        print_json(&serde_json::json!({
            "files": checked,
            "diagnostics": report.diagnostics,
            "errors": errors,
            "warnings": warnings,
            "infos": infos,
        }));
    } else {
        for diagnostic in &report.diagnostics {
            println!("{}", diagnostic);
        }
        if !ctx.quiet {
            println!(
                "Checked {} file(s): {} error(s), {} warning(s), {} info",
                checked.len(),
                errors,
                warnings,
                infos
            );
        }
    }

    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

// =============================================================================
// PARSE COMMAND
// =============================================================================

/// Show parsed entries.
pub fn cmd_parse(ctx: &Context, file: &Path) -> Result<ExitCode, ReqlintError> {
    let manifest = load_manifest(file)?;

    if ctx.json {
        let entries: Vec<serde_json::Value> = manifest
            .entries()
            .map(|entry| {
                let req = entry.requirement;
                serde_json::json!({
                    "line": entry.line,
                    "name": req.name.as_str(),
                    "normalized": req.name.normalized(),
                    "extras": req.extras,
                    "specifiers": req.specifiers.to_string(),
                    "minimum": req.specifiers.minimum().map(|v| v.to_string()),
                    "marker": req.marker,
                    "section": entry.section.map(|s| s.label()),
                })
            })
            .collect();
        let errors: Vec<serde_json::Value> = manifest
            .errors()
            .map(|(line, reason)| serde_json::json!({ "line": line, "reason": reason }))
            .collect();
        print_json(&serde_json::json!({
            "file": file.display().to_string(),
            "entries": entries,
            "errors": errors,
        }));
        return Ok(ExitCode::SUCCESS);
    }

    for entry in manifest.entries() {
        let req = entry.requirement;
        let constraint = req
            .specifiers
            .iter()
            .map(|s| s.describe())
            .collect::<Vec<_>>()
            .join(", ");
        let constraint = if constraint.is_empty() {
            "any version".to_string()
        } else {
            constraint
        };
        match entry.section {
            Some(section) => println!(
                "{:>4}  {}  {}  [{}]",
                entry.line,
                req.name,
                constraint,
                section.label()
            ),
            None => println!("{:>4}  {}  {}", entry.line, req.name, constraint),
        }
    }
    for (line, reason) in manifest.errors() {
        println!("{:>4}  invalid: {}", line, reason);
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List declared packages.
pub fn cmd_list(
    ctx: &Context,
    file: &Path,
    section: Option<&str>,
    required_only: bool,
) -> Result<ExitCode, ReqlintError> {
    let manifest = load_manifest(file)?;

    let selected: Vec<_> = manifest
        .entries()
        .filter(|entry| match (section, entry.section) {
            (Some(wanted), Some(actual)) => actual.label().eq_ignore_ascii_case(wanted),
            (Some(_), None) => false,
            (None, _) => true,
        })
        .filter(|entry| !(required_only && entry.section.is_some_and(|s| s.is_optional())))
        .collect();

    if ctx.json {
        let packages: Vec<serde_json::Value> = selected
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "name": entry.requirement.name.as_str(),
                    "specifiers": entry.requirement.specifiers.to_string(),
                })
            })
            .collect();
        print_json(&serde_json::json!(packages));
    } else {
        for entry in &selected {
            println!(
                "{}{}",
                entry.requirement.name, entry.requirement.specifiers
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// FMT COMMAND
// =============================================================================

/// Print or write the normalized manifest.
pub fn cmd_fmt(
    ctx: &Context,
    file: &Path,
    write: bool,
    check: bool,
) -> Result<ExitCode, ReqlintError> {
    let validated = validate_file_path(file)?;
    let original = read_text(&validated, MAX_MANIFEST_BYTES as u64)?;
    let manifest = Manifest::parse(&original)?;
    let formatted = manifest.render_normalized();
    let changed = formatted != original;

    if check {
        if ctx.json {
            print_json(&serde_json::json!({
                "file": file.display().to_string(),
                "normalized": !changed,
            }));
        } else if changed {
            println!("{} is not normalized", file.display());
        } else if !ctx.quiet {
            println!("{} is normalized", file.display());
        }
        return Ok(if changed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        });
    }

    if write {
        if changed {
            std::fs::write(&validated, &formatted)
                .map_err(|e| ReqlintError::IoError(format!("Write file: {}", e)))?;
            tracing::info!(path = %validated.display(), "Rewrote manifest");
        }
        if !ctx.quiet {
            println!(
                "{} {}",
                if changed { "Formatted" } else { "Unchanged" },
                file.display()
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    print!("{}", formatted);
    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// DIFF COMMAND
// =============================================================================

/// Compare two manifests, or a manifest against a baseline.
pub fn cmd_diff(
    ctx: &Context,
    first: &Path,
    second: Option<&Path>,
    baseline: Option<&str>,
) -> Result<ExitCode, ReqlintError> {
    let current = load_manifest(first)?.dependency_set();

    let (old, new, label) = match (second, baseline) {
        (Some(second), None) => (
            current,
            load_manifest(second)?.dependency_set(),
            format!("{} -> {}", first.display(), second.display()),
        ),
        (None, Some(name)) => {
            let store = open_store(&ctx.database, ctx.backend)?;
            let snapshot = store
                .load(name)?
                .ok_or_else(|| ReqlintError::NotFound(format!("baseline '{}'", name)))?;
            (
                snapshot.dependency_set()?,
                current,
                format!("baseline '{}' -> {}", name, first.display()),
            )
        }
        _ => {
            return Err(ReqlintError::Config(
                "diff needs either a second file or --baseline".to_string(),
            ));
        }
    };

    let result = diff(&old, &new);

    if ctx.json {
        print_json(&serde_json::json!(result));
        return Ok(ExitCode::SUCCESS);
    }

    if !ctx.quiet {
        println!("{}", label);
    }
    for req in &result.added {
        println!("+ {}", req);
    }
    for req in &result.removed {
        println!("- {}", req);
    }
    for change in &result.changed {
        println!(
            "~ {}: {} -> {}",
            change.name, change.old.specifiers, change.new.specifiers
        );
    }
    if !ctx.quiet {
        println!(
            "{} added, {} removed, {} changed, {} unchanged",
            result.added.len(),
            result.removed.len(),
            result.changed.len(),
            result.unchanged
        );
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// BASELINE COMMAND
// =============================================================================

/// Manage stored baselines.
pub fn cmd_baseline(ctx: &Context, action: BaselineAction) -> Result<ExitCode, ReqlintError> {
    if ctx.backend == Backend::Memory {
        tracing::warn!("Memory backend selected: baselines are discarded on exit");
    }
    let mut store = open_store(&ctx.database, ctx.backend)?;

    match action {
        BaselineAction::Save { name, file } => {
            let snapshot = Snapshot::from_manifest(&load_manifest(&file)?);
            let revision = store.save(&name, &snapshot)?;
            tracing::info!(name = %name, revision, "Saved baseline");
            if ctx.json {
                print_json(&serde_json::json!({
                    "name": name,
                    "revision": revision,
                    "entries": snapshot.len(),
                }));
            } else {
                println!(
                    "Saved baseline '{}' revision {} ({} entries)",
                    name,
                    revision,
                    snapshot.len()
                );
            }
        }

        BaselineAction::Show { name } => {
            let snapshot = store
                .load(&name)?
                .ok_or_else(|| ReqlintError::NotFound(format!("baseline '{}'", name)))?;
            if ctx.json {
                print_json(&serde_json::json!(snapshot));
            } else {
                for entry in &snapshot.entries {
                    match &entry.section {
                        Some(section) => println!("{}  [{}]", entry.requirement, section),
                        None => println!("{}", entry.requirement),
                    }
                }
            }
        }

        BaselineAction::List => {
            let infos = store.list()?;
            if ctx.json {
                print_json(&serde_json::json!(infos));
            } else if infos.is_empty() {
                if !ctx.quiet {
                    println!("No baselines stored in {}", ctx.database.display());
                }
            } else {
                for info in &infos {
                    println!(
                        "{}  revision {}  {} entries",
                        info.name, info.revision, info.entries
                    );
                }
            }
        }

        BaselineAction::Remove { name } => {
            if !store.remove(&name)? {
                return Err(ReqlintError::NotFound(format!("baseline '{}'", name)));
            }
            tracing::info!(name = %name, "Removed baseline");
            if !ctx.quiet {
                println!("Removed baseline '{}'", name);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// SNAPSHOT COMMAND
// =============================================================================

/// Write the canonical snapshot of a manifest.
pub fn cmd_snapshot(
    ctx: &Context,
    file: &Path,
    output: &Path,
    format: SnapshotFormat,
) -> Result<ExitCode, ReqlintError> {
    let validated_output = validate_output_path(output)?;
    let manifest = load_manifest(file)?;
    let snapshot = Snapshot::from_manifest(&manifest);

    let data = match format {
        SnapshotFormat::Canonical => export_snapshot(&snapshot)?,
        SnapshotFormat::Json => serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| ReqlintError::SerializationError(e.to_string()))?,
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| ReqlintError::IoError(format!("Write file: {}", e)))?;

    let checksum = snapshot.checksum();
    if ctx.json {
        print_json(&serde_json::json!({
            "output": validated_output.display().to_string(),
            "bytes": data.len(),
            "entries": snapshot.len(),
            "checksum": checksum,
        }));
    } else if !ctx.quiet {
        println!("Checksum: {}", checksum);
        println!("Exported {} bytes to {:?}", data.len(), validated_output);
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Print the BLAKE3 hash of a manifest's canonical snapshot.
pub fn cmd_hash(ctx: &Context, file: &Path) -> Result<ExitCode, ReqlintError> {
    let manifest = load_manifest(file)?;
    let hash = snapshot_crypto_hash(&manifest)?;
    let checksum = snapshot_checksum(&manifest);

    if ctx.json {
        print_json(&serde_json::json!({
            "file": file.display().to_string(),
            "blake3": hash,
            "checksum": checksum,
            "entries": manifest.dependency_set().len(),
        }));
    } else {
        println!("{}  {}", hash, file.display());
    }

    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// COVERAGE COMMAND
// =============================================================================

/// Check that third-party imports are declared.
pub fn cmd_coverage(
    ctx: &Context,
    manifest_path: &Path,
    sources: &[PathBuf],
) -> Result<ExitCode, ReqlintError> {
    let manifest = load_manifest(manifest_path)?;

    let mut imports = BTreeSet::new();
    for source in sources {
        let text = read_text(source, MAX_SOURCE_FILE_SIZE)?;
        imports.extend(scan_imports(&text));
    }

    let resolver = ctx.config.coverage.resolver();
    let report = check_coverage(&manifest, &imports, &resolver);
    tracing::info!(
        imports = imports.len(),
        undeclared = report.undeclared.len(),
        unused = report.unused.len(),
        "Coverage finished"
    );

    if ctx.json {
        print_json(&serde_json::json!(report));
    } else {
        for missing in &report.undeclared {
            println!(
                "undeclared: '{}' (install as '{}')",
                missing.module, missing.distribution
            );
        }
        for name in &report.unused {
            println!("unused: '{}' is declared but never imported", name);
        }
        if !ctx.quiet {
            println!(
                "{} satisfied, {} undeclared, {} unused",
                report.satisfied.len(),
                report.undeclared.len(),
                report.unused.len()
            );
        }
    }

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_serve(
    ctx: &Context,
    host: Option<String>,
    port: Option<u16>,
) -> Result<ExitCode, ReqlintError> {
    let host = host.unwrap_or_else(|| ctx.config.server.host.clone());
    let port = port.unwrap_or(ctx.config.server.port);
    let store = open_store(&ctx.database, ctx.backend)?;

    if !ctx.quiet {
        println!("reqlint HTTP server v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Configuration:");
        println!("  Host:     {}", host);
        println!("  Port:     {}", port);
        println!("  Backend:  {}", ctx.backend.as_str());
        println!("  Database: {:?}", ctx.database);
        println!();
        println!("Endpoints:");
        println!("  GET  /health                - Health check");
        println!("  POST /parse                 - Parse a manifest");
        println!("  POST /check                 - Lint a manifest");
        println!("  POST /diff                  - Compare two manifests");
        println!("  POST /coverage              - Check import coverage");
        println!("  POST /snapshot              - Canonical snapshot (base64)");
        println!("  GET  /baselines             - List baselines");
        println!("  POST /baselines/{{name}}      - Save a baseline");
        println!("  POST /baselines/{{name}}/diff - Diff against a baseline");
        println!();
        println!("Press Ctrl+C to stop");
        println!();
    }

    let state = AppState::with_config(
        store,
        Linter::new(ctx.config.lint.clone()),
        ctx.config.coverage.resolver(),
    );
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await?;
    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// TESTS
// =============================================================================
