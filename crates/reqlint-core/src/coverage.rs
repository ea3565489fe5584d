//! # Import Coverage
//!
//! Cross-checks a manifest against the Python sources it ships with.
//!
//! - `scan_imports` pulls top-level module names out of `import` statements
//! - `ImportResolver` maps a module name to the distribution that provides it
//! - `check_coverage` reports imports nobody declared and declarations nobody imports
//!
//! Scanning is line based. It does not evaluate code, so imports built at
//! runtime (`importlib.import_module`) are invisible.

use crate::manifest::Manifest;
use crate::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// IMPORT SCANNING
// =============================================================================

/// Top-level module names imported by `source`.
///
/// Handles `import a, b.c as d` and `from a.b import c` at any indentation.
/// Relative imports (`from . import x`) are skipped.
#[must_use]
pub fn scan_imports(source: &str) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    for line in source.lines() {
        let code = line.split('#').next().unwrap_or_default();
        for statement in code.split(';') {
            let statement = statement.trim();
            if let Some(rest) = statement.strip_prefix("import ") {
                for item in rest.split(',') {
                    let target = item.split_whitespace().next().unwrap_or_default();
                    if let Some(top) = top_level(target) {
                        modules.insert(top.to_string());
                    }
                }
            } else if let Some(rest) = statement.strip_prefix("from ") {
                let mut words = rest.split_whitespace();
                let target = words.next().unwrap_or_default();
                if words.next() == Some("import")
                    && let Some(top) = top_level(target)
                {
                    modules.insert(top.to_string());
                }
            }
        }
    }

    modules
}

fn top_level(dotted: &str) -> Option<&str> {
    if dotted.starts_with('.') {
        return None;
    }
    let top = dotted.split('.').next()?;
    let valid = !top.is_empty()
        && top.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !top.starts_with(|c: char| c.is_ascii_digit());
    valid.then_some(top)
}

// =============================================================================
// RESOLUTION
// =============================================================================

/// Standard library modules that never need a manifest entry.
const STDLIB: &[&str] = &[
    "__future__", "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect",
    "builtins", "bz2", "calendar", "collections", "concurrent", "configparser", "contextlib",
    "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal", "difflib", "enum", "errno",
    "fnmatch", "fractions", "functools", "gc", "getpass", "gettext", "glob", "gzip",
    "hashlib", "heapq", "hmac", "html", "http", "importlib", "inspect", "io", "ipaddress",
    "itertools", "json", "logging", "lzma", "math", "mimetypes", "multiprocessing", "numbers",
    "operator", "os", "pathlib", "pickle", "platform", "pprint", "queue", "random", "re",
    "secrets", "select", "shlex", "shutil", "signal", "socket", "sqlite3", "ssl", "stat",
    "statistics", "string", "struct", "subprocess", "sys", "tempfile", "textwrap",
    "threading", "time", "timeit", "tkinter", "token", "tokenize", "traceback", "types",
    "typing", "unicodedata", "unittest", "urllib", "uuid", "warnings", "weakref", "xml",
    "zipfile", "zlib",
];

/// Import names whose distribution is spelled differently.
const ALIASES: &[(&str, &str)] = &[
    ("attr", "attrs"),
    ("bs4", "beautifulsoup4"),
    ("cv2", "opencv-python"),
    ("dateutil", "python-dateutil"),
    ("dotenv", "python-dotenv"),
    ("gym", "gym"),
    ("PIL", "pillow"),
    ("sklearn", "scikit-learn"),
    ("skimage", "scikit-image"),
    ("torch_geometric", "torch-geometric"),
    ("yaml", "pyyaml"),
];

/// Maps import names to distribution names.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    stdlib: BTreeSet<String>,
    aliases: BTreeMap<String, String>,
}

impl Default for ImportResolver {
    fn default() -> Self {
        Self {
            stdlib: STDLIB.iter().map(|s| s.to_string()).collect(),
            aliases: ALIASES
                .iter()
                .map(|(module, dist)| (module.to_string(), normalize_name(dist)))
                .collect(),
        }
    }
}

impl ImportResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `module` as part of the standard library.
    pub fn add_stdlib(&mut self, module: impl Into<String>) {
        self.stdlib.insert(module.into());
    }

    /// Map `module` to `distribution`.
    pub fn add_alias(&mut self, module: impl Into<String>, distribution: &str) {
        self.aliases
            .insert(module.into(), normalize_name(distribution));
    }

    #[must_use]
    pub fn is_stdlib(&self, module: &str) -> bool {
        self.stdlib.contains(module)
    }

    /// Normalized distribution providing `module`, or `None` for stdlib.
    #[must_use]
    pub fn resolve(&self, module: &str) -> Option<String> {
        if self.is_stdlib(module) {
            return None;
        }
        Some(
            self.aliases
                .get(module)
                .cloned()
                .unwrap_or_else(|| normalize_name(module)),
        )
    }
}

// =============================================================================
// COVERAGE
// =============================================================================

/// An import with no matching manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MissingImport {
    pub module: String,
    pub distribution: String,
}

/// Outcome of `check_coverage`. All lists are sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Imported but not declared.
    pub undeclared: Vec<MissingImport>,
    /// Declared but never imported, as written in the manifest.
    pub unused: Vec<String>,
    /// Declared and imported, normalized.
    pub satisfied: Vec<String>,
}

impl CoverageReport {
    /// Every third-party import is declared.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.undeclared.is_empty()
    }
}

/// Compare declared requirements with imported modules.
#[must_use]
pub fn check_coverage(
    manifest: &Manifest,
    imports: &BTreeSet<String>,
    resolver: &ImportResolver,
) -> CoverageReport {
    let declared = manifest.dependency_set();
    let mut used: BTreeSet<String> = BTreeSet::new();
    let mut report = CoverageReport::default();

    for module in imports {
        let Some(distribution) = resolver.resolve(module) else {
            continue;
        };
        if declared.keys().any(|name| name.normalized() == distribution) {
            used.insert(distribution);
        } else {
            report.undeclared.push(MissingImport {
                module: module.clone(),
                distribution,
            });
        }
    }

    for name in declared.keys() {
        if used.contains(name.normalized()) {
            report.satisfied.push(name.normalized().to_string());
        } else {
            report.unused.push(name.as_str().to_string());
        }
    }

    report.undeclared.sort();
    report
}

// =============================================================================
// TESTS
// =============================================================================
