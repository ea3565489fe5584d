//! # Lint Module
//!
//! Checks a parsed manifest against the manifest contract:
//!
//! - every entry line is `<name><operator><version>` (`syntax`, `unbounded`)
//! - no package is declared twice (`duplicate`)
//! - constraints can be satisfied (`unsatisfiable`)
//! - entries state minimums rather than caps or pins (`upper-bound`, `pinned`)
//!
//! Each rule has a stable code and a default severity; `LintConfig` can
//! override severities or turn rules off.

use crate::manifest::Manifest;
use crate::parser::LineKind;
use crate::{ReqlintError, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RULES
// =============================================================================

/// A lint rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rule {
    Syntax,
    Duplicate,
    Unsatisfiable,
    Unbounded,
    UpperBound,
    Pinned,
    NonNormalizedName,
    Directive,
    EmptySection,
}

impl Rule {
    /// Every rule, in report order.
    pub const ALL: [Rule; 9] = [
        Rule::Syntax,
        Rule::Duplicate,
        Rule::Unsatisfiable,
        Rule::Unbounded,
        Rule::UpperBound,
        Rule::Pinned,
        Rule::NonNormalizedName,
        Rule::Directive,
        Rule::EmptySection,
    ];

    /// Stable code used in config files and output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::Duplicate => "duplicate",
            Self::Unsatisfiable => "unsatisfiable",
            Self::Unbounded => "unbounded",
            Self::UpperBound => "upper-bound",
            Self::Pinned => "pinned",
            Self::NonNormalizedName => "non-normalized-name",
            Self::Directive => "directive",
            Self::EmptySection => "empty-section",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::Syntax | Self::Duplicate | Self::Unsatisfiable => Severity::Error,
            Self::Unbounded => Severity::Warning,
            Self::UpperBound
            | Self::Pinned
            | Self::NonNormalizedName
            | Self::Directive
            | Self::EmptySection => Severity::Info,
        }
    }

    /// One-line description for `--help`-style listings.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Syntax => "line is not a comment, option, or valid requirement",
            Self::Duplicate => "package declared more than once",
            Self::Unsatisfiable => "no version can satisfy the constraints",
            Self::Unbounded => "requirement has no minimum version",
            Self::UpperBound => "requirement caps the version from above",
            Self::Pinned => "requirement pins an exact version",
            Self::NonNormalizedName => "package name is not in normalized spelling",
            Self::Directive => "line is a pip option rather than a dependency",
            Self::EmptySection => "section label has no entries",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Rule {
    type Err = ReqlintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rule::ALL
            .into_iter()
            .find(|rule| rule.code() == s)
            .ok_or_else(|| ReqlintError::UnknownRule(s.to_string()))
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Rule severities and strictness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintConfig {
    /// Promote warnings to errors.
    #[serde(default)]
    pub strict: bool,
    /// Per-rule overrides keyed by rule code.
    #[serde(default)]
    pub severity: BTreeMap<String, Severity>,
}

impl LintConfig {
    /// Reject overrides for rules that do not exist.
    pub fn validate(&self) -> Result<(), ReqlintError> {
        for code in self.severity.keys() {
            code.parse::<Rule>()?;
        }
        Ok(())
    }

    /// Override one rule.
    pub fn set(&mut self, rule: Rule, severity: Severity) {
        self.severity.insert(rule.code().to_string(), severity);
    }

    /// Effective severity of a rule.
    #[must_use]
    pub fn severity_of(&self, rule: Rule) -> Severity {
        let severity = self
            .severity
            .get(rule.code())
            .copied()
            .unwrap_or_else(|| rule.default_severity());
        if self.strict && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        }
    }
}

// =============================================================================
// DIAGNOSTICS & REPORT
// =============================================================================

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub rule: Rule,
    pub severity: Severity,
    /// 1-based line number.
    pub line: usize,
    /// File the finding belongs to, when linting several files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "{}:", origin)?;
        }
        write!(
            f,
            "{}: {} [{}] {}",
            self.line, self.severity, self.rule, self.message
        )
    }
}

/// All findings for one lint run, sorted by origin, line and rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Findings for one rule.
    pub fn by_rule(&self, rule: Rule) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.rule == rule)
    }

    fn sort(&mut self) {
        self.diagnostics
            .sort_by(|a, b| (&a.origin, a.line, a.rule).cmp(&(&b.origin, b.line, b.rule)));
    }
}

// =============================================================================
// LINTER
// =============================================================================

/// Applies the rules of a `LintConfig` to manifests.
#[derive(Debug, Clone, Default)]
pub struct Linter {
    config: LintConfig,
}

impl Linter {
    #[must_use]
    pub fn new(config: LintConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &LintConfig {
        &self.config
    }

    /// Lint a single manifest.
    #[must_use]
    pub fn lint(&self, manifest: &Manifest) -> Report {
        let mut report = Report::default();
        self.collect(manifest, None, &mut report);
        report.sort();
        report
    }

    /// Lint several manifests that install together (a file and its `-r`
    /// includes), adding duplicates that span files.
    #[must_use]
    pub fn lint_set(&self, manifests: &[(&str, &Manifest)]) -> Report {
        let mut report = Report::default();
        let mut first_seen: BTreeMap<String, (&str, usize)> = BTreeMap::new();

        for (origin, manifest) in manifests {
            self.collect(manifest, Some(origin), &mut report);

            let mut seen_here: BTreeMap<String, usize> = BTreeMap::new();
            for entry in manifest.entries() {
                let name = entry.requirement.name.normalized().to_string();
                if seen_here.contains_key(&name) {
                    continue;
                }
                seen_here.insert(name.clone(), entry.line);
                match first_seen.get(&name) {
                    Some((first_origin, first_line)) => self.push(
                        &mut report,
                        Rule::Duplicate,
                        entry.line,
                        Some(origin),
                        format!(
                            "'{}' is already declared in {}:{}",
                            entry.requirement.name, first_origin, first_line
                        ),
                    ),
                    None => {
                        first_seen.insert(name, (origin, entry.line));
                    }
                }
            }
        }

        report.sort();
        report
    }

    fn collect(&self, manifest: &Manifest, origin: Option<&str>, report: &mut Report) {
        for (line, reason) in manifest.errors() {
            self.push(report, Rule::Syntax, line, origin, reason.to_string());
        }

        for dup in manifest.duplicates() {
            self.push(
                report,
                Rule::Duplicate,
                dup.line,
                origin,
                format!(
                    "'{}' is already declared on line {}",
                    dup.name, dup.first_line
                ),
            );
        }

        for entry in manifest.entries() {
            let req = entry.requirement;
            let specs = &req.specifiers;

            if !specs.is_satisfiable() {
                self.push(
                    report,
                    Rule::Unsatisfiable,
                    entry.line,
                    origin,
                    format!("no version of '{}' satisfies '{}'", req.name, specs),
                );
            }
            if specs.lower_bound().is_none() {
                self.push(
                    report,
                    Rule::Unbounded,
                    entry.line,
                    origin,
                    format!("'{}' has no minimum version", req.name),
                );
            }
            if specs.has_upper_bound() {
                self.push(
                    report,
                    Rule::UpperBound,
                    entry.line,
                    origin,
                    format!("'{}' caps its version with '{}'", req.name, specs),
                );
            }
            if let Some(pin) = specs.pinned() {
                self.push(
                    report,
                    Rule::Pinned,
                    entry.line,
                    origin,
                    format!("'{}' is pinned to {}", req.name, pin),
                );
            }
            if !req.name.is_normalized() {
                self.push(
                    report,
                    Rule::NonNormalizedName,
                    entry.line,
                    origin,
                    format!(
                        "'{}' is normally spelled '{}'",
                        req.name,
                        req.name.normalized()
                    ),
                );
            }
        }

        for (line, directive) in manifest.directives() {
            self.push(
                report,
                Rule::Directive,
                line,
                origin,
                format!("option line '{}' is not a dependency entry", directive),
            );
        }

        self.empty_sections(manifest, origin, report);
    }

    fn empty_sections(&self, manifest: &Manifest, origin: Option<&str>, report: &mut Report) {
        let mut open: Option<(usize, &str)> = None;
        let mut entries_since = 0usize;

        for line in manifest.lines() {
            match &line.kind {
                LineKind::Comment(label) if !label.is_empty() => {
                    if let Some((at, name)) = open
                        && entries_since == 0
                    {
                        self.push_empty(report, at, origin, name);
                    }
                    open = Some((line.number, label.label()));
                    entries_since = 0;
                }
                LineKind::Requirement(_) | LineKind::Directive(_) | LineKind::Invalid(_) => {
                    entries_since += 1;
                }
                _ => {}
            }
        }

        if let Some((at, name)) = open
            && entries_since == 0
        {
            self.push_empty(report, at, origin, name);
        }
    }

    fn push_empty(&self, report: &mut Report, line: usize, origin: Option<&str>, label: &str) {
        self.push(
            report,
            Rule::EmptySection,
            line,
            origin,
            format!("section '{}' has no entries", label),
        );
    }

    fn push(
        &self,
        report: &mut Report,
        rule: Rule,
        line: usize,
        origin: Option<&str>,
        message: String,
    ) {
        let severity = self.config.severity_of(rule);
        if severity == Severity::Off {
            return;
        }
        report.diagnostics.push(Diagnostic {
            rule,
            severity,
            line,
            origin: origin.map(str::to_string),
            message,
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
