//! # Manifest Module
//!
//! A whole requirements file, line by line.
//!
//! - Every line is kept with its raw text, so `render()` reproduces the input
//!   byte-for-byte (comments included)
//! - Lines that fail to parse are kept as `LineKind::Invalid` instead of
//!   aborting, so one bad line does not hide the rest of the file
//! - Each requirement remembers the section label above it

use crate::parser::{parse_line, Directive, LineKind};
use crate::primitives::{MAX_MANIFEST_BYTES, MAX_MANIFEST_LINES};
use crate::types::normalize_name;
use crate::{PackageName, Requirement, ReqlintError, Section};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared dependencies keyed by normalized name.
pub type DependencySet = BTreeMap<PackageName, Requirement>;

// =============================================================================
// MANIFEST LINE
// =============================================================================

/// One line of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestLine {
    /// 1-based line number.
    pub number: usize,
    /// The line exactly as read, without its `\n`.
    pub raw: String,
    /// What the line holds.
    pub kind: LineKind,
    /// Section label in effect at this line.
    pub section: Option<Section>,
}

/// A requirement together with where it was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry<'a> {
    pub line: usize,
    pub requirement: &'a Requirement,
    pub section: Option<&'a Section>,
}

/// A package declared more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duplicate {
    pub name: PackageName,
    pub first_line: usize,
    pub line: usize,
}

// =============================================================================
// MANIFEST
// =============================================================================

/// A parsed requirements file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    lines: Vec<ManifestLine>,
    trailing_newline: bool,
}

impl Manifest {
    /// Parse manifest text, keeping invalid lines in place.
    ///
    /// Fails only when the text exceeds `MAX_MANIFEST_BYTES` or
    /// `MAX_MANIFEST_LINES`.
    pub fn parse(text: &str) -> Result<Self, ReqlintError> {
        if text.len() > MAX_MANIFEST_BYTES {
            return Err(ReqlintError::ManifestTooLarge(format!(
                "{} bytes exceeds maximum {}",
                text.len(),
                MAX_MANIFEST_BYTES
            )));
        }
        if text.is_empty() {
            return Ok(Self::default());
        }

        let trailing_newline = text.ends_with('\n');
        let body = text.strip_suffix('\n').unwrap_or(text);

        let line_count = body.split('\n').count();
        if line_count > MAX_MANIFEST_LINES {
            return Err(ReqlintError::ManifestTooLarge(format!(
                "{} lines exceeds maximum {}",
                line_count, MAX_MANIFEST_LINES
            )));
        }

        let mut lines = Vec::with_capacity(line_count);
        let mut section: Option<Section> = None;

        for (index, raw) in body.split('\n').enumerate() {
            let number = index + 1;
            let kind = match parse_line(raw, number) {
                Ok(kind) => kind,
                Err(ReqlintError::InvalidLine { reason, .. }) => LineKind::Invalid(reason),
                Err(other) => LineKind::Invalid(other.to_string()),
            };

            if let LineKind::Comment(label) = &kind
                && !label.is_empty()
            {
                section = Some(label.clone());
            }

            lines.push(ManifestLine {
                number,
                raw: raw.to_string(),
                kind,
                section: section.clone(),
            });
        }

        Ok(Self {
            lines,
            trailing_newline,
        })
    }

    /// Parse manifest text, failing on the first invalid line.
    pub fn parse_strict(text: &str) -> Result<Self, ReqlintError> {
        let manifest = Self::parse(text)?;
        if let Some((line, reason)) = manifest.errors().next() {
            return Err(ReqlintError::InvalidLine {
                line,
                reason: reason.to_string(),
            });
        }
        Ok(manifest)
    }

    /// All lines in file order.
    #[must_use]
    pub fn lines(&self) -> &[ManifestLine] {
        &self.lines
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Requirement entries in file order.
    pub fn entries(&self) -> impl Iterator<Item = Entry<'_>> {
        self.lines.iter().filter_map(|line| match &line.kind {
            LineKind::Requirement(requirement) => Some(Entry {
                line: line.number,
                requirement,
                section: line.section.as_ref(),
            }),
            _ => None,
        })
    }

    /// Requirements in file order.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.entries().map(|entry| entry.requirement)
    }

    #[must_use]
    pub fn requirement_count(&self) -> usize {
        self.entries().count()
    }

    /// First requirement for `name`, compared normalized.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Requirement> {
        let wanted = normalize_name(name);
        self.requirements()
            .find(|req| req.name.normalized() == wanted)
    }

    /// Distinct section labels in order of first appearance.
    #[must_use]
    pub fn sections(&self) -> Vec<&Section> {
        let mut seen: Vec<&Section> = Vec::new();
        for line in &self.lines {
            if let LineKind::Comment(label) = &line.kind
                && !label.is_empty()
                && !seen.contains(&label)
            {
                seen.push(label);
            }
        }
        seen
    }

    /// Invalid lines as `(line, reason)`.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines.iter().filter_map(|line| match &line.kind {
            LineKind::Invalid(reason) => Some((line.number, reason.as_str())),
            _ => None,
        })
    }

    /// Option lines as `(line, directive)`.
    pub fn directives(&self) -> impl Iterator<Item = (usize, &Directive)> {
        self.lines.iter().filter_map(|line| match &line.kind {
            LineKind::Directive(directive) => Some((line.number, directive)),
            _ => None,
        })
    }

    /// Files pulled in with `-r`, in order.
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.directives()
            .filter_map(|(_, directive)| directive.include_path())
    }

    /// Declared dependencies keyed by name; the first declaration wins.
    #[must_use]
    pub fn dependency_set(&self) -> DependencySet {
        let mut set = DependencySet::new();
        for req in self.requirements() {
            set.entry(req.name.clone()).or_insert_with(|| req.clone());
        }
        set
    }

    /// Every repeated declaration, pointing back at the first one.
    #[must_use]
    pub fn duplicates(&self) -> Vec<Duplicate> {
        let mut first_seen: BTreeMap<&PackageName, usize> = BTreeMap::new();
        let mut duplicates = Vec::new();
        for entry in self.entries() {
            match first_seen.get(&entry.requirement.name) {
                Some(&first_line) => duplicates.push(Duplicate {
                    name: entry.requirement.name.clone(),
                    first_line,
                    line: entry.line,
                }),
                None => {
                    first_seen.insert(&entry.requirement.name, entry.line);
                }
            }
        }
        duplicates
    }

    /// The original text, byte-for-byte.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|line| line.raw.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// Canonical spelling of every entry; comments, invalid lines and blank
    /// lines are kept byte for byte. Rewritten lines keep a CRLF ending.
    #[must_use]
    pub fn render_normalized(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match &line.kind {
                LineKind::Blank | LineKind::Comment(_) | LineKind::Invalid(_) => {
                    out.push_str(&line.raw);
                }
                LineKind::Directive(directive) => {
                    out.push_str(&directive.to_string());
                    push_cr(&mut out, &line.raw);
                }
                LineKind::Requirement(req) => {
                    out.push_str(&req.to_normalized_string());
                    if let Some(comment) = &req.comment {
                        out.push_str("  # ");
                        out.push_str(comment);
                    }
                    push_cr(&mut out, &line.raw);
                }
            }
            out.push('\n');
        }
        out
    }
}

fn push_cr(out: &mut String, raw: &str) {
    if raw.ends_with('\r') {
        out.push('\r');
    }
}

// =============================================================================
// TESTS
// =============================================================================
