//! # Manifest Diff
//!
//! Compares two dependency sets by normalized package name.

use crate::manifest::DependencySet;
use crate::Requirement;
use serde::{Deserialize, Serialize};

/// A requirement present on both sides with different constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub name: String,
    pub old: Requirement,
    pub new: Requirement,
}

/// Difference between two dependency sets. Lists are ordered by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestDiff {
    pub added: Vec<Requirement>,
    pub removed: Vec<Requirement>,
    pub changed: Vec<Change>,
    pub unchanged: usize,
}

impl ManifestDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff `old` against `new`.
///
/// Two requirements are the same when their specifiers, extras and marker
/// agree. Spelling of the name and trailing comments are ignored.
#[must_use]
pub fn diff(old: &DependencySet, new: &DependencySet) -> ManifestDiff {
    let mut result = ManifestDiff::default();

    for (name, before) in old {
        match new.get(name) {
            None => result.removed.push(before.clone()),
            Some(after) if same_constraints(before, after) => result.unchanged += 1,
            Some(after) => result.changed.push(Change {
                name: name.normalized().to_string(),
                old: before.clone(),
                new: after.clone(),
            }),
        }
    }

    result.added = new
        .iter()
        .filter(|(name, _)| !old.contains_key(*name))
        .map(|(_, req)| req.clone())
        .collect();

    result
}

fn same_constraints(a: &Requirement, b: &Requirement) -> bool {
    let mut extras_a: Vec<String> = a.extras.iter().map(|e| crate::normalize_name(e)).collect();
    let mut extras_b: Vec<String> = b.extras.iter().map(|e| crate::normalize_name(e)).collect();
    extras_a.sort();
    extras_a.dedup();
    extras_b.sort();
    extras_b.dedup();

    a.specifiers == b.specifiers && extras_a == extras_b && a.marker == b.marker
}
