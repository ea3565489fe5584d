//! # Version Specifiers
//!
//! Comparison clauses such as `>=1.10.0`, `~=2.2`, `==1.4.*` and sets of them
//! joined by commas (`>=1.0,<2,!=1.3.1`).
//!
//! A set matches a version when every clause does. Bound analysis folds a set
//! into its tightest lower and upper bound so contradictory sets
//! (`>=2,<1`) can be reported without knowing which versions exist.

use crate::primitives::MAX_SPECIFIERS;
use crate::version::Version;
use crate::ReqlintError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// OPERATOR
// =============================================================================

/// Comparison operator of a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `~=`
    Compatible,
    /// `===`
    Arbitrary,
}

/// Operator spellings, longest first so `===` wins over `==`.
const OPERATORS: [(&str, Operator); 8] = [
    ("===", Operator::Arbitrary),
    ("~=", Operator::Compatible),
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("<=", Operator::LessEqual),
    (">=", Operator::GreaterEqual),
    ("<", Operator::Less),
    (">", Operator::Greater),
];

impl Operator {
    /// The operator as written in a manifest.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GreaterEqual => ">=",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Compatible => "~=",
            Self::Arbitrary => "===",
        }
    }

    /// Human description, e.g. "greater than or equal to".
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::GreaterEqual => "greater than or equal to",
            Self::LessEqual => "less than or equal to",
            Self::Greater => "greater than",
            Self::Less => "less than",
            Self::Equal => "equal to",
            Self::NotEqual => "not equal to",
            Self::Compatible => "compatible with",
            Self::Arbitrary => "exactly",
        }
    }

    /// Split a leading operator off `s`.
    #[must_use]
    pub fn strip(s: &str) -> Option<(Self, &str)> {
        OPERATORS
            .iter()
            .find_map(|(text, op)| s.strip_prefix(text).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// BOUND
// =============================================================================

/// One end of the version range a specifier set admits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

impl Bound {
    fn new(version: Version, inclusive: bool) -> Self {
        Self { version, inclusive }
    }

    /// Pick the tighter of two lower bounds.
    fn tighter_lower(self, other: Self) -> Self {
        match self.version.cmp(&other.version) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal if !self.inclusive => self,
            Ordering::Equal => other,
        }
    }

    /// Pick the tighter of two upper bounds.
    fn tighter_upper(self, other: Self) -> Self {
        match self.version.cmp(&other.version) {
            Ordering::Less => self,
            Ordering::Greater => other,
            Ordering::Equal if !self.inclusive => self,
            Ordering::Equal => other,
        }
    }
}

/// `[1, 4, 2]` → `[1, 5]`: the first release past a prefix.
fn next_prefix(prefix: &[u64]) -> Vec<u64> {
    let mut bumped = prefix.to_vec();
    if let Some(last) = bumped.last_mut() {
        *last = last.saturating_add(1);
    }
    bumped
}

// =============================================================================
// SPECIFIER
// =============================================================================

/// A single version clause, e.g. `>=1.10.0`.
///
/// The version is kept parsed; `Display` writes its normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Specifier {
    op: Operator,
    version: Version,
    wildcard: bool,
}

impl Specifier {
    /// Parse one clause such as `>=1.0` or `== 1.2.*`.
    pub fn parse(input: &str) -> Result<Self, ReqlintError> {
        let text = input.trim();
        let (op, rest) = Operator::strip(text).ok_or_else(|| {
            ReqlintError::InvalidSpecifier(format!("'{}' does not start with an operator", text))
        })?;
        let raw = rest.trim();
        if raw.is_empty() {
            return Err(ReqlintError::InvalidSpecifier(format!(
                "'{}' has no version",
                text
            )));
        }

        let (version_text, wildcard) = match raw.strip_suffix(".*") {
            Some(prefix) => (prefix, true),
            None => (raw, false),
        };

        if wildcard && !matches!(op, Operator::Equal | Operator::NotEqual) {
            return Err(ReqlintError::InvalidSpecifier(format!(
                "'{}': wildcards are only allowed with == and !=",
                text
            )));
        }

        let version = Version::parse(version_text)?;

        if version.local().is_some()
            && (wildcard
                || !matches!(
                    op,
                    Operator::Equal | Operator::NotEqual | Operator::Arbitrary
                ))
        {
            return Err(ReqlintError::InvalidSpecifier(format!(
                "'{}': local versions are only allowed with ==, != and ===",
                text
            )));
        }

        if op == Operator::Compatible && version.release().len() < 2 {
            return Err(ReqlintError::InvalidSpecifier(format!(
                "'{}': ~= needs at least two release components",
                text
            )));
        }

        Ok(Self {
            op,
            version,
            wildcard,
        })
    }

    /// Build a `>=` clause.
    #[must_use]
    pub fn at_least(version: Version) -> Self {
        Self {
            op: Operator::GreaterEqual,
            version,
            wildcard: false,
        }
    }

    #[must_use]
    pub fn operator(&self) -> Operator {
        self.op
    }

    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// True for `==X.*` / `!=X.*`.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Does `candidate` satisfy this clause?
    #[must_use]
    pub fn contains(&self, candidate: &Version) -> bool {
        let public = candidate.public();
        match self.op {
            Operator::GreaterEqual => public >= self.version,
            Operator::LessEqual => public <= self.version,
            Operator::Greater => public > self.version,
            Operator::Less => public < self.version,
            Operator::Equal => self.matches_equal(candidate),
            Operator::NotEqual => !self.matches_equal(candidate),
            Operator::Compatible => {
                let release = self.version.release();
                let prefix = &release[..release.len().saturating_sub(1)];
                public >= self.version
                    && public.release_starts_with(self.version.epoch(), prefix)
            }
            Operator::Arbitrary => candidate.to_string() == self.version.to_string(),
        }
    }

    fn matches_equal(&self, candidate: &Version) -> bool {
        if self.wildcard {
            candidate.release_starts_with(self.version.epoch(), self.version.release())
        } else if self.version.local().is_some() {
            *candidate == self.version
        } else {
            candidate.public() == self.version
        }
    }

    /// Lower bound this clause imposes, if any.
    #[must_use]
    pub fn lower_bound(&self) -> Option<Bound> {
        match self.op {
            Operator::GreaterEqual | Operator::Compatible => {
                Some(Bound::new(self.version.clone(), true))
            }
            Operator::Greater => Some(Bound::new(self.version.clone(), false)),
            Operator::Equal if self.wildcard => Some(Bound::new(
                Version::from_release(self.version.epoch(), self.version.release().to_vec()),
                true,
            )),
            Operator::Equal | Operator::Arbitrary => Some(Bound::new(self.version.public(), true)),
            Operator::LessEqual | Operator::Less | Operator::NotEqual => None,
        }
    }

    /// Upper bound this clause imposes, if any.
    #[must_use]
    pub fn upper_bound(&self) -> Option<Bound> {
        match self.op {
            Operator::LessEqual => Some(Bound::new(self.version.clone(), true)),
            Operator::Less => Some(Bound::new(self.version.clone(), false)),
            Operator::Compatible => {
                let release = self.version.release();
                let prefix = &release[..release.len().saturating_sub(1)];
                Some(Bound::new(
                    Version::from_release(self.version.epoch(), next_prefix(prefix)),
                    false,
                ))
            }
            Operator::Equal if self.wildcard => Some(Bound::new(
                Version::from_release(self.version.epoch(), next_prefix(self.version.release())),
                false,
            )),
            Operator::Equal | Operator::Arbitrary => Some(Bound::new(self.version.public(), true)),
            Operator::GreaterEqual | Operator::Greater | Operator::NotEqual => None,
        }
    }

    /// "greater than or equal to 1.10.0"
    #[must_use]
    pub fn describe(&self) -> String {
        if self.wildcard {
            format!("{} {}.*", self.op.describe(), self.version)
        } else {
            format!("{} {}", self.op.describe(), self.version)
        }
    }
}

/// Same operator and same version; `===` also needs the same normalized text,
/// so `===1.0` and `===1.0.0` differ while `>=1.0` and `>=1.0.0` do not.
impl PartialEq for Specifier {
    fn eq(&self, other: &Self) -> bool {
        self.op == other.op
            && self.wildcard == other.wildcard
            && match self.op {
                Operator::Arbitrary => self.version.to_string() == other.version.to_string(),
                _ => self.version == other.version,
            }
    }
}

impl Eq for Specifier {}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.op, self.wildcard) {
            (op, true) => write!(f, "{}{}.*", op, self.version),
            (op, false) => write!(f, "{}{}", op, self.version),
        }
    }
}

impl FromStr for Specifier {
    type Err = ReqlintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Specifier {
    type Error = ReqlintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Specifier> for String {
    fn from(spec: Specifier) -> Self {
        spec.to_string()
    }
}

// =============================================================================
// SPECIFIER SET
// =============================================================================

/// Comma-separated clauses; a version must satisfy all of them.
///
/// The empty set admits every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SpecifierSet {
    specs: Vec<Specifier>,
}

impl SpecifierSet {
    /// Parse `>=1.0, <2` (whitespace tolerated, empty input is the empty set).
    pub fn parse(input: &str) -> Result<Self, ReqlintError> {
        let text = input.trim();
        if text.is_empty() {
            return Ok(Self::default());
        }
        let specs = text
            .split(',')
            .map(|piece| {
                if piece.trim().is_empty() {
                    Err(ReqlintError::InvalidSpecifier(format!(
                        "empty clause in '{}'",
                        text
                    )))
                } else {
                    Specifier::parse(piece)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if specs.len() > MAX_SPECIFIERS {
            return Err(ReqlintError::InvalidSpecifier(format!(
                "more than {} clauses",
                MAX_SPECIFIERS
            )));
        }
        Ok(Self { specs })
    }

    /// Build a set from already parsed clauses.
    #[must_use]
    pub fn from_specs(specs: Vec<Specifier>) -> Self {
        Self { specs }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.specs.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Does `candidate` satisfy every clause?
    #[must_use]
    pub fn contains(&self, candidate: &Version) -> bool {
        self.specs.iter().all(|spec| spec.contains(candidate))
    }

    /// Tightest lower bound across all clauses.
    #[must_use]
    pub fn lower_bound(&self) -> Option<Bound> {
        self.specs
            .iter()
            .filter_map(Specifier::lower_bound)
            .reduce(Bound::tighter_lower)
    }

    /// Tightest upper bound across all clauses.
    #[must_use]
    pub fn upper_bound(&self) -> Option<Bound> {
        self.specs
            .iter()
            .filter_map(Specifier::upper_bound)
            .reduce(Bound::tighter_upper)
    }

    /// The declared minimum version, if the set has a lower bound.
    #[must_use]
    pub fn minimum(&self) -> Option<Version> {
        self.lower_bound().map(|b| b.version)
    }

    /// True when some clause caps the version from above.
    #[must_use]
    pub fn has_upper_bound(&self) -> bool {
        self.specs.iter().any(|spec| {
            matches!(
                spec.operator(),
                Operator::Less | Operator::LessEqual | Operator::Compatible
            ) || (spec.operator() == Operator::Equal && spec.is_wildcard())
        })
    }

    /// The exact version pinned by `==X` or `===X`, if any.
    #[must_use]
    pub fn pinned(&self) -> Option<&Version> {
        self.specs
            .iter()
            .find(|spec| {
                matches!(spec.operator(), Operator::Equal | Operator::Arbitrary)
                    && !spec.is_wildcard()
            })
            .map(Specifier::version)
    }

    /// False when no version can satisfy the set.
    ///
    /// Detects crossed bounds (`>=2,<1`), empty half-open ranges (`>1,<=1`),
    /// and exact pins excluded by another clause (`==1.0,!=1.0`).
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        let (Some(lower), Some(upper)) = (self.lower_bound(), self.upper_bound()) else {
            return true;
        };
        match lower.version.cmp(&upper.version) {
            Ordering::Greater => false,
            Ordering::Equal if !(lower.inclusive && upper.inclusive) => false,
            Ordering::Equal => {
                let exact = self.pinned().cloned().unwrap_or(lower.version);
                self.contains(&exact)
            }
            Ordering::Less => true,
        }
    }
}

impl fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.specs.iter().map(Specifier::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for SpecifierSet {
    type Err = ReqlintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SpecifierSet {
    type Error = ReqlintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SpecifierSet> for String {
    fn from(set: SpecifierSet) -> Self {
        set.to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).expect("version")
    }

    fn set(s: &str) -> SpecifierSet {
        SpecifierSet::parse(s).expect("specifier set")
    }

    #[test]
    fn parses_minimum_constraint() {
        let spec = Specifier::parse(">=1.10.0").expect("parse");
        assert_eq!(spec.operator(), Operator::GreaterEqual);
        assert_eq!(spec.version(), &v("1.10.0"));
        assert_eq!(spec.describe(), "greater than or equal to 1.10.0");
    }

    #[test]
    fn operator_prefix_longest_match() {
        assert_eq!(Operator::strip("===1.0").map(|(op, _)| op), Some(Operator::Arbitrary));
        assert_eq!(Operator::strip("==1.0").map(|(op, _)| op), Some(Operator::Equal));
        assert_eq!(Operator::strip("<=1.0").map(|(op, _)| op), Some(Operator::LessEqual));
        assert!(Operator::strip("=1.0").is_none());
    }

    #[test]
    fn comparison_operators() {
        assert!(set(">=1.10.0").contains(&v("1.10")));
        assert!(!set(">=1.10.0").contains(&v("1.9.9")));
        assert!(set(">1.0").contains(&v("1.0.1")));
        assert!(!set("<1.0").contains(&v("1.0")));
        assert!(set("<=1.0").contains(&v("1.0.0")));
    }

    #[test]
    fn equality_and_wildcards() {
        assert!(set("==1.2").contains(&v("1.2.0")));
        assert!(set("==1.2").contains(&v("1.2+local")));
        assert!(!set("==1.2+cpu").contains(&v("1.2+cuda")));
        assert!(set("==1.2.*").contains(&v("1.2.9")));
        assert!(!set("==1.2.*").contains(&v("1.3")));
        assert!(set("!=1.2.*").contains(&v("1.3")));
    }

    #[test]
    fn compatible_release() {
        let compat = set("~=1.4.2");
        assert!(compat.contains(&v("1.4.2")));
        assert!(compat.contains(&v("1.4.9")));
        assert!(!compat.contains(&v("1.5.0")));
        assert!(!compat.contains(&v("1.4.1")));
        assert!(set("~=2.2").contains(&v("2.9")));
        assert!(!set("~=2.2").contains(&v("3.0")));
    }

    #[test]
    fn arbitrary_equality_is_textual() {
        assert!(set("===1.0").contains(&v("1.0")));
        assert!(!set("===1.0").contains(&v("1.0.0")));
    }

    #[test]
    fn arbitrary_equality_uses_normalized_spelling() {
        let spelled = set("===1.0ALPHA1");
        assert!(spelled.contains(&v("1.0a1")));
        assert!(spelled.is_satisfiable());
        assert!(set("===V1.0").is_satisfiable());
        assert!(set("===1.0+cpu").is_satisfiable());
        assert_eq!(spelled.to_string(), "===1.0a1");
    }

    #[test]
    fn clauses_compare_by_meaning() {
        assert_eq!(set(">=1.10.0-rc1"), set(">=1.10.0rc1"));
        assert_eq!(set(">=V1.0"), set(">=1.0"));
        assert_eq!(set(">=1.0"), set(">=1.0.0"));
        assert_ne!(set("===1.0"), set("===1.0.0"));
        assert_ne!(set(">=1.0"), set(">1.0"));
        assert_ne!(set("==1.2.*"), set("==1.2"));
    }

    #[test]
    fn rejects_invalid_clauses() {
        assert!(Specifier::parse("1.0").is_err());
        assert!(Specifier::parse(">=").is_err());
        assert!(Specifier::parse(">=1.*").is_err());
        assert!(Specifier::parse("~=1").is_err());
        assert!(Specifier::parse(">=1.0+local").is_err());
        assert!(SpecifierSet::parse(">=1.0,").is_err());
    }

    #[test]
    fn empty_set_contains_everything() {
        let empty = set("");
        assert!(empty.is_empty());
        assert!(empty.contains(&v("0.0.1")));
        assert!(empty.is_satisfiable());
    }

    #[test]
    fn bounds_fold_to_tightest() {
        let s = set(">=1.0, >1.5, <3, <=2.5");
        let lower = s.lower_bound().expect("lower");
        let upper = s.upper_bound().expect("upper");
        assert_eq!(lower.version, v("1.5"));
        assert!(!lower.inclusive);
        assert_eq!(upper.version, v("2.5"));
        assert!(upper.inclusive);
    }

    #[test]
    fn compatible_upper_bound() {
        let upper = set("~=1.4.2").upper_bound().expect("upper");
        assert_eq!(upper.version, v("1.5"));
        assert!(!upper.inclusive);
    }

    #[test]
    fn detects_unsatisfiable_sets() {
        assert!(!set(">=2,<1").is_satisfiable());
        assert!(!set(">1,<=1").is_satisfiable());
        assert!(!set("==1.0,!=1.0").is_satisfiable());
        assert!(!set("~=1.4,>=2").is_satisfiable());
        assert!(set(">=1,<=1").is_satisfiable());
        assert!(set(">=1.0,<2,!=1.5").is_satisfiable());
    }

    #[test]
    fn classification_helpers() {
        assert!(set(">=1,<2").has_upper_bound());
        assert!(!set(">=1,!=1.5").has_upper_bound());
        assert_eq!(set("==2.0").pinned(), Some(&v("2.0")));
        assert!(set("==2.*").pinned().is_none());
        assert_eq!(set("<2").minimum(), None);
        assert_eq!(set(">=1.21.0").minimum(), Some(v("1.21.0")));
    }

    #[test]
    fn display_is_normalized() {
        assert_eq!(set(" >= 1.0ALPHA1 ,< 2 ").to_string(), ">=1.0a1,<2");
        assert_eq!(set("==1.2.*").to_string(), "==1.2.*");
    }
}
