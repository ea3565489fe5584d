//! # Version Identifiers
//!
//! Python-style version numbers: `[N!]N(.N)*[{a|b|rc}N][.postN][.devN][+local]`.
//!
//! Parsing is case-insensitive and accepts the usual alternate spellings
//! (`alpha`, `beta`, `c`, `pre`, `preview`, `rev`, `r`, `-N` as post release).
//! `Display` always renders the normalized form.
//!
//! ## Ordering
//!
//! Versions order by epoch, then release (trailing zeros ignored, so
//! `1.0 == 1.0.0`), then phase: dev-only < pre-release < final < post-release.
//! A `.devN` suffix sorts before the release it qualifies. The local segment
//! only breaks ties between otherwise equal public versions.

use crate::primitives::MAX_RELEASE_SEGMENTS;
use crate::ReqlintError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// =============================================================================
// PRE-RELEASE PHASE
// =============================================================================

/// Pre-release phase, ordered `a < b < rc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }
}

/// Spellings accepted for each phase, longest first so `alpha` wins over `a`.
const PRE_SPELLINGS: [(&str, PreRelease); 8] = [
    ("preview", PreRelease::Rc),
    ("alpha", PreRelease::Alpha),
    ("beta", PreRelease::Beta),
    ("pre", PreRelease::Rc),
    ("rc", PreRelease::Rc),
    ("a", PreRelease::Alpha),
    ("b", PreRelease::Beta),
    ("c", PreRelease::Rc),
];

const POST_SPELLINGS: [&str; 3] = ["post", "rev", "r"];

// =============================================================================
// VERSION
// =============================================================================

/// A parsed version identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreRelease, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

impl Version {
    /// Parse a version string.
    pub fn parse(input: &str) -> Result<Self, ReqlintError> {
        let lowered = input.trim().to_ascii_lowercase();
        let text = lowered.strip_prefix('v').unwrap_or(&lowered);
        if text.is_empty() {
            return Err(ReqlintError::InvalidVersion("empty version".to_string()));
        }

        let (public, local) = match text.split_once('+') {
            Some((public, local)) => (public, Some(parse_local(local, input)?)),
            None => (text, None),
        };

        let (epoch, rest) = match public.split_once('!') {
            Some((epoch, rest)) => (parse_number(epoch, input)?, rest),
            None => (0, public),
        };

        let mut cursor = Cursor::new(rest);

        let mut release = vec![cursor.number().ok_or_else(|| invalid(input))?];
        while cursor.peek() == Some(b'.') && cursor.peek_at(1).is_some_and(|b| b.is_ascii_digit())
        {
            cursor.bump();
            release.push(cursor.number().ok_or_else(|| invalid(input))?);
            if release.len() > MAX_RELEASE_SEGMENTS {
                return Err(ReqlintError::InvalidVersion(format!(
                    "'{}' has more than {} release segments",
                    input, MAX_RELEASE_SEGMENTS
                )));
            }
        }

        let pre = cursor.pre_release();
        let post = cursor.post_release();
        let dev = cursor.dev_release();

        if !cursor.at_end() {
            return Err(invalid(input));
        }
        if cursor.overflowed {
            return Err(ReqlintError::InvalidVersion(format!(
                "'{}' has a component that does not fit in 64 bits",
                input
            )));
        }

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Build a final release from epoch and release components.
    #[must_use]
    pub fn from_release(epoch: u64, release: Vec<u64>) -> Self {
        Self {
            epoch,
            release,
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    /// The epoch (`N!`), zero when absent.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Release components as written (`1.10.0` → `[1, 10, 0]`).
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Local version label, if any.
    #[must_use]
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// True for pre-releases and dev releases.
    #[must_use]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// True for post releases.
    #[must_use]
    pub fn is_postrelease(&self) -> bool {
        self.post.is_some()
    }

    /// This version without its local label.
    #[must_use]
    pub fn public(&self) -> Self {
        Self {
            local: None,
            ..self.clone()
        }
    }

    /// True when the release starts with `prefix`, padding with zeros.
    ///
    /// `1.2` matches prefix `[1, 2, 0]`; `1.20` does not match `[1, 2]`.
    #[must_use]
    pub fn release_starts_with(&self, epoch: u64, prefix: &[u64]) -> bool {
        self.epoch == epoch
            && prefix
                .iter()
                .enumerate()
                .all(|(i, p)| self.release.get(i).copied().unwrap_or(0) == *p)
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&c| c != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }

    fn phase(&self) -> Phase {
        match (self.pre, self.post, self.dev) {
            (Some((kind, n)), _, _) => Phase::Pre(kind, n),
            (None, None, Some(_)) => Phase::DevOnly,
            _ => Phase::Final,
        }
    }

    fn dev_key(&self) -> DevKey {
        self.dev.map_or(DevKey::Absent, DevKey::Dev)
    }

    fn local_key(&self) -> Option<Vec<LocalSegment>> {
        self.local.as_ref().map(|local| {
            local
                .split('.')
                .map(|seg| match seg.parse::<u64>() {
                    Ok(n) => LocalSegment::Number(n),
                    Err(_) => LocalSegment::Text(seg.to_string()),
                })
                .collect()
        })
    }
}

/// Phase component of the ordering key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    DevOnly,
    Pre(PreRelease, u64),
    Final,
}

/// Dev component of the ordering key: any dev release sorts before none.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
    Dev(u64),
    Absent,
}

/// Local segments: text sorts before numbers.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LocalSegment {
    Text(String),
    Number(u64),
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.phase().cmp(&other.phase()))
            .then_with(|| self.post.cmp(&other.post))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local_key().cmp(&other.local_key()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local_key().hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{}", kind.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{}", n)?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{}", n)?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ReqlintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = ReqlintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

// =============================================================================
// PARSING HELPERS
// =============================================================================

fn invalid(input: &str) -> ReqlintError {
    ReqlintError::InvalidVersion(format!("'{}' is not a valid version", input))
}

fn parse_number(s: &str, input: &str) -> Result<u64, ReqlintError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(input));
    }
    s.parse().map_err(|_| invalid(input))
}

/// Local labels are alphanumeric segments; `-` and `_` normalize to `.`.
fn parse_local(local: &str, input: &str) -> Result<String, ReqlintError> {
    let normalized: String = local
        .chars()
        .map(|c| if c == '-' || c == '_' { '.' } else { c })
        .collect();
    let valid = normalized
        .split('.')
        .all(|seg| !seg.is_empty() && seg.bytes().all(|b| b.is_ascii_alphanumeric()));
    if !valid {
        return Err(invalid(input));
    }
    Ok(normalized)
}

/// Byte cursor over the public part of a version string.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    overflowed: bool,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            pos: 0,
            overflowed: false,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Consume a run of digits.
    fn number(&mut self) -> Option<u64> {
        let start = self.pos;
        let mut value: u64 = 0;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            match value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(b - b'0')))
            {
                Some(v) => value = v,
                None => self.overflowed = true,
            }
            self.bump();
        }
        (self.pos > start).then_some(value)
    }

    fn separator(&mut self) {
        if matches!(self.peek(), Some(b'.' | b'_' | b'-')) {
            self.bump();
        }
    }

    fn keyword(&mut self, word: &str) -> bool {
        if self.bytes[self.pos..].starts_with(word.as_bytes()) {
            self.pos += word.len();
            true
        } else {
            false
        }
    }

    /// `[sep](a|b|rc|...)[sep][N]`, implicit number 0.
    fn pre_release(&mut self) -> Option<(PreRelease, u64)> {
        let saved = self.pos;
        self.separator();
        for (word, kind) in PRE_SPELLINGS {
            if self.keyword(word) {
                return Some((kind, self.optional_number()));
            }
        }
        self.pos = saved;
        None
    }

    /// `[sep](post|rev|r)[sep][N]` or `-N`.
    fn post_release(&mut self) -> Option<u64> {
        let saved = self.pos;
        self.separator();
        for word in POST_SPELLINGS {
            if self.keyword(word) {
                return Some(self.optional_number());
            }
        }
        self.pos = saved;
        if self.peek() == Some(b'-') && self.peek_at(1).is_some_and(|b| b.is_ascii_digit()) {
            self.bump();
            return self.number();
        }
        None
    }

    /// `[sep]dev[sep][N]`, implicit number 0.
    fn dev_release(&mut self) -> Option<u64> {
        let saved = self.pos;
        self.separator();
        if self.keyword("dev") {
            return Some(self.optional_number());
        }
        self.pos = saved;
        None
    }

    fn optional_number(&mut self) -> u64 {
        let saved = self.pos;
        self.separator();
        match self.number() {
            Some(n) => n,
            None => {
                self.pos = saved;
                0
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
