//! # Line Parser
//!
//! Classifies a single manifest line and parses requirement entries.
//!
//! Line grammar:
//!
//! ```text
//! blank       := whitespace*
//! comment     := whitespace* "#" text            ; section label
//! directive   := whitespace* "-" flag [value]    ; pip option (-r, --index-url, ...)
//! requirement := name [ "[" extras "]" ] [ specifiers ] [ ";" marker ] [ ws "#" comment ]
//! ```
//!
//! - Whitespace is allowed between tokens
//! - No semantic checks here: duplicates and contradictions are lint concerns

use crate::primitives::MAX_LINE_LENGTH;
use crate::specifier::SpecifierSet;
use crate::{PackageName, Requirement, ReqlintError, Section};
use serde::{Deserialize, Serialize};

// =============================================================================
// LINE KINDS
// =============================================================================

/// What a manifest line holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LineKind {
    /// Empty or whitespace-only.
    Blank,
    /// `# label`; never a dependency entry.
    Comment(Section),
    /// A pip option line such as `-r base.txt`.
    Directive(Directive),
    /// A dependency entry.
    Requirement(Requirement),
    /// A line that failed to parse, with the reason.
    Invalid(String),
}

/// A pip option line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// The flag as written, e.g. `-r` or `--index-url`.
    pub flag: String,
    /// The argument, if any.
    pub value: Option<String>,
}

impl Directive {
    /// Path of an included requirements file (`-r` / `--requirement`).
    #[must_use]
    pub fn include_path(&self) -> Option<&str> {
        match self.flag.as_str() {
            "-r" | "--requirement" => self.value.as_deref(),
            _ => None,
        }
    }

    /// Path of a constraints file (`-c` / `--constraint`).
    #[must_use]
    pub fn constraint_path(&self) -> Option<&str> {
        match self.flag.as_str() {
            "-c" | "--constraint" => self.value.as_deref(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Directive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}", self.flag, value),
            None => f.write_str(&self.flag),
        }
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one line. `line_no` is 1-based and only used for error messages.
pub fn parse_line(raw: &str, line_no: usize) -> Result<LineKind, ReqlintError> {
    let fail = |reason: String| ReqlintError::InvalidLine {
        line: line_no,
        reason,
    };

    if raw.len() > MAX_LINE_LENGTH {
        return Err(fail(format!("line exceeds {} bytes", MAX_LINE_LENGTH)));
    }

    let line = raw.trim();
    if line.is_empty() {
        return Ok(LineKind::Blank);
    }
    if line.starts_with('#') {
        return Ok(LineKind::Comment(Section::from_comment(line)));
    }
    if line.starts_with('-') {
        return parse_directive(line).map(LineKind::Directive).map_err(fail);
    }

    parse_requirement(line)
        .map(LineKind::Requirement)
        .map_err(|e| match e {
            ReqlintError::InvalidLine { reason, .. } => fail(reason),
            other => fail(other.to_string()),
        })
}

/// Parse a requirement entry such as `torch>=1.10.0`.
pub fn parse_requirement(line: &str) -> Result<Requirement, ReqlintError> {
    let (body, comment) = split_inline_comment(line);

    let (body, marker) = match body.split_once(';') {
        Some((head, marker)) => {
            let marker = marker.trim();
            if marker.is_empty() {
                return Err(line_error("empty environment marker after ';'"));
            }
            (head, Some(marker.to_string()))
        }
        None => (body, None),
    };

    let body = body.trim();
    let name_end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
        .unwrap_or(body.len());
    let (name_text, rest) = body.split_at(name_end);
    if name_text.is_empty() {
        return Err(line_error(format!("expected a package name in '{}'", body)));
    }
    let name = PackageName::parse(name_text)?;

    let mut rest = rest.trim_start();
    if rest.starts_with('@') {
        return Err(line_error(format!(
            "direct URL reference for '{}' is not a version constraint",
            name
        )));
    }

    let mut extras = Vec::new();
    if let Some(after) = rest.strip_prefix('[') {
        let (inside, tail) = after
            .split_once(']')
            .ok_or_else(|| line_error("unterminated extras list"))?;
        for extra in inside.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            PackageName::parse(extra)
                .map_err(|_| line_error(format!("invalid extra name '{}'", extra)))?;
            extras.push(extra.to_string());
        }
        rest = tail.trim_start();
    }

    let spec_text = rest.trim();
    let spec_text = spec_text
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(spec_text);
    let specifiers = SpecifierSet::parse(spec_text)?;

    Ok(Requirement {
        name,
        extras,
        specifiers,
        marker,
        comment,
    })
}

fn line_error(reason: impl Into<String>) -> ReqlintError {
    ReqlintError::InvalidLine {
        line: 0,
        reason: reason.into(),
    }
}

/// Split `-r base.txt`, `-rbase.txt`, `--index-url=URL` into flag and value.
fn parse_directive(line: &str) -> Result<Directive, String> {
    let (body, _) = split_inline_comment(line);
    let body = body.trim();

    let (flag, value) = if body.starts_with("--") {
        body.split_once(|c: char| c.is_whitespace() || c == '=')
            .map_or((body, ""), |(flag, value)| (flag, value.trim()))
    } else {
        let split = body
            .char_indices()
            .nth(2)
            .map_or(body.len(), |(i, _)| i);
        (&body[..split], body[split..].trim())
    };

    if flag.len() < 2 || flag == "--" {
        return Err(format!("incomplete option '{}'", body));
    }

    Ok(Directive {
        flag: flag.to_string(),
        value: (!value.is_empty()).then(|| value.to_string()),
    })
}

/// Inline comments start at a `#` preceded by whitespace.
fn split_inline_comment(line: &str) -> (&str, Option<String>) {
    let mut prev_ws = false;
    for (i, c) in line.char_indices() {
        if c == '#' && prev_ws {
            let comment = line[i + 1..].trim();
            return (&line[..i], Some(comment.to_string()));
        }
        prev_ws = c.is_whitespace();
    }
    (line, None)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::specifier::Operator;
    use crate::version::Version;

    fn requirement(line: &str) -> Requirement {
        match parse_line(line, 1).expect("parse") {
            LineKind::Requirement(req) => req,
            other => panic!("expected requirement, got {:?}", other),
        }
    }

    #[test]
    fn minimum_version_entry() {
        let req = requirement("torch>=1.10.0");
        assert_eq!(req.name.as_str(), "torch");
        assert_eq!(req.specifiers.len(), 1);
        let spec = req.specifiers.iter().next().expect("one clause");
        assert_eq!(spec.operator(), Operator::GreaterEqual);
        assert_eq!(spec.version(), &Version::parse("1.10.0").expect("version"));
        assert_eq!(spec.describe(), "greater than or equal to 1.10.0");
    }

    #[test]
    fn comment_is_not_a_dependency() {
        let kind = parse_line("# Core dependencies", 1).expect("parse");
        assert_eq!(
            kind,
            LineKind::Comment(Section("Core dependencies".to_string()))
        );
    }

    #[test]
    fn blank_and_whitespace_lines() {
        assert_eq!(parse_line("", 1).expect("parse"), LineKind::Blank);
        assert_eq!(parse_line("   \t", 1).expect("parse"), LineKind::Blank);
    }

    #[test]
    fn whitespace_between_tokens() {
        let req = requirement("  numpy  >= 1.21.0 ,  < 2  ");
        assert_eq!(req.name.as_str(), "numpy");
        assert_eq!(req.specifiers.to_string(), ">=1.21.0,<2");
    }

    #[test]
    fn extras_marker_and_comment() {
        let req = requirement(
            "torch-geometric[full, dev]>=2.0.0; python_version >= \"3.8\"  # GNN layers",
        );
        assert_eq!(req.name.as_str(), "torch-geometric");
        assert_eq!(req.extras, vec!["full".to_string(), "dev".to_string()]);
        assert_eq!(req.marker.as_deref(), Some("python_version >= \"3.8\""));
        assert_eq!(req.comment.as_deref(), Some("GNN layers"));
    }

    #[test]
    fn hash_without_whitespace_is_not_a_comment() {
        let result = parse_line("pkg>=1.0#frag", 3);
        assert!(matches!(result, Err(ReqlintError::InvalidLine { line: 3, .. })));
    }

    #[test]
    fn bare_name_has_empty_specifiers() {
        let req = requirement("pygame");
        assert!(req.specifiers.is_empty());
    }

    #[test]
    fn parenthesized_specifiers() {
        let req = requirement("networkx (>=2.6)");
        assert_eq!(req.specifiers.to_string(), ">=2.6");
    }

    #[test]
    fn directives() {
        let kind = parse_line("-r base.txt", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.include_path(), Some("base.txt"));

        let kind = parse_line("-rdev.txt", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.include_path(), Some("dev.txt"));

        let kind = parse_line("--index-url=https://pypi.org/simple", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.flag, "--index-url");
        assert_eq!(directive.value.as_deref(), Some("https://pypi.org/simple"));
        assert!(directive.include_path().is_none());

        let kind = parse_line("-c constraints.txt", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.constraint_path(), Some("constraints.txt"));
    }

    #[test]
    fn non_ascii_whitespace_separators() {
        let kind = parse_line("--index-url\u{a0}https://pypi.org/simple", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.flag, "--index-url");
        assert_eq!(directive.value.as_deref(), Some("https://pypi.org/simple"));

        let kind = parse_line("--pre\u{3000}", 1).expect("parse");
        let LineKind::Directive(directive) = kind else {
            panic!("expected directive");
        };
        assert_eq!(directive.flag, "--pre");
        assert!(directive.value.is_none());

        let req = requirement("torch\u{a0}>=1.10.0");
        assert_eq!(req.name.as_str(), "torch");
        assert_eq!(req.specifiers.minimum(), Some(Version::parse("1.10.0").expect("version")));

        assert!(matches!(
            parse_line("tôrch>=1.0", 1),
            Err(ReqlintError::InvalidLine { line: 1, .. })
        ));
    }

    #[test]
    fn invalid_lines_carry_line_number() {
        for bad in [
            "torch 1.10.0",
            "torch>=",
            "torch>=1.10.0.",
            ">=1.0",
            "pkg[extra>=1.0",
            "pkg>=1.0;",
            "pkg @ https://example.com/pkg.whl",
            "-",
        ] {
            match parse_line(bad, 7) {
                Err(ReqlintError::InvalidLine { line, .. }) => assert_eq!(line, 7, "{}", bad),
                other => panic!("{:?} should fail, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn overlong_line_rejected() {
        let line = format!("pkg>=1.0  # {}", "x".repeat(MAX_LINE_LENGTH));
        assert!(parse_line(&line, 1).is_err());
    }
}
