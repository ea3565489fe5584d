//! # Configuration
//!
//! Optional `reqlint.toml`, read from `--config` or the working directory.
//!
//! ```toml
//! [lint]
//! strict = false
//!
//! [lint.severity]
//! pinned = "warning"
//! upper-bound = "off"
//!
//! [coverage]
//! stdlib = ["sitecustomize"]
//!
//! [coverage.aliases]
//! yaml = "PyYAML"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```
//!
//! Command-line flags override file values. Server security settings come
//! from environment variables (see `api`).

use reqlint_core::{ImportResolver, LintConfig, ReqlintError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "reqlint.toml";

/// Config files are small; anything bigger is a mistake.
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// `[coverage]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageConfig {
    /// Extra modules to treat as standard library.
    pub stdlib: Vec<String>,
    /// Import name to distribution name.
    pub aliases: BTreeMap<String, String>,
}

impl CoverageConfig {
    /// Built-in resolver extended with this section.
    #[must_use]
    pub fn resolver(&self) -> ImportResolver {
        let mut resolver = ImportResolver::new();
        for module in &self.stdlib {
            resolver.add_stdlib(module.clone());
        }
        for (module, distribution) in &self.aliases {
            resolver.add_alias(module.clone(), distribution);
        }
        resolver
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub lint: LintConfig,
    pub coverage: CoverageConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ReqlintError> {
        let config: Config =
            toml::from_str(text).map_err(|e| ReqlintError::Config(e.message().to_string()))?;
        config.lint.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given (it must exist), else `reqlint.toml` in the
    /// working directory if present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ReqlintError> {
        let path = match explicit {
            Some(path) => path,
            None => {
                let default = Path::new(CONFIG_FILE_NAME);
                if !default.is_file() {
                    tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            ReqlintError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ReqlintError::Config(format!(
                "'{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            ReqlintError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;

        let config = Self::from_toml(&text).map_err(|e| match e {
            ReqlintError::Config(msg) => {
                ReqlintError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqlint_core::{Rule, Severity};

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn full_file() {
        let config = Config::from_toml(
            r#"
            [lint]
            strict = true

            [lint.severity]
            pinned = "warning"
            upper-bound = "off"

            [coverage]
            stdlib = ["sitecustomize"]

            [coverage.aliases]
            yaml = "PyYAML"

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert!(config.lint.strict);
        // strict promotes the warning override to an error
        assert_eq!(config.lint.severity_of(Rule::Pinned), Severity::Error);
        assert_eq!(config.lint.severity_of(Rule::UpperBound), Severity::Off);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);

        let resolver = config.coverage.resolver();
        assert_eq!(resolver.resolve("sitecustomize"), None);
        assert_eq!(resolver.resolve("yaml").as_deref(), Some("pyyaml"));
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let result = Config::from_toml("[lint.severity]\nno-such-rule = \"error\"\n");
        assert!(matches!(result, Err(ReqlintError::UnknownRule(_))));
    }

    #[test]
    fn unknown_section_is_rejected() {
        let result = Config::from_toml("[surprise]\nx = 1\n");
        assert!(matches!(result, Err(ReqlintError::Config(_))));
    }

    #[test]
    fn explicit_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(Some(&missing)).is_err());

        let present = dir.path().join("reqlint.toml");
        std::fs::write(&present, "[server]\nport = 1234\n").unwrap();
        assert_eq!(Config::load(Some(&present)).unwrap().server.port, 1234);
    }
}
