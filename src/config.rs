//! Check options
//!
//! Options arrive from the host with each call. The CLI additionally reads them from:
//! - `.livecheckrc.yaml` / `.livecheckrc.json` (project-level)
//! - `~/.livecheckrc.yaml` (user-level)

use crate::diagnostic::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

const CONFIG_NAMES: [&str; 6] = [
    ".livecheckrc.yaml",
    ".livecheckrc.yml",
    ".livecheckrc.json",
    "livecheck.yaml",
    "livecheck.yml",
    "livecheck.json",
];

/// Lowest severity kept in a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    /// Errors only
    Error,
    /// Errors and warnings
    Warning,
    /// Everything
    Suggestion,
    /// No filtering
    #[default]
    All,
}

impl SeverityLevel {
    /// Whether a diagnostic of `severity` passes this level
    pub fn admits(self, severity: Severity) -> bool {
        match self {
            SeverityLevel::Error => severity >= Severity::Error,
            SeverityLevel::Warning => severity >= Severity::Warning,
            SeverityLevel::Suggestion | SeverityLevel::All => true,
        }
    }
}

impl std::str::FromStr for SeverityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(SeverityLevel::Error),
            "warning" | "warn" => Ok(SeverityLevel::Warning),
            "suggestion" | "hint" => Ok(SeverityLevel::Suggestion),
            "all" => Ok(SeverityLevel::All),
            _ => Err(format!("Unknown severity level: {}", s)),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Severity overrides (rule_id -> severity)
    pub severity: HashMap<String, Severity>,
}

/// Script checker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Run the text-level passes next to the tree passes
    pub heuristics: bool,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self { heuristics: true }
    }
}

/// Options for one check call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CheckOptions {
    /// Drop diagnostics whose message contains any of these substrings
    pub ignore_patterns: Vec<String>,

    /// Lowest severity to keep
    pub severity_level: SeverityLevel,

    /// Keep at most this many diagnostics
    pub max_errors: Option<usize>,

    /// Analysis budget in milliseconds
    #[serde(rename = "timeout")]
    pub timeout_ms: Option<u64>,

    /// Input is a fragment: skip whole-document shape warnings
    pub allow_partial: bool,

    /// Rule configuration
    pub rules: RulesConfig,

    /// Script checker settings
    pub script: ScriptConfig,
}

impl CheckOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignore_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_severity_level(mut self, level: SeverityLevel) -> Self {
        self.severity_level = level;
        self
    }

    pub fn with_max_errors(mut self, max: usize) -> Self {
        self.max_errors = Some(max);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis().min(u64::MAX as u128) as u64);
        self
    }

    pub fn with_allow_partial(mut self, allow: bool) -> Self {
        self.allow_partial = allow;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load options from a YAML or JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let options: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };

        options.validate()?;
        Ok(options)
    }

    /// Find a config file in `dir`
    pub fn find_in(dir: &Path) -> Option<PathBuf> {
        CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load options from the working directory, then the home directory
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Some(path) = Self::find_in(Path::new(".")) {
            log::debug!("Using config {}", path.display());
            return Self::load(&path);
        }

        if let Some(path) = dirs::home_dir().and_then(|home| Self::find_in(&home)) {
            log::debug!("Using config {}", path.display());
            return Self::load(&path);
        }

        Ok(Self::default())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_errors == Some(0) {
            return Err(ConfigError::Invalid(
                "maxErrors must be at least 1".to_string(),
            ));
        }
        if let Some(pattern) = self.ignore_patterns.iter().find(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "Empty ignore pattern {:?} would hide every diagnostic",
                pattern
            )));
        }
        Ok(())
    }

    /// Merge another set of options into this one (other takes precedence)
    pub fn merge(&mut self, other: Self) {
        self.ignore_patterns.extend(other.ignore_patterns);
        if other.severity_level != SeverityLevel::All {
            self.severity_level = other.severity_level;
        }
        if other.max_errors.is_some() {
            self.max_errors = other.max_errors;
        }
        if other.timeout_ms.is_some() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.allow_partial {
            self.allow_partial = true;
        }
        self.rules.disabled.extend(other.rules.disabled);
        self.rules.severity.extend(other.rules.severity);
        if !other.script.heuristics {
            self.script.heuristics = false;
        }
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        !self.rules.disabled.iter().any(|r| r == rule_id)
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.rules.severity.get(rule_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_options() {
        let options = CheckOptions::new();
        assert!(options.ignore_patterns.is_empty());
        assert_eq!(options.severity_level, SeverityLevel::All);
        assert_eq!(options.max_errors, None);
        assert_eq!(options.timeout(), None);
        assert!(!options.allow_partial);
        assert!(options.script.heuristics);
    }

    #[test]
    fn test_severity_level_admits() {
        assert!(SeverityLevel::Error.admits(Severity::Error));
        assert!(!SeverityLevel::Error.admits(Severity::Warning));
        assert!(SeverityLevel::Warning.admits(Severity::Warning));
        assert!(!SeverityLevel::Warning.admits(Severity::Suggestion));
        assert!(SeverityLevel::Suggestion.admits(Severity::Suggestion));
        assert!(SeverityLevel::All.admits(Severity::Suggestion));
    }

    #[test]
    fn test_json_deserialize_camel_case() {
        let json = r#"{
            "ignorePatterns": ["Unused variable"],
            "severityLevel": "warning",
            "maxErrors": 10,
            "timeout": 250,
            "allowPartial": true
        }"#;

        let options: CheckOptions = serde_json::from_str(json).unwrap();
        assert_eq!(options.ignore_patterns, vec!["Unused variable".to_string()]);
        assert_eq!(options.severity_level, SeverityLevel::Warning);
        assert_eq!(options.max_errors, Some(10));
        assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
        assert!(options.allow_partial);
    }

    #[test]
    fn test_yaml_deserialize() {
        let yaml = r#"
severityLevel: error
rules:
  disabled:
    - no-debugger
  severity:
    eqeqeq: warning
script:
  heuristics: false
"#;

        let options: CheckOptions = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(options.severity_level, SeverityLevel::Error);
        assert!(!options.is_rule_enabled("no-debugger"));
        assert!(options.is_rule_enabled("no-undef"));
        assert_eq!(
            options.get_severity_override("eqeqeq"),
            Some(Severity::Warning)
        );
        assert!(!options.script.heuristics);
    }

    #[test]
    fn test_merge() {
        let mut base = CheckOptions::new().with_ignore_patterns(["a"]).with_max_errors(5);
        let other = CheckOptions {
            ignore_patterns: vec!["b".to_string()],
            severity_level: SeverityLevel::Warning,
            timeout_ms: Some(100),
            ..CheckOptions::default()
        };
        base.merge(other);

        assert_eq!(base.ignore_patterns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(base.severity_level, SeverityLevel::Warning);
        assert_eq!(base.max_errors, Some(5));
        assert_eq!(base.timeout_ms, Some(100));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".livecheckrc.yaml");
        std::fs::write(&path, "maxErrors: 3\nallowPartial: true\n").unwrap();

        assert_eq!(CheckOptions::find_in(dir.path()), Some(path.clone()));
        let options = CheckOptions::load(&path).unwrap();
        assert_eq!(options.max_errors, Some(3));
        assert!(options.allow_partial);
    }

    #[test]
    fn test_load_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livecheck.toml");
        std::fs::write(&path, "").unwrap();

        let err = CheckOptions::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_rejects_zero_max_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livecheck.json");
        std::fs::write(&path, r#"{"maxErrors": 0}"#).unwrap();

        assert!(matches!(
            CheckOptions::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_find_in_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CheckOptions::find_in(dir.path()), None);
    }
}
