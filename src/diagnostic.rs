//! Diagnostic types for check results

use serde::{Deserialize, Serialize};

/// Severity level for diagnostics
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Style or best-practice hint
    Suggestion,
    /// Warning - potential issue
    #[default]
    Warning,
    /// Error - definite problem
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Suggestion => write!(f, "suggestion"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "suggestion" | "hint" | "info" => Ok(Severity::Suggestion),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" | "err" => Ok(Severity::Error),
            _ => Err(()),
        }
    }
}

/// Broad class of a diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Malformed structure (tags, braces, tokens)
    Syntax,
    /// Well-formed but meaningless or wrong (undefined names, bad nesting)
    Semantic,
    /// Questionable but valid code
    Style,
    /// Value does not fit the expected kind
    Type,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Syntax => "syntax",
            Category::Semantic => "semantic",
            Category::Style => "style",
            Category::Type => "type",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A replacement of the byte range `from..to` with `text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub from: usize,
    pub to: usize,
    pub text: String,
}

impl TextEdit {
    pub fn replace(from: usize, to: usize, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self::replace(at, at, text)
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self::replace(from, to, "")
    }
}

/// A suggested fix. Pure data: applying it is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fix {
    /// Description of the fix
    pub description: String,
    /// The edit that performs it
    pub edit: TextEdit,
}

impl Fix {
    pub fn new(description: impl Into<String>, edit: TextEdit) -> Self {
        Self {
            description: description.into(),
            edit,
        }
    }
}

/// One reported issue anchored to a byte range of the checked source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeError {
    /// Human-readable message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Start offset (inclusive)
    pub from: usize,
    /// End offset (exclusive)
    pub to: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    /// Rule that produced this diagnostic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Suggested fixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixes: Vec<Fix>,
    /// The source line containing `from`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl CodeError {
    /// Create a new diagnostic. Line and column are filled in by the engine.
    pub fn new(severity: Severity, message: impl Into<String>, from: usize, to: usize) -> Self {
        Self {
            message: message.into(),
            severity,
            category: None,
            from,
            to: to.max(from),
            line: 1,
            column: None,
            rule_id: None,
            fixes: Vec::new(),
            context: None,
        }
    }

    pub fn error(message: impl Into<String>, from: usize, to: usize) -> Self {
        Self::new(Severity::Error, message, from, to)
    }

    pub fn warning(message: impl Into<String>, from: usize, to: usize) -> Self {
        Self::new(Severity::Warning, message, from, to)
    }

    pub fn suggestion(message: impl Into<String>, from: usize, to: usize) -> Self {
        Self::new(Severity::Suggestion, message, from, to)
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_rule(mut self, rule_id: &str) -> Self {
        self.rule_id = Some(rule_id.to_string());
        self
    }

    /// Add a suggested fix
    pub fn with_fix(mut self, description: impl Into<String>, edit: TextEdit) -> Self {
        self.fixes.push(Fix::new(description, edit));
        self
    }

    pub fn with_context(mut self, line: &str) -> Self {
        self.context = Some(line.to_string());
        self
    }

    pub fn rule(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    pub fn has_fix(&self) -> bool {
        !self.fixes.is_empty()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    pub fn is_suggestion(&self) -> bool {
        self.severity == Severity::Suggestion
    }
}

/// Severity partition of a result's errors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub error_count: usize,
    pub warning_count: usize,
    pub suggestion_count: usize,
}

impl Stats {
    /// Count diagnostics by severity
    pub fn from_errors(errors: &[CodeError]) -> Self {
        let mut stats = Self::default();
        for error in errors {
            match error.severity {
                Severity::Error => stats.error_count += 1,
                Severity::Warning => stats.warning_count += 1,
                Severity::Suggestion => stats.suggestion_count += 1,
            }
        }
        stats
    }

    pub fn total(&self) -> usize {
        self.error_count + self.warning_count + self.suggestion_count
    }
}

/// Result of checking one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Diagnostics in generation order
    pub errors: Vec<CodeError>,
    /// Counts matching `errors`
    pub stats: Stats,
    /// Set when the timeout cut analysis short
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
}

impl CheckResult {
    /// An empty, clean result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a result whose stats are derived from `errors`
    pub fn from_errors(errors: Vec<CodeError>) -> Self {
        let stats = Stats::from_errors(&errors);
        Self {
            errors,
            stats,
            partial: false,
        }
    }

    /// Reshape every diagnostic with `f`, e.g. into an editor's own type
    pub fn map<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&CodeError) -> T,
    {
        self.errors.iter().map(f).collect()
    }

    pub fn has_errors(&self) -> bool {
        self.stats.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.stats.warning_count > 0
    }

    /// Check if result is clean (no errors or warnings)
    pub fn is_clean(&self) -> bool {
        self.stats.error_count == 0 && self.stats.warning_count == 0
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        if self.has_errors() {
            2
        } else if self.has_warnings() {
            1
        } else {
            0
        }
    }
}
