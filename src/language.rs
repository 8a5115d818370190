//! Content language tags

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Error resolving a language tag
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageError {
    #[error("Unknown language: {0}")]
    Unknown(String),
}

/// The content languages the engine can check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// HTML
    Markup,
    /// CSS, including Sass and Less syntax
    Style,
    /// JavaScript
    Script,
}

static STYLE_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[@.#:\w\[\]=*>+~, -]+\{[^{}]*[\w-]+\s*:[^{};]+;").expect("valid style pattern")
});

static SCRIPT_HINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(function|const|let|var|return|import|export)\b|=>|console\.")
        .expect("valid script pattern")
});

impl Language {
    pub const ALL: [Language; 3] = [Language::Markup, Language::Style, Language::Script];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Markup => "markup",
            Language::Style => "style",
            Language::Script => "script",
        }
    }

    /// File extensions handled for this language (without dot)
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Markup => &["html", "htm", "xhtml"],
            Language::Style => &["css", "scss", "sass", "less"],
            Language::Script => &["js", "mjs", "cjs", "jsx"],
        }
    }

    /// Pick the language from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().contains(&ext.as_str()))
    }

    /// Guess the language from content alone.
    ///
    /// Only meant as a last resort when no tag or extension is available.
    pub fn sniff(source: &str) -> Option<Self> {
        let trimmed = source.trim_start();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with('<') {
            return Some(Language::Markup);
        }
        if SCRIPT_HINT.is_match(source) {
            return Some(Language::Script);
        }
        if STYLE_RULE.is_match(source) {
            return Some(Language::Style);
        }
        None
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        match tag.as_str() {
            "markup" | "html" => Ok(Language::Markup),
            "style" | "css" => Ok(Language::Style),
            "script" | "js" | "javascript" => Ok(Language::Script),
            other => Self::ALL
                .into_iter()
                .find(|lang| lang.extensions().contains(&other))
                .ok_or_else(|| LanguageError::Unknown(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("html".parse(), Ok(Language::Markup));
        assert_eq!("SCSS".parse(), Ok(Language::Style));
        assert_eq!("javascript".parse(), Ok(Language::Script));
        assert_eq!("script".parse(), Ok(Language::Script));
        assert_eq!(
            "python".parse::<Language>(),
            Err(LanguageError::Unknown("python".to_string()))
        );
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Language::from_path(Path::new("a/b.less")), Some(Language::Style));
        assert_eq!(Language::from_path(Path::new("index.HTML")), Some(Language::Markup));
        assert_eq!(Language::from_path(Path::new("main.rs")), None);
        assert_eq!(Language::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_sniff() {
        assert_eq!(Language::sniff("  <!DOCTYPE html>"), Some(Language::Markup));
        assert_eq!(Language::sniff("const a = 1;"), Some(Language::Script));
        assert_eq!(Language::sniff("body {\n  color: red;\n}"), Some(Language::Style));
        assert_eq!(Language::sniff("plain words"), None);
        assert_eq!(Language::sniff(""), None);
    }
}
