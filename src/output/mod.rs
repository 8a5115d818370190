//! Output formatters for check reports

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::diagnostic::{CheckResult, CodeError, Stats};
use crate::language::Language;
use std::time::Duration;

/// One checked document
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Display name (path, or `<stdin>`)
    pub file: String,
    pub language: Language,
    pub result: CheckResult,
}

/// Results of a CLI run over one or more documents
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub files: Vec<FileReport>,
    /// Processing duration
    pub duration: Duration,
}

impl Report {
    pub fn push(&mut self, file: impl Into<String>, language: Language, result: CheckResult) {
        self.files.push(FileReport {
            file: file.into(),
            language,
            result,
        });
    }

    /// Counts summed over all documents
    pub fn totals(&self) -> Stats {
        self.files.iter().fold(Stats::default(), |mut acc, f| {
            acc.error_count += f.result.stats.error_count;
            acc.warning_count += f.result.stats.warning_count;
            acc.suggestion_count += f.result.stats.suggestion_count;
            acc
        })
    }

    /// Get exit code (0 = success, 1 = warnings, 2 = errors)
    pub fn exit_code(&self) -> i32 {
        self.files
            .iter()
            .map(|f| f.result.exit_code())
            .max()
            .unwrap_or(0)
    }
}

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire report
    fn format(&self, report: &Report) -> String;

    /// Format a single diagnostic from `file`
    fn format_diagnostic(&self, file: &str, error: &CodeError) -> String;
}
