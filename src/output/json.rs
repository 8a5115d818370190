//! JSON output formatter

use super::{OutputFormatter, Report};
use crate::diagnostic::{CodeError, Stats};
use crate::language::Language;
use serde::Serialize;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn render<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    files: Vec<JsonFile<'a>>,
    summary: JsonSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonFile<'a> {
    file: &'a str,
    language: Language,
    errors: &'a [CodeError],
    stats: Stats,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    partial: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonSummary {
    files_checked: usize,
    error_count: usize,
    warning_count: usize,
    suggestion_count: usize,
    duration_ms: u128,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    file: &'a str,
    #[serde(flatten)]
    error: &'a CodeError,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &Report) -> String {
        let files = report
            .files
            .iter()
            .map(|f| JsonFile {
                file: &f.file,
                language: f.language,
                errors: &f.result.errors,
                stats: f.result.stats,
                partial: f.result.partial,
            })
            .collect();

        let totals = report.totals();
        let output = JsonOutput {
            files,
            summary: JsonSummary {
                files_checked: report.files.len(),
                error_count: totals.error_count,
                warning_count: totals.warning_count,
                suggestion_count: totals.suggestion_count,
                duration_ms: report.duration.as_millis(),
            },
        };

        self.render(&output)
    }

    fn format_diagnostic(&self, file: &str, error: &CodeError) -> String {
        self.render(&JsonDiagnostic { file, error })
    }
}
