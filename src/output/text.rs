//! Human-readable text output formatter

use super::{OutputFormatter, Report};
use crate::diagnostic::{CodeError, Severity};
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show the source line under each diagnostic
    pub show_source: bool,

    /// Show fix suggestions
    pub show_fixes: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_source: true,
            show_fixes: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Error => s.red().bold(),
            Severity::Warning => s.yellow().bold(),
            Severity::Suggestion => s.blue(),
        }
    }

    fn paint(&self, text: &str, f: fn(&str) -> ColoredString) -> String {
        if self.colored {
            f(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn count(&self, n: usize, word: &str, f: fn(&str) -> ColoredString) -> Option<String> {
        (n > 0).then(|| {
            let s = format!("{} {}{}", n, word, if n == 1 { "" } else { "s" });
            self.paint(&s, f)
        })
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, report: &Report) -> String {
        let mut output = String::new();

        for file in &report.files {
            if file.result.errors.is_empty() && !file.result.partial {
                continue;
            }
            output.push_str(&format!("{}\n", self.paint(&file.file, |s| s.underline())));

            for error in &file.result.errors {
                output.push_str(&self.format_diagnostic(&file.file, error));
            }
            if file.result.partial {
                output.push_str(&format!(
                    "   {} analysis stopped at the timeout; results are partial\n",
                    self.paint("note:", |s| s.yellow())
                ));
            }
            output.push('\n');
        }

        if self.show_stats {
            let totals = report.totals();
            let checked = report.files.len();
            output.push_str(&format!(
                "{} {} checked",
                checked,
                if checked == 1 { "file" } else { "files" }
            ));

            let counts: Vec<String> = [
                self.count(totals.error_count, "error", |s| s.red()),
                self.count(totals.warning_count, "warning", |s| s.yellow()),
                self.count(totals.suggestion_count, "suggestion", |s| s.blue()),
            ]
            .into_iter()
            .flatten()
            .collect();

            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                report.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_diagnostic(&self, file: &str, error: &CodeError) -> String {
        let mut output = String::new();
        let column = error.column.unwrap_or(1);

        let rule = error
            .rule()
            .map(|r| format!("[{}]", self.paint(r, |s| s.cyan())))
            .unwrap_or_default();
        output.push_str(&format!(
            "{}:{}:{}: {}{}: {}\n",
            file,
            error.line,
            column,
            self.severity_str(error.severity),
            rule,
            error.message
        ));

        if self.show_source {
            if let Some(context) = &error.context {
                let bar = self.paint("|", |s| s.blue());
                let line_num = self.paint(&format!("{:>4}", error.line), |s| s.blue());
                output.push_str(&format!("{} {} {}\n", line_num, bar, context));

                let remaining = context.chars().count().saturating_sub(column - 1);
                let width = (error.to - error.from).clamp(1, remaining.max(1));
                let underline = "^".repeat(width);
                output.push_str(&format!(
                    "     {} {}{}\n",
                    bar,
                    " ".repeat(column - 1),
                    self.paint(&underline, |s| s.red())
                ));
            }
        }

        if self.show_fixes {
            if let Some(fix) = error.fixes.first() {
                output.push_str(&format!(
                    "   {} fix: {}\n",
                    self.paint("=", |s| s.green()),
                    fix.description
                ));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{CheckResult, TextEdit};
    use crate::language::Language;

    fn sample() -> CodeError {
        let mut error = CodeError::error("Mismatched closing tag: expected </span> but found </div>", 11, 17)
            .with_rule("mismatched-closing-tag")
            .with_fix("Rename to </span>", TextEdit::replace(13, 16, "span"))
            .with_context("<div><span></div>");
        error.column = Some(12);
        error
    }

    #[test]
    fn test_format_diagnostic() {
        let formatter = TextFormatter::new().without_color();
        let output = formatter.format_diagnostic("page.html", &sample());

        assert!(output.contains("page.html:1:12: error[mismatched-closing-tag]"));
        assert!(output.contains("<div><span></div>"));
        assert!(output.contains("           ^^^^^^"));
        assert!(output.contains("fix: Rename to </span>"));
    }

    #[test]
    fn test_format_report() {
        let formatter = TextFormatter::new().without_color();
        let mut report = Report::default();
        report.push("page.html", Language::Markup, CheckResult::from_errors(vec![sample()]));
        report.push("clean.css", Language::Style, CheckResult::empty());

        let output = formatter.format(&report);
        assert!(output.contains("2 files checked: 1 error"));
        assert!(!output.contains("clean.css"));
    }

    #[test]
    fn test_partial_note() {
        let formatter = TextFormatter::new().without_color();
        let mut result = CheckResult::empty();
        result.partial = true;
        let mut report = Report::default();
        report.push("big.js", Language::Script, result);

        assert!(formatter.format(&report).contains("results are partial"));
    }
}
