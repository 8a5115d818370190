//! Livecheck - in-editor diagnostics for HTML, CSS and JavaScript
//!
//! Turns one source snapshot into a list of diagnostics anchored to byte
//! ranges, fast enough to run while the user types.
//!
//! # Architecture
//!
//! ```text
//! host -> check() -> Engine -> Checker (markup | style | script) -> CheckResult
//! ```
//!
//! Every call builds its own scan state, so concurrent calls on different
//! snapshots never see each other.
//!
//! # Example
//!
//! ```no_run
//! use livecheck::{check, CheckOptions, Language};
//!
//! # async fn run() {
//! let result = check("<div><span></div>", Language::Markup, &CheckOptions::default()).await;
//! for error in &result.errors {
//!     println!("{}:{} {}", error.line, error.column.unwrap_or(1), error.message);
//! }
//! # }
//! ```

pub mod checkers;
pub mod config;
pub mod diagnostic;
pub mod engine;
pub mod fixer;
pub mod language;
pub mod lsp;
pub mod output;
pub mod position;

// Re-export main types
pub use checkers::{CheckContext, Checker, Deadline, MarkupChecker, ScriptChecker, StyleChecker};
pub use config::{CheckOptions, ConfigError, RulesConfig, ScriptConfig, SeverityLevel};
pub use diagnostic::{Category, CheckResult, CodeError, Fix, Severity, Stats, TextEdit};
pub use engine::{filter_ignored, Engine};
pub use fixer::{apply_fixes, FixOutcome};
pub use language::{Language, LanguageError};
pub use lsp::{
    to_code_actions, to_lsp_diagnostics, to_publish_diagnostics, CodeAction, LspDiagnostic,
    LspSeverity, PublishDiagnosticsParams,
};
pub use output::{JsonFormatter, OutputFormatter, Report, TextFormatter};
pub use position::LineIndex;

/// Check `source` as `language` with the default checkers.
///
/// Hosts checking many documents can keep an [`Engine`] around instead.
pub async fn check(source: &str, language: Language, options: &CheckOptions) -> CheckResult {
    Engine::default().check_async(source, language, options).await
}
