//! Language checkers
//!
//! Each checker turns one source string into diagnostics for one language.
//! Checkers hold only immutable tables; everything a scan needs is created
//! inside [`Checker::check`] and dropped when it returns.

pub mod markup;
pub mod script;
pub mod style;

pub use markup::MarkupChecker;
pub use script::ScriptChecker;
pub use style::StyleChecker;

use crate::config::CheckOptions;
use crate::diagnostic::CodeError;
use crate::language::Language;
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Checker trait for language-specific analysis
pub trait Checker: Send + Sync {
    /// Checker identifier (e.g., "markup")
    fn id(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Language this checker handles
    fn language(&self) -> Language;

    /// Analyze `source`. Never fails: problems with the input are diagnostics.
    fn check(&self, source: &str, ctx: &CheckContext<'_>) -> Vec<CodeError>;
}

/// Time budget for one call
#[derive(Debug)]
pub struct Deadline {
    expires_at: Option<Instant>,
    tripped: Cell<bool>,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            expires_at: budget.map(|b| Instant::now() + b),
            tripped: Cell::new(false),
        }
    }

    /// A deadline that never expires
    pub fn none() -> Self {
        Self::new(None)
    }

    /// Whether the budget is used up. Remembers the first expiry.
    pub fn is_expired(&self) -> bool {
        if self.tripped.get() {
            return true;
        }
        let expired = self.expires_at.is_some_and(|at| Instant::now() >= at);
        if expired {
            self.tripped.set(true);
        }
        expired
    }

    /// Whether any check against this deadline found it expired
    pub fn was_tripped(&self) -> bool {
        self.tripped.get()
    }
}

/// Per-call state handed to a checker
#[derive(Debug)]
pub struct CheckContext<'a> {
    pub options: &'a CheckOptions,
    pub deadline: Deadline,
}

impl<'a> CheckContext<'a> {
    pub fn new(options: &'a CheckOptions) -> Self {
        Self {
            options,
            deadline: Deadline::new(options.timeout()),
        }
    }
}
