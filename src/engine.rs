//! Check dispatcher
//!
//! Picks the checker for a language tag, runs it, then shapes its output:
//! normalize positions, apply rule settings, filter, truncate, count.

use crate::checkers::{CheckContext, Checker, MarkupChecker, ScriptChecker, StyleChecker};
use crate::config::CheckOptions;
use crate::diagnostic::{CheckResult, CodeError};
use crate::language::Language;
use crate::position::LineIndex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// The check engine
pub struct Engine {
    /// Registered checkers (keyed by language)
    checkers: HashMap<Language, Arc<dyn Checker>>,
}

impl Engine {
    /// Create an engine with no checkers
    pub fn new() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Register a checker, replacing any previous one for its language
    pub fn register_checker(&mut self, checker: Arc<dyn Checker>) {
        log::debug!(
            "Registering checker '{}' for {}",
            checker.id(),
            checker.language()
        );
        self.checkers.insert(checker.language(), checker);
    }

    pub fn checker(&self, language: Language) -> Option<&Arc<dyn Checker>> {
        self.checkers.get(&language)
    }

    /// Languages with a registered checker
    pub fn languages(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|l| self.checkers.contains_key(l))
            .collect()
    }

    /// Check `source` as `language`
    pub fn check(&self, source: &str, language: Language, options: &CheckOptions) -> CheckResult {
        let Some(checker) = self.checkers.get(&language) else {
            log::debug!("No checker registered for {}", language);
            return CheckResult::empty();
        };

        let start = Instant::now();
        let ctx = CheckContext::new(options);
        let raw = checker.check(source, &ctx);
        let produced = raw.len();

        let errors = normalize(raw, source);
        let errors = apply_rule_settings(errors, options);
        let errors = filter_ignored(errors, &options.ignore_patterns);
        let mut errors: Vec<CodeError> = errors
            .into_iter()
            .filter(|e| options.severity_level.admits(e.severity))
            .collect();
        if let Some(max) = options.max_errors {
            errors.truncate(max);
        }

        let mut result = CheckResult::from_errors(errors);
        result.partial = ctx.deadline.was_tripped();

        log::debug!(
            "{} check: {} produced, {} kept in {:?}{}",
            language,
            produced,
            result.errors.len(),
            start.elapsed(),
            if result.partial { " (partial)" } else { "" }
        );
        result
    }

    /// Check with a language tag given as text. Unknown tags give an empty result.
    pub fn check_tag(&self, source: &str, tag: &str, options: &CheckOptions) -> CheckResult {
        match tag.parse::<Language>() {
            Ok(language) => self.check(source, language, options),
            Err(e) => {
                log::debug!("{}", e);
                CheckResult::empty()
            }
        }
    }

    /// Future form of [`Engine::check`]
    pub async fn check_async(
        &self,
        source: &str,
        language: Language,
        options: &CheckOptions,
    ) -> CheckResult {
        self.check(source, language, options)
    }
}

impl Default for Engine {
    /// An engine with the markup, style and script checkers registered
    fn default() -> Self {
        let mut engine = Self::new();
        engine.register_checker(Arc::new(MarkupChecker::new()));
        engine.register_checker(Arc::new(StyleChecker::new()));
        engine.register_checker(Arc::new(ScriptChecker::new()));
        engine
    }
}

/// Clamp ranges into the source and fill line, column and context
fn normalize(errors: Vec<CodeError>, source: &str) -> Vec<CodeError> {
    let index = LineIndex::new(source);

    errors
        .into_iter()
        .map(|mut error| {
            error.from = index.clamp(error.from);
            error.to = index.clamp(error.to).max(error.from);
            for fix in &mut error.fixes {
                fix.edit.from = index.clamp(fix.edit.from);
                fix.edit.to = index.clamp(fix.edit.to).max(fix.edit.from);
            }

            let (line, column) = index.line_col(error.from);
            error.line = line;
            error.column = Some(column);
            if let Some(text) = index.line_text(line) {
                error = error.with_context(text);
            }
            error
        })
        .collect()
}

/// Drop disabled rules and apply severity overrides
fn apply_rule_settings(errors: Vec<CodeError>, options: &CheckOptions) -> Vec<CodeError> {
    errors
        .into_iter()
        .filter(|e| e.rule().map_or(true, |rule| options.is_rule_enabled(rule)))
        .map(|mut e| {
            if let Some(severity) = e.rule().and_then(|rule| options.get_severity_override(rule)) {
                e.severity = severity;
            }
            e
        })
        .collect()
}

/// Drop diagnostics whose message contains any of `patterns`
pub fn filter_ignored(errors: Vec<CodeError>, patterns: &[String]) -> Vec<CodeError> {
    if patterns.is_empty() {
        return errors;
    }
    errors
        .into_iter()
        .filter(|e| !patterns.iter().any(|p| e.message.contains(p.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeverityLevel;
    use crate::diagnostic::{Severity, Stats};
    use pretty_assertions::assert_eq;

    /// Emits a fixed list of diagnostics
    struct FixedChecker(Vec<CodeError>);

    impl Checker for FixedChecker {
        fn id(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "Test checker"
        }

        fn language(&self) -> Language {
            Language::Style
        }

        fn check(&self, _source: &str, _ctx: &CheckContext<'_>) -> Vec<CodeError> {
            self.0.clone()
        }
    }

    fn fixed_engine() -> Engine {
        let mut engine = Engine::new();
        engine.register_checker(Arc::new(FixedChecker(vec![
            CodeError::error("Broken thing", 0, 1).with_rule("a"),
            CodeError::warning("Odd thing", 2, 3).with_rule("b"),
            CodeError::suggestion("Nice-to-have thing", 4, 5).with_rule("c"),
            CodeError::error("Another broken thing", 6, 7).with_rule("a"),
        ])));
        engine
    }

    const SOURCE: &str = "0123\n5678\n";

    #[test]
    fn test_unregistered_language_is_empty() {
        let engine = Engine::new();
        let result = engine.check("<p>", Language::Markup, &CheckOptions::default());
        assert_eq!(result, CheckResult::empty());
    }

    #[test]
    fn test_unknown_tag_is_empty() {
        let engine = Engine::default();
        let result = engine.check_tag("x", "cobol", &CheckOptions::default());
        assert!(result.errors.is_empty());
        assert_eq!(result.stats, Stats::default());
    }

    #[test]
    fn test_default_registers_all_languages() {
        assert_eq!(Engine::default().languages(), Language::ALL.to_vec());
    }

    #[test]
    fn test_normalize_fills_positions() {
        let result = fixed_engine().check(SOURCE, Language::Style, &CheckOptions::default());
        let last = &result.errors[3];
        assert_eq!((last.line, last.column), (2, Some(2)));
        assert_eq!(last.context.as_deref(), Some("5678"));
    }

    #[test]
    fn test_normalize_clamps_out_of_range() {
        let errors = normalize(vec![CodeError::error("x", 40, 90)], "héllo");
        assert_eq!((errors[0].from, errors[0].to), (6, 6));

        // Inside the two-byte 'é'
        let errors = normalize(vec![CodeError::error("x", 2, 2)], "héllo");
        assert_eq!(errors[0].from, 1);
        assert_eq!(errors[0].column, Some(2));
    }

    #[test]
    fn test_ignore_patterns() {
        let options = CheckOptions::new().with_ignore_patterns(["BROKEN"]);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        // Case-sensitive substring match
        assert_eq!(result.errors.len(), 4);

        let options = CheckOptions::new().with_ignore_patterns(["Broken", "thing"]);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert!(result.errors.is_empty());
        assert_eq!(result.stats.total(), 0);
    }

    #[test]
    fn test_ignore_is_idempotent() {
        let patterns = vec!["Odd".to_string()];
        let once = filter_ignored(
            fixed_engine().check(SOURCE, Language::Style, &CheckOptions::default()).errors,
            &patterns,
        );
        let twice = filter_ignored(once.clone(), &patterns);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_severity_level() {
        let options = CheckOptions::new().with_severity_level(SeverityLevel::Warning);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert_eq!(result.stats.suggestion_count, 0);
        assert_eq!(result.stats.total(), 3);

        let options = CheckOptions::new().with_severity_level(SeverityLevel::Error);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert!(result.errors.iter().all(|e| e.severity == Severity::Error));
    }

    #[test]
    fn test_max_errors_truncates_before_counting() {
        let options = CheckOptions::new().with_max_errors(2);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert_eq!(
            result.errors.iter().map(|e| e.message.as_str()).collect::<Vec<_>>(),
            vec!["Broken thing", "Odd thing"]
        );
        assert_eq!(result.stats, Stats::from_errors(&result.errors));
    }

    #[test]
    fn test_filter_then_truncate() {
        let options = CheckOptions::new()
            .with_severity_level(SeverityLevel::Error)
            .with_max_errors(2);
        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert_eq!(result.stats.error_count, 2);
    }

    #[test]
    fn test_rule_settings() {
        let mut options = CheckOptions::default();
        options.rules.disabled.push("a".to_string());
        options.rules.severity.insert("c".to_string(), Severity::Error);

        let result = fixed_engine().check(SOURCE, Language::Style, &options);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.stats.error_count, 1);
        assert_eq!(result.errors[1].rule(), Some("c"));
    }

    #[test]
    fn test_concurrent_calls_do_not_interfere() {
        let engine = Engine::default();
        let options = CheckOptions::default();
        let broken = "<div><span></div>";
        let clean = "a { color: red; }";

        let expected_broken = engine.check(broken, Language::Markup, &options);
        let expected_clean = engine.check(clean, Language::Style, &options);

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let engine = &engine;
                    let options = &options;
                    s.spawn(move || {
                        if i % 2 == 0 {
                            (0, engine.check(broken, Language::Markup, options))
                        } else {
                            (1, engine.check(clean, Language::Style, options))
                        }
                    })
                })
                .collect();

            for handle in handles {
                let (kind, result) = handle.join().unwrap();
                if kind == 0 {
                    assert_eq!(result, expected_broken);
                } else {
                    assert_eq!(result, expected_clean);
                }
            }
        });
    }

    #[tokio::test]
    async fn test_check_async_matches_sync() {
        let engine = Engine::default();
        let options = CheckOptions::default();
        let sync = engine.check("let x = 1;", Language::Script, &options);
        let future = engine.check_async("let x = 1;", Language::Script, &options).await;
        assert_eq!(sync, future);
    }
}
