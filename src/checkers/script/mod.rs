//! JavaScript semantic checker
//!
//! A tree-sitter parse feeds the scope resolver. Text heuristics run
//! alongside and still report when the tree has syntax errors.

mod heuristics;
mod resolver;
pub mod scope;

use super::{CheckContext, Checker};
use crate::diagnostic::{Category, CodeError};
use crate::language::Language;
use std::collections::HashSet;
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

/// Names the host environment provides without a declaration
const AMBIENT_NAMES: &[&str] = &[
    // Language
    "undefined", "NaN", "Infinity", "globalThis", "arguments", "eval", "isNaN", "isFinite",
    "parseInt", "parseFloat", "encodeURI", "encodeURIComponent", "decodeURI",
    "decodeURIComponent", "Object", "Array", "String", "Number", "Boolean", "Symbol", "BigInt",
    "Function", "Math", "JSON", "Date", "RegExp", "Error", "TypeError", "RangeError",
    "SyntaxError", "ReferenceError", "EvalError", "URIError", "AggregateError", "Promise", "Map",
    "Set", "WeakMap", "WeakSet", "WeakRef", "Proxy", "Reflect", "Intl", "ArrayBuffer",
    "SharedArrayBuffer", "DataView", "Atomics", "Int8Array", "Uint8Array", "Uint8ClampedArray",
    "Int16Array", "Uint16Array", "Int32Array", "Uint32Array", "Float32Array", "Float64Array",
    "BigInt64Array", "BigUint64Array", "structuredClone", "queueMicrotask",
    // Browser
    "window", "document", "navigator", "location", "history", "localStorage", "sessionStorage",
    "console", "alert", "confirm", "prompt", "fetch", "Request", "Response", "Headers",
    "FormData", "URL", "URLSearchParams", "Blob", "File", "FileReader", "Event", "CustomEvent",
    "EventTarget", "HTMLElement", "Element", "Node", "MutationObserver",
    "IntersectionObserver", "ResizeObserver", "WebSocket", "Worker", "XMLHttpRequest",
    "AbortController", "TextEncoder", "TextDecoder", "crypto", "performance", "self",
    "setTimeout", "clearTimeout", "setInterval", "clearInterval", "requestAnimationFrame",
    "cancelAnimationFrame", "atob", "btoa", "Image", "Audio",
    // Node
    "require", "module", "exports", "process", "global", "Buffer", "__dirname", "__filename",
    "setImmediate", "clearImmediate",
];

/// Whether `name` is provided by the host environment
pub(crate) fn is_ambient(name: &str) -> bool {
    AMBIENT_NAMES.contains(&name)
}

/// Errors setting up or running the parser
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to load JavaScript grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    #[error("Parser produced no tree")]
    NoTree,
}

/// Parse `source` with a parser owned by this call
pub fn parse(source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_javascript::LANGUAGE.into())?;
    parser.parse(source, None).ok_or(ParseError::NoTree)
}

/// Scope-aware checker for JavaScript
#[derive(Debug, Default)]
pub struct ScriptChecker;

impl ScriptChecker {
    pub fn new() -> Self {
        Self
    }

    /// Tree passes. Returns the diagnostics and whether they were cut short.
    fn tree_passes(&self, source: &str, ctx: &CheckContext<'_>) -> (Vec<CodeError>, bool) {
        let tree = match parse(source) {
            Ok(tree) => tree,
            Err(e) => {
                log::warn!("{}; running text checks only", e);
                return (Vec::new(), false);
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            let error = find_syntax_error(root).map(|node| syntax_error(node, source));
            return (error.into_iter().collect(), false);
        }

        let resolution = resolver::resolve(root, source, &ctx.deadline);
        log::debug!("Script resolver produced {} diagnostics", resolution.errors.len());
        (resolution.errors, resolution.interrupted)
    }
}

impl Checker for ScriptChecker {
    fn id(&self) -> &str {
        "script"
    }

    fn description(&self) -> &str {
        "Syntax, scope and usage checks for JavaScript"
    }

    fn language(&self) -> Language {
        Language::Script
    }

    fn check(&self, source: &str, ctx: &CheckContext<'_>) -> Vec<CodeError> {
        if ctx.deadline.is_expired() {
            log::warn!("Script check skipped: timeout already reached");
            return Vec::new();
        }

        let (mut errors, interrupted) = self.tree_passes(source, ctx);
        if interrupted {
            log::warn!("Script resolution interrupted by timeout");
            return errors;
        }

        if ctx.options.script.heuristics && !ctx.deadline.is_expired() {
            let mut seen: HashSet<(Option<String>, usize, usize)> = errors
                .iter()
                .map(|e| (e.rule_id.clone(), e.from, e.to))
                .collect();
            let extra = heuristics::run(source, &ctx.deadline);
            log::debug!("Script text checks produced {} diagnostics", extra.len());

            for error in extra {
                if seen.insert((error.rule_id.clone(), error.from, error.to)) {
                    errors.push(error);
                }
            }
        }

        errors
    }
}

/// First ERROR or MISSING node in document order
fn find_syntax_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(find_syntax_error)
}

fn syntax_error(node: Node<'_>, source: &str) -> CodeError {
    let range = node.byte_range();

    let message = if node.is_missing() {
        format!("Syntax error: missing '{}'", node.kind())
    } else {
        // Point at the first token inside the error node
        let mut cursor = node.walk();
        while cursor.goto_first_child() {}
        let text = source.get(cursor.node().byte_range()).unwrap_or_default();
        if text.trim().is_empty() {
            "Syntax error: unexpected end of input".to_string()
        } else {
            let snippet: String = text.lines().next().unwrap_or_default().chars().take(20).collect();
            format!("Syntax error: unexpected '{}'", snippet)
        }
    };

    CodeError::error(message, range.start, range.end)
        .with_category(Category::Syntax)
        .with_rule("syntax-error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckOptions;
    use crate::diagnostic::{Severity, TextEdit};
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Vec<CodeError> {
        let options = CheckOptions::default();
        let ctx = CheckContext::new(&options);
        ScriptChecker::new().check(source, &ctx)
    }

    fn messages(source: &str) -> Vec<String> {
        check(source).into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_parser_loads() {
        let tree = parse("let a = 1;").unwrap();
        assert!(!tree.root_node().has_error());
    }

    #[test]
    fn test_unused_variable() {
        let errors = check("let x = 1;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unused variable: x");
        assert_eq!(errors[0].severity, Severity::Suggestion);
        assert_eq!(errors[0].fixes[0].edit, TextEdit::delete(0, 10));
    }

    #[test]
    fn test_unused_without_safe_fix() {
        let errors = check("let x = compute();\nfunction compute() { return 1; }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unused variable: x");
        assert!(errors[0].fixes.is_empty());
    }

    #[test]
    fn test_undefined_variable() {
        let errors = check("console.log(y);");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Undefined variable: y");
        assert_eq!(errors[0].severity, Severity::Error);
        assert_eq!((errors[0].from, errors[0].to), (12, 13));
    }

    #[test]
    fn test_undefined_function() {
        assert_eq!(messages("doWork();"), vec!["Undefined function: doWork"]);
    }

    #[test]
    fn test_hoisting() {
        assert!(check("run();\nfunction run() { return helper; }\nvar helper = 2;").is_empty());
    }

    #[test]
    fn test_block_scope_is_not_visible_outside() {
        assert_eq!(
            messages("{ const inner = 1; console.log(inner); }\nconsole.log(inner);"),
            vec!["Undefined variable: inner"]
        );
    }

    #[test]
    fn test_var_escapes_block() {
        assert!(check("if (true) { var flag = 1; }\nconsole.log(flag);").is_empty());
    }

    #[test]
    fn test_redeclaration() {
        let errors = check("let a = 1;\nlet a = 2;\nconsole.log(a);");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Cannot redeclare block-scoped variable: a");
        assert_eq!(errors[0].severity, Severity::Error);

        let errors = check("var b = 1;\nvar b = 2;\nconsole.log(b);");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].severity, Severity::Warning);
    }

    #[test]
    fn test_destructuring_and_params() {
        let source = "function f({ a, b: [c, d = 2] }, ...rest) { return a + c + d + rest.length; }\nf({});";
        assert!(check(source).is_empty());
    }

    #[test]
    fn test_exports_and_underscore_are_not_unused() {
        assert!(check("export const api = 1;\nconst _ignored = 2;").is_empty());
    }

    #[test]
    fn test_unused_import() {
        assert_eq!(
            messages("import { a, b as c } from './m';\nconsole.log(a);"),
            vec!["Unused import: c"]
        );
    }

    #[test]
    fn test_write_is_not_a_read() {
        assert_eq!(messages("let n = 0;\nn = 5;"), vec!["Unused variable: n"]);
    }

    #[test]
    fn test_typeof_undeclared_is_allowed() {
        assert!(check("if (typeof jQuery === 'undefined') { console.log('none'); }").is_empty());
    }

    #[test]
    fn test_debugger() {
        let errors = check("debugger;");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule(), Some("no-debugger"));
        assert_eq!(errors[0].fixes[0].edit, TextEdit::delete(0, 9));
    }

    #[test]
    fn test_syntax_error_short_circuits() {
        let errors = check("let = ;\nconsole.log(undefinedThing);");
        let syntax: Vec<_> = errors
            .iter()
            .filter(|e| e.category == Some(Category::Syntax))
            .collect();
        assert_eq!(syntax.len(), 1);
        assert!(syntax[0].message.starts_with("Syntax error"));
        assert!(errors.iter().all(|e| e.rule() != Some("no-undef")));
    }

    #[test]
    fn test_heuristics_run_on_broken_tree() {
        let errors = check("if (a == b) {");
        assert!(errors.iter().any(|e| e.rule() == Some("syntax-error")));
        assert!(errors.iter().any(|e| e.rule() == Some("eqeqeq")));
    }

    #[test]
    fn test_heuristics_can_be_disabled() {
        let mut options = CheckOptions::default();
        options.script.heuristics = false;
        let ctx = CheckContext::new(&options);
        let errors = ScriptChecker::new().check("const a = 1, b = 2;\nconsole.log(a == b);", &ctx);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_tree_and_text_duplicates_reported_once() {
        let errors = check("const { x } = settings;\nconsole.log(x);");
        let undefined: Vec<_> = errors.iter().filter(|e| e.rule() == Some("no-undef")).collect();
        assert_eq!(undefined.len(), 1);
    }

    #[test]
    fn test_await_outside_async() {
        let errors = check("async function ok() { await ok(); }\nfunction bad() { return 1; }\nbad();");
        assert!(errors.is_empty());

        let errors = check("async function ok() {}\nawait ok();");
        assert!(errors.iter().any(|e| e.rule() == Some("await-outside-async")));
    }

    #[test]
    fn test_lowercase_jsx_tags_are_not_names() {
        let source = "const view = <div className=\"a\">{title}</div>;\nexport default view;";
        let tree = parse(source).expect("grammar loads");
        assert!(!tree.root_node().has_error());

        let errors = check(source);
        assert_eq!(
            errors.into_iter().map(|e| e.message).collect::<Vec<_>>(),
            vec!["Undefined variable: title"]
        );
    }

    #[test]
    fn test_zero_timeout_returns_nothing() {
        let options = CheckOptions::new().with_timeout(std::time::Duration::ZERO);
        let ctx = CheckContext::new(&options);
        assert!(ScriptChecker::new().check("debugger;", &ctx).is_empty());
        assert!(ctx.deadline.was_tripped());
    }
}
