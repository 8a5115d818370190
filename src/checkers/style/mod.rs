//! Style property checker
//!
//! Works on a masked copy of the source in which comment bodies and string
//! contents are blanked out, so byte offsets stay shared with the input.
//! Passes, in order: comments, braces, declarations, preprocessor symbols.

pub mod values;

pub use values::{ColorValidator, LengthValidator, ValueValidator};

use super::{CheckContext, Checker};
use crate::diagnostic::{Category, CodeError, TextEdit};
use crate::language::Language;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::{Arc, LazyLock};

static PROPERTY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{0,2}[A-Za-z][A-Za-z0-9-]*$").expect("valid property pattern"));

static IMPORTANT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)!\s*important").expect("valid important pattern"));

static SASS_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][\w-]*)").expect("valid sass variable pattern"));

static SASS_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][\w-]*)\s*:").expect("valid sass definition pattern")
});

static SASS_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:mixin|function)\s+[\w-]+\s*\(([^)]*)\)").expect("valid signature pattern")
});

static SASS_LOOP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@(?:each|for)\s+([^{]*?)\s+(?:in|from)\b").expect("valid loop pattern")
});

static LESS_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z_][\w-]*)").expect("valid less variable pattern"));

static LESS_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z_][\w-]*)\s*:").expect("valid less definition pattern")
});

static LESS_MIXIN_SIGNATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*[.#][\w-]+\s*\(([^)]*)\)[^{};]*\{").expect("valid less mixin pattern")
});

static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@include\s+([\w-]+)").expect("valid include pattern"));

static MIXIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@mixin\s+([\w-]+)").expect("valid mixin pattern"));

static EXTEND_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@extend\s+%([\w-]+)").expect("valid extend pattern"));

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([A-Za-z_][\w-]*)\s*[,{]").expect("valid placeholder pattern"));

/// Declarations to scan between deadline checks
const DEADLINE_STRIDE: usize = 64;

/// Characters a property value may contain besides letters, digits and whitespace
const VALUE_PUNCTUATION: &str = "#-.%(),!@/+*_\"'$:?=&\\~[]";

/// An unmatched opening bracket
#[derive(Debug, Clone, Copy)]
struct BracketFrame {
    ch: char,
    position: usize,
}

/// One `property: value` pair
#[derive(Debug, Clone)]
struct Declaration {
    property: String,
    property_span: Range<usize>,
    value: String,
    value_span: Range<usize>,
}

/// Property checker for CSS, Sass and Less
pub struct StyleChecker {
    validators: HashMap<String, Arc<dyn ValueValidator>>,
}

impl StyleChecker {
    pub fn new() -> Self {
        Self {
            validators: values::default_validators(),
        }
    }

    /// Register (or replace) the validator for a property
    pub fn with_validator(mut self, property: &str, validator: Arc<dyn ValueValidator>) -> Self {
        self.validators.insert(property.to_lowercase(), validator);
        self
    }
}

impl Default for StyleChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for StyleChecker {
    fn id(&self) -> &str {
        "style"
    }

    fn description(&self) -> &str {
        "Brace, comment, property value and preprocessor checks for CSS/Sass/Less"
    }

    fn language(&self) -> Language {
        Language::Style
    }

    fn check(&self, source: &str, ctx: &CheckContext<'_>) -> Vec<CodeError> {
        let mut errors = Vec::new();

        let masked = mask(source, &mut errors);
        check_braces(&masked, &mut errors);

        if ctx.deadline.is_expired() {
            log::warn!("Style check interrupted by timeout");
            return errors;
        }

        let declarations = collect_declarations(&masked);
        let mut seen_properties: HashSet<String> = HashSet::new();
        for (n, decl) in declarations.iter().enumerate() {
            if n % DEADLINE_STRIDE == 0 && ctx.deadline.is_expired() {
                log::warn!("Style check interrupted by timeout");
                return errors;
            }
            self.check_declaration(decl, &mut seen_properties, &mut errors);
        }

        check_sass_symbols(&masked, &mut errors);
        check_less_variables(&masked, &declarations, &mut errors);

        log::debug!(
            "Style check: {} declarations, {} diagnostics",
            declarations.len(),
            errors.len()
        );
        errors
    }
}

impl StyleChecker {
    fn check_declaration(
        &self,
        decl: &Declaration,
        seen_properties: &mut HashSet<String>,
        errors: &mut Vec<CodeError>,
    ) {
        let property = &decl.property;

        if !seen_properties.insert(property.clone()) {
            errors.push(
                CodeError::warning(
                    format!("Duplicate property: {}", property),
                    decl.property_span.start,
                    decl.property_span.end,
                )
                .with_category(Category::Style)
                .with_rule("duplicate-property"),
            );
        }

        let importants = IMPORTANT.find_iter(&decl.value).count();
        if importants > 1 {
            let deduped = format!("{} !important", IMPORTANT.replace_all(&decl.value, "").trim());
            errors.push(
                CodeError::warning(
                    format!("Multiple !important in property: {}", property),
                    decl.value_span.start,
                    decl.value_span.end,
                )
                .with_category(Category::Style)
                .with_rule("multiple-important")
                .with_fix(
                    "Keep a single !important",
                    TextEdit::replace(decl.value_span.start, decl.value_span.end, deduped),
                ),
            );
        }

        if let Some((i, ch)) = decl.value.char_indices().find(|&(_, c)| !is_value_char(c)) {
            let at = decl.value_span.start + i;
            errors.push(
                CodeError::error(
                    format!("Invalid character '{}' in value of property: {}", ch, property),
                    at,
                    at + ch.len_utf8(),
                )
                .with_category(Category::Syntax)
                .with_rule("invalid-character")
                .with_fix(
                    format!("Remove '{}'", ch),
                    TextEdit::delete(at, at + ch.len_utf8()),
                ),
            );
            return;
        }

        let Some(validator) = self.validators.get(property) else {
            return;
        };

        // Value without any trailing `!important`
        let core = decl.value.split('!').next().unwrap_or_default().trim_end();
        if core.is_empty() || uses_preprocessor(core) {
            return;
        }

        if let Err(suggestion) = validator.validate(core) {
            let from = decl.value_span.start;
            let to = from + core.len();
            let mut error = CodeError::error(
                format!(
                    "Invalid {} value for {}: {}",
                    validator.kind(),
                    property,
                    core
                ),
                from,
                to,
            )
            .with_category(Category::Type)
            .with_rule("invalid-value");
            if let Some(replacement) = suggestion {
                error = error.with_fix(
                    format!("Replace with {}", replacement),
                    TextEdit::replace(from, to, replacement),
                );
            }
            errors.push(error);
        }
    }
}

fn is_value_char(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || VALUE_PUNCTUATION.contains(c)
}

fn uses_preprocessor(value: &str) -> bool {
    value.contains('$') || value.contains('@') || value.contains("#(") || value.contains("var(")
}

/// Blank out comments and string contents, keeping byte offsets.
///
/// Block comments nest: every `/*` needs its own `*/`. Sass/Less line comments
/// run to end of line and never start inside parentheses, so `url(//cdn...)`
/// stays intact. Interpolation braces (`#{...}`) become parentheses so
/// they do not open blocks.
fn mask(source: &str, errors: &mut Vec<CodeError>) -> String {
    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut openers: Vec<usize> = Vec::new();
    let mut quote: Option<u8> = None;
    let mut interpolation = 0usize;
    let mut parens = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if !openers.is_empty() {
            if b == b'/' && next == Some(b'*') {
                openers.push(i);
                blank(&mut out, i..i + 2);
                i += 2;
            } else if b == b'*' && next == Some(b'/') {
                openers.pop();
                blank(&mut out, i..i + 2);
                i += 2;
            } else {
                blank(&mut out, i..i + 1);
                i += 1;
            }
            continue;
        }

        if let Some(q) = quote {
            if b == b'\\' {
                let escaped = source[i + 1..].chars().next().map_or(0, char::len_utf8);
                blank(&mut out, i..i + 1 + escaped);
                i += 1 + escaped;
                continue;
            }
            if b == q || b == b'\n' {
                quote = None;
            } else {
                blank(&mut out, i..i + 1);
            }
            i += 1;
            continue;
        }

        match (b, next) {
            (b'/', Some(b'*')) => {
                openers.push(i);
                blank(&mut out, i..i + 2);
                i += 2;
            }
            (b'/', Some(b'/')) if parens == 0 && (i == 0 || bytes[i - 1] != b':') => {
                let end = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
                blank(&mut out, i..end);
                i = end;
            }
            (b'"' | b'\'', _) => {
                quote = Some(b);
                i += 1;
            }
            (b'#', Some(b'{')) => {
                out[i + 1] = b'(';
                interpolation += 1;
                i += 2;
            }
            (b'}', _) if interpolation > 0 => {
                out[i] = b')';
                interpolation -= 1;
                i += 1;
            }
            (b'(', _) => {
                parens += 1;
                i += 1;
            }
            (b')', _) => {
                parens = parens.saturating_sub(1);
                i += 1;
            }
            _ => i += 1,
        }
    }

    if let Some(&first) = openers.first() {
        let depth = openers.len();
        let message = if depth > 1 {
            format!("Unclosed nested comment ({} levels)", depth)
        } else {
            "Unclosed comment".to_string()
        };
        errors.push(
            CodeError::warning(message, first, source.len())
                .with_category(Category::Syntax)
                .with_rule("unclosed-comment")
                .with_fix(
                    "Close the comment",
                    TextEdit::insert(source.len(), "*/".repeat(depth)),
                ),
        );
    }

    // Only whole characters were replaced with ASCII, so this cannot fail
    String::from_utf8(out).unwrap_or_else(|_| source.to_string())
}

fn blank(out: &mut [u8], range: Range<usize>) {
    for b in &mut out[range] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

fn check_braces(masked: &str, errors: &mut Vec<CodeError>) {
    let mut stack: Vec<BracketFrame> = Vec::new();

    for (i, ch) in masked.char_indices() {
        match ch {
            '{' => stack.push(BracketFrame { ch, position: i }),
            '}' => {
                if stack.pop().is_none() {
                    errors.push(
                        CodeError::error("Unexpected closing brace", i, i + 1)
                            .with_category(Category::Syntax)
                            .with_rule("unexpected-closing-brace")
                            .with_fix("Remove the brace", TextEdit::delete(i, i + 1)),
                    );
                }
            }
            _ => {}
        }
    }

    if let Some(first) = stack.first() {
        let depth = stack.len();
        let message = if depth > 1 {
            format!("Unclosed block ({} unmatched '{}')", depth, first.ch)
        } else {
            "Unclosed block".to_string()
        };
        errors.push(
            CodeError::error(message, first.position, first.position + 1)
                .with_category(Category::Syntax)
                .with_rule("unclosed-block")
                .with_fix(
                    "Close the block",
                    TextEdit::insert(masked.len(), "}".repeat(depth)),
                ),
        );
    }
}

/// Split block bodies into `property: value` statements.
///
/// A statement ends at `;` or `}`. Text ending at `{` is a selector or at-rule
/// prelude and is skipped, as is anything at the top level.
fn collect_declarations(masked: &str) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'{' => {
                depth += 1;
                start = i + 1;
            }
            b'}' => {
                if depth > 0 {
                    declarations.extend(parse_declaration(masked, start..i));
                }
                depth = depth.saturating_sub(1);
                start = i + 1;
            }
            b';' => {
                if depth > 0 {
                    declarations.extend(parse_declaration(masked, start..i));
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth > 0 {
        declarations.extend(parse_declaration(masked, start..masked.len()));
    }

    declarations
}

fn parse_declaration(masked: &str, span: Range<usize>) -> Option<Declaration> {
    let text = &masked[span.clone()];
    let colon = text.find(':')?;

    let raw_property = &text[..colon];
    let property = raw_property.trim();
    if !PROPERTY_NAME.is_match(property) {
        return None;
    }

    let raw_value = &text[colon + 1..];
    let value = raw_value.trim();
    if value.is_empty() {
        return None;
    }

    let property_start = span.start + (raw_property.len() - raw_property.trim_start().len());
    let value_start = span.start + colon + 1 + (raw_value.len() - raw_value.trim_start().len());

    Some(Declaration {
        property: property.to_lowercase(),
        property_span: property_start..property_start + property.len(),
        value: value.to_string(),
        value_span: value_start..value_start + value.len(),
    })
}

/// Undefined `$variables`, `@include`d mixins and `@extend`ed placeholders
fn check_sass_symbols(masked: &str, errors: &mut Vec<CodeError>) {
    let mut defined: HashSet<&str> = SASS_DEFINITION
        .captures_iter(masked)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    for caps in SASS_SIGNATURE
        .captures_iter(masked)
        .chain(SASS_LOOP.captures_iter(masked))
    {
        if let Some(params) = caps.get(1) {
            defined.extend(
                SASS_VAR
                    .captures_iter(params.as_str())
                    .filter_map(|c| c.get(1).map(|m| m.as_str())),
            );
        }
    }

    for caps in SASS_VAR.captures_iter(masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if !defined.contains(name.as_str()) {
            errors.push(
                CodeError::error(
                    format!("Undefined Sass variable: ${}", name.as_str()),
                    whole.start(),
                    whole.end(),
                )
                .with_category(Category::Semantic)
                .with_rule("undefined-variable"),
            );
        }
    }

    let mixins: HashSet<&str> = MIXIN
        .captures_iter(masked)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    for caps in INCLUDE.captures_iter(masked) {
        let Some(name) = caps.get(1) else { continue };
        if !mixins.contains(name.as_str()) {
            errors.push(
                CodeError::error(
                    format!("Undefined mixin: {}", name.as_str()),
                    name.start(),
                    name.end(),
                )
                .with_category(Category::Semantic)
                .with_rule("undefined-mixin"),
            );
        }
    }

    let placeholders: HashSet<&str> = PLACEHOLDER
        .captures_iter(masked)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    for caps in EXTEND_PLACEHOLDER.captures_iter(masked) {
        let Some(name) = caps.get(1) else { continue };
        if !placeholders.contains(name.as_str()) {
            errors.push(
                CodeError::error(
                    format!("Undefined placeholder: %{}", name.as_str()),
                    name.start() - 1,
                    name.end(),
                )
                .with_category(Category::Semantic)
                .with_rule("undefined-placeholder"),
            );
        }
    }
}

/// Less `@variables` used in declaration values without an `@name:` definition
fn check_less_variables(masked: &str, declarations: &[Declaration], errors: &mut Vec<CodeError>) {
    let mut defined: HashSet<&str> = LESS_DEFINITION
        .captures_iter(masked)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    for caps in LESS_MIXIN_SIGNATURE.captures_iter(masked) {
        if let Some(params) = caps.get(1) {
            defined.extend(
                LESS_VAR
                    .captures_iter(params.as_str())
                    .filter_map(|c| c.get(1).map(|m| m.as_str())),
            );
        }
    }

    for decl in declarations {
        for caps in LESS_VAR.captures_iter(&decl.value) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !defined.contains(name.as_str()) {
                errors.push(
                    CodeError::error(
                        format!("Undefined Less variable: @{}", name.as_str()),
                        decl.value_span.start + whole.start(),
                        decl.value_span.start + whole.end(),
                    )
                    .with_category(Category::Semantic)
                    .with_rule("undefined-variable"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckOptions;
    use crate::diagnostic::Severity;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> Vec<CodeError> {
        let options = CheckOptions::new();
        let ctx = CheckContext::new(&options);
        StyleChecker::new().check(source, &ctx)
    }

    fn rules(errors: &[CodeError]) -> Vec<&str> {
        errors.iter().filter_map(|e| e.rule()).collect()
    }

    fn count(errors: &[CodeError], rule: &str) -> usize {
        errors.iter().filter(|e| e.rule() == Some(rule)).count()
    }

    #[test]
    fn test_clean_stylesheet() {
        let source = "/* header */\nbody {\n  color: #333;\n  width: 100%;\n  font-family: \"Helvetica Neue\", sans-serif;\n}\n\na:hover { background-color: rgba(0, 0, 0, 0.1) !important; }\n";
        assert_eq!(check(source), vec![]);
    }

    #[test]
    fn test_invalid_color_with_suggestion() {
        let source = "a{color:reddd;}";
        let errors = check(source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid color value for color: reddd");
        assert_eq!(errors[0].rule(), Some("invalid-value"));
        assert_eq!(errors[0].fixes[0].edit, TextEdit::replace(8, 13, "red"));
    }

    #[test]
    fn test_unitless_length() {
        let errors = check("div { height: 10; }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Invalid length value for height: 10");
        assert_eq!(errors[0].fixes[0].edit.text, "10px");
    }

    #[test]
    fn test_unclosed_blocks_reported_once() {
        let errors = check("{{{");
        assert_eq!(count(&errors, "unclosed-block"), 1);
        assert_eq!(count(&errors, "unexpected-closing-brace"), 0);
        assert_eq!(errors[0].from, 0);
        assert_eq!(errors[0].fixes[0].edit, TextEdit::insert(3, "}}}"));
    }

    #[test]
    fn test_each_stray_brace_reported() {
        let errors = check("}}}");
        assert_eq!(count(&errors, "unexpected-closing-brace"), 3);
        assert_eq!(count(&errors, "unclosed-block"), 0);
    }

    #[test]
    fn test_braces_inside_comments_and_strings_ignored() {
        let source = "a { content: \"}\"; /* { */ }";
        assert_eq!(check(source), vec![]);
    }

    #[test]
    fn test_unclosed_comment() {
        let errors = check("a { color: red; }\n/* trailing");
        assert_eq!(rules(&errors), vec!["unclosed-comment"]);
        assert_eq!(errors[0].severity, Severity::Warning);
        assert_eq!(errors[0].message, "Unclosed comment");
        assert_eq!(errors[0].from, 18);
        assert_eq!(errors[0].to, 29);
    }

    #[test]
    fn test_unclosed_nested_comment() {
        let source = "/* outer /* inner */ still open";
        let errors = check(source);
        assert_eq!(errors[0].message, "Unclosed comment");

        let source = "/* a /* b";
        let errors = check(source);
        assert_eq!(errors[0].message, "Unclosed nested comment (2 levels)");
        assert_eq!(errors[0].fixes[0].edit, TextEdit::insert(source.len(), "*/*/"));
    }

    #[test]
    fn test_multiple_important() {
        let errors = check("p { color: red !important !important; }");
        assert_eq!(rules(&errors), vec!["multiple-important"]);
        assert_eq!(errors[0].fixes[0].edit.text, "red !important");
    }

    #[test]
    fn test_invalid_character() {
        let source = "p { margin: 10px ^ 2px; }";
        let errors = check(source);
        assert_eq!(rules(&errors), vec!["invalid-character"]);
        assert_eq!(&source[errors[0].from..errors[0].to], "^");
    }

    #[test]
    fn test_duplicate_property_is_flat() {
        let errors = check("a { color: red; }\nb { color: blue; }");
        assert_eq!(rules(&errors), vec!["duplicate-property"]);
        assert_eq!(errors[0].severity, Severity::Warning);
    }

    #[test]
    fn test_sass_variables() {
        let source = "$primary: #333;\n@mixin pad($size) { padding: $size; }\n.a { color: $primary; border-color: $accent; @include pad(4px); }\n@each $name in a, b { .x-#{$name} { width: 0; } }";
        let errors = check(source);
        assert_eq!(rules(&errors), vec!["undefined-variable"]);
        assert_eq!(errors[0].message, "Undefined Sass variable: $accent");
    }

    #[test]
    fn test_undefined_mixin_and_placeholder() {
        let source = "%base { margin: 0; }\n.a { @include missing; @extend %base; @extend %other; }";
        let errors = check(source);
        assert_eq!(rules(&errors), vec!["undefined-mixin", "undefined-placeholder"]);
        assert_eq!(errors[0].message, "Undefined mixin: missing");
        assert_eq!(errors[1].message, "Undefined placeholder: %other");
        assert_eq!(&source[errors[1].from..errors[1].to], "%other");
    }

    #[test]
    fn test_less_variables() {
        let source = "@base: 4px;\n.m(@gap) { margin: @gap; }\n.a { padding: @base; height: @missing; }\n@media screen { .b { width: 0; } }";
        let errors = check(source);
        assert_eq!(rules(&errors), vec!["undefined-variable"]);
        assert_eq!(errors[0].message, "Undefined Less variable: @missing");
    }

    #[test]
    fn test_custom_validator() {
        struct NoRed;
        impl ValueValidator for NoRed {
            fn kind(&self) -> &str {
                "brand color"
            }
            fn validate(&self, value: &str) -> Result<(), Option<String>> {
                if value == "red" {
                    Err(Some("crimson".to_string()))
                } else {
                    Ok(())
                }
            }
        }

        let checker = StyleChecker::new().with_validator("color", Arc::new(NoRed));
        let options = CheckOptions::new();
        let errors = checker.check("a { color: red; }", &CheckContext::new(&options));
        assert_eq!(errors[0].message, "Invalid brand color value for color: red");
    }

    #[test]
    fn test_line_comments_and_urls() {
        let source = "// note: { not a block\na { background: url(http://x.test/a.png); }";
        assert_eq!(check(source), vec![]);
    }

    #[test]
    fn test_protocol_relative_url() {
        let source = "a { background: url(//cdn.example.com/a.png); }\nb { color: red; }";
        assert_eq!(check(source), vec![]);

        let sass = "a { background: url(//cdn.example.com/a.png); } // trailing\nb { color: red; }";
        assert_eq!(check(sass), vec![]);
    }

    #[test]
    fn test_extended_named_colors_accepted() {
        let source = "a { color: rebeccapurple; background-color: dodgerblue; border-color: hotpink; }";
        assert_eq!(check(source), vec![]);
    }
}
