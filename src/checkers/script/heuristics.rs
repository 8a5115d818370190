//! Text-level script checks that run with or without a syntax tree.
//!
//! These work on raw text and can fire inside string or comment contents.

use super::is_ambient;
use crate::checkers::Deadline;
use crate::diagnostic::{Category, CodeError, TextEdit};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Bytes scanned between deadline checks
const DEADLINE_STRIDE: usize = 4096;

static ASYNC_ARROW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\basync\s*(?:\([^()]*\)|[A-Za-z_$][\w$]*)\s*=>").expect("valid async arrow pattern")
});

static ASYNC_ARROW_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\basync\s*(?:\([^()]*\)|[A-Za-z_$][\w$]*)\s*=>$")
        .expect("valid async arrow pattern")
});

static FUNCTION_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^\w$])function\b").expect("valid function pattern"));

static ASYNC_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\basync\s+function\s*\*?\s*[\w$]*$").expect("valid async function pattern")
});

static DESTRUCTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\{[^;]*?\}|\[[^;]*?\])\s*=\s*([A-Za-z_$][\w$]*)\s*(?:;|\r?\n|$)")
        .expect("valid destructuring pattern")
});

static PATTERN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z_$][\w$]*)(\s*:)?").expect("valid pattern name pattern")
});

static IMPORT_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s+([^;]*?)\s+from\b").expect("valid import clause pattern")
});

const CONTROL_KEYWORDS: [&str; 6] = ["if", "for", "while", "switch", "catch", "with"];

/// Run every text check over `source`
pub fn run(source: &str, deadline: &Deadline) -> Vec<CodeError> {
    let mut errors = loose_equality(source);
    if deadline.is_expired() {
        return errors;
    }

    let mut scan = BlockScan::new(source);
    if scan.run(deadline) {
        scan.report_undeclared_destructuring();
    }
    errors.extend(scan.errors);
    errors
}

/// `==` and `!=`, suggesting their strict forms
fn loose_equality(source: &str) -> Vec<CodeError> {
    let bytes = source.as_bytes();
    let mut errors = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        let next_is_eq = bytes.get(i + 2) == Some(&b'=');
        let operator = match (bytes[i], bytes[i + 1]) {
            (b'=', b'=') if !next_is_eq && (i == 0 || !b"=!<>".contains(&bytes[i - 1])) => "==",
            (b'!', b'=') if !next_is_eq => "!=",
            (b'=' | b'!', b'=') => {
                // Strict form: skip the whole operator
                i += 3;
                continue;
            }
            _ => {
                i += 1;
                continue;
            }
        };

        let (strict, message) = if operator == "==" {
            ("===", "Use strict equality (===) instead of loose equality (==)")
        } else {
            ("!==", "Use strict inequality (!==) instead of loose inequality (!=)")
        };
        errors.push(
            CodeError::suggestion(message, i, i + 2)
                .with_category(Category::Style)
                .with_rule("eqeqeq")
                .with_fix(format!("Replace with {}", strict), TextEdit::replace(i, i + 2, strict)),
        );
        i += 2;
    }

    errors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Function { is_async: bool },
    Other,
}

#[derive(Debug)]
struct Block {
    kind: BlockKind,
    /// Paren depth when the block opened; deeper means a loop head
    paren_base: usize,
    lexical: HashSet<String>,
}

impl Block {
    fn new(kind: BlockKind, paren_base: usize) -> Self {
        Self {
            kind,
            paren_base,
            lexical: HashSet::new(),
        }
    }
}

/// One pass over the text tracking brace blocks
struct BlockScan<'s> {
    source: &'s str,
    blocks: Vec<Block>,
    paren_depth: usize,
    /// Offset just past the last `;`, `{` or `}` outside parentheses
    boundary: usize,
    top_level: HashSet<String>,
    destructures: Vec<(String, usize, usize)>,
    errors: Vec<CodeError>,
}

impl<'s> BlockScan<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            blocks: vec![Block::new(BlockKind::Other, 0)],
            paren_depth: 0,
            boundary: 0,
            top_level: HashSet::new(),
            destructures: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn at_top_level(&self) -> bool {
        self.blocks.len() == 1 && self.paren_depth == 0
    }

    /// Inside parentheses opened within the current block, e.g. a loop head
    fn inside_parens(&self) -> bool {
        self.blocks
            .last()
            .is_some_and(|b| self.paren_depth > b.paren_base)
    }

    /// Returns false if the deadline cut the scan short
    fn run(&mut self, deadline: &Deadline) -> bool {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut i = 0;
        let mut next_check = DEADLINE_STRIDE;

        while i < bytes.len() {
            if i >= next_check {
                if deadline.is_expired() {
                    return false;
                }
                next_check = i + DEADLINE_STRIDE;
            }

            match bytes[i] {
                b'{' => {
                    let kind = classify_header(&source[self.boundary..i]);
                    let nested = self.inside_parens();
                    self.blocks.push(Block::new(kind, self.paren_depth));
                    if !nested {
                        self.boundary = i + 1;
                    }
                }
                b'}' => {
                    if self.blocks.len() > 1 {
                        self.blocks.pop();
                    }
                    if !self.inside_parens() {
                        self.boundary = i + 1;
                    }
                }
                b';' if !self.inside_parens() => self.boundary = i + 1,
                b'(' => self.paren_depth += 1,
                b')' => self.paren_depth = self.paren_depth.saturating_sub(1),
                b if is_ident_start(b) && (i == 0 || !is_ident_byte(bytes[i - 1])) => {
                    let end = ident_end(bytes, i);
                    if previous_non_space(bytes, i) != Some(b'.') {
                        self.on_word(i, end);
                    }
                    i = end;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        true
    }

    fn on_word(&mut self, start: usize, end: usize) {
        match &self.source[start..end] {
            "await" => self.check_await(start, end),
            keyword @ ("let" | "const" | "class") => match self.next_ident(end) {
                Some((from, to)) => self.declare_lexical(from, to),
                None if keyword != "class" => self.note_destructure(end),
                None => {}
            },
            "var" => match self.next_ident(end) {
                Some((from, to)) => {
                    if self.at_top_level() {
                        self.top_level.insert(self.source[from..to].to_string());
                    }
                }
                None => self.note_destructure(end),
            },
            "function" => {
                if let Some((from, to)) = self.next_ident(end) {
                    if self.at_top_level() {
                        self.top_level.insert(self.source[from..to].to_string());
                    }
                }
            }
            "import" if self.at_top_level() => self.note_import(end),
            _ => {}
        }
    }

    /// Identifier following `at`, past whitespace and a generator star
    fn next_ident(&self, at: usize) -> Option<(usize, usize)> {
        let bytes = self.source.as_bytes();
        let mut i = at;
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'*') {
            i += 1;
        }
        if i == at || i >= bytes.len() || !is_ident_start(bytes[i]) {
            return None;
        }
        Some((i, ident_end(bytes, i)))
    }

    fn declare_lexical(&mut self, from: usize, to: usize) {
        if self.inside_parens() {
            return;
        }
        let name = &self.source[from..to];
        if self.at_top_level() {
            self.top_level.insert(name.to_string());
        }

        let Some(block) = self.blocks.last_mut() else {
            return;
        };
        if !block.lexical.insert(name.to_string()) {
            self.errors.push(
                CodeError::error(
                    format!("Cannot redeclare block-scoped variable: {}", name),
                    from,
                    to,
                )
                .with_category(Category::Semantic)
                .with_rule("no-redeclare"),
            );
        }
    }

    fn check_await(&mut self, start: usize, end: usize) {
        let enclosing = self.blocks.iter().rev().find_map(|b| match b.kind {
            BlockKind::Function { is_async } => Some(is_async),
            BlockKind::Other => None,
        });
        if enclosing == Some(true) {
            return;
        }
        // Expression-bodied async arrow in the current statement
        if ASYNC_ARROW.is_match(&self.source[self.boundary..start]) {
            return;
        }

        self.errors.push(
            CodeError::error("'await' is only valid inside async functions", start, end)
                .with_category(Category::Semantic)
                .with_rule("await-outside-async"),
        );
    }

    /// `const { a } = source;` at the top level
    fn note_destructure(&mut self, at: usize) {
        if !self.at_top_level() {
            return;
        }
        let rest = &self.source[at..];
        if !rest.trim_start().starts_with(['{', '[']) {
            return;
        }
        let Some(caps) = DESTRUCTURE.captures(rest) else {
            return;
        };

        for name in PATTERN_NAME.captures_iter(&caps[1]) {
            if name.get(2).is_none() {
                self.top_level.insert(name[1].to_string());
            }
        }
        if let Some(source_name) = caps.get(2) {
            self.destructures.push((
                source_name.as_str().to_string(),
                at + source_name.start(),
                at + source_name.end(),
            ));
        }
    }

    fn note_import(&mut self, at: usize) {
        let Some(caps) = IMPORT_CLAUSE.captures(&self.source[at..]) else {
            return;
        };
        let clause = &caps[1];
        let mut names = clause
            .split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .filter(|w| !w.is_empty())
            .peekable();

        while let Some(word) = names.next() {
            // `a as b` binds b
            if names.peek() == Some(&"as") || word == "as" || word == "type" {
                continue;
            }
            self.top_level.insert(word.to_string());
        }
    }

    fn report_undeclared_destructuring(&mut self) {
        for (name, from, to) in std::mem::take(&mut self.destructures) {
            if self.top_level.contains(&name) || is_ambient(&name) {
                continue;
            }
            self.errors.push(
                CodeError::error(
                    format!("Cannot destructure from undeclared variable: {}", name),
                    from,
                    to,
                )
                .with_category(Category::Semantic)
                .with_rule("no-undef"),
            );
        }
    }
}

/// Decide what kind of block the text before a `{` opens
fn classify_header(header: &str) -> BlockKind {
    let header = header.trim_end();

    if header.ends_with("=>") {
        return BlockKind::Function {
            is_async: ASYNC_ARROW_END.is_match(header),
        };
    }
    if !header.ends_with(')') {
        return BlockKind::Other;
    }
    let Some(open) = matching_open_paren(header) else {
        return BlockKind::Other;
    };

    let prefix = header[..open].trim_end();
    let (word_start, last_word) = trailing_word(prefix);

    // `for await (...)`
    let for_await =
        last_word == "await" && trailing_word(prefix[..word_start].trim_end()).1 == "for";
    if for_await || CONTROL_KEYWORDS.contains(&last_word) {
        return BlockKind::Other;
    }
    if FUNCTION_KEYWORD.is_match(prefix) {
        return BlockKind::Function {
            is_async: ASYNC_FUNCTION.is_match(prefix),
        };
    }
    if !last_word.is_empty() {
        // Method shorthand: `async name() {`
        let before = prefix[..word_start].trim_end().trim_end_matches('*').trim_end();
        return BlockKind::Function {
            is_async: before.rsplit(char::is_whitespace).next() == Some("async"),
        };
    }
    BlockKind::Other
}

/// Start offset and text of the identifier-like word ending `text`
fn trailing_word(text: &str) -> (usize, &str) {
    let start = text
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .map_or(0, |i| i + 1);
    (start, &text[start..])
}

fn matching_open_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().rev() {
        match b {
            b')' => depth += 1,
            b'(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$'
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn ident_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    end
}

fn previous_non_space(bytes: &[u8], at: usize) -> Option<u8> {
    bytes[..at]
        .iter()
        .rev()
        .copied()
        .find(|b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rules(source: &str) -> Vec<String> {
        run(source, &Deadline::none())
            .into_iter()
            .filter_map(|e| e.rule_id)
            .collect()
    }

    #[test]
    fn test_loose_equality_and_fix() {
        let errors = loose_equality("if (a == b && c != d) {}");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].fixes[0].edit, TextEdit::replace(6, 8, "==="));
        assert_eq!(errors[1].fixes[0].edit, TextEdit::replace(16, 18, "!=="));
    }

    #[test]
    fn test_strict_equality_is_clean() {
        assert!(loose_equality("a === b; c !== d; e <= f; g >= h; i => j").is_empty());
    }

    #[test]
    fn test_await_in_plain_function() {
        assert_eq!(rules("function f() { await g(); }"), vec!["await-outside-async"]);
    }

    #[test]
    fn test_await_in_async_forms() {
        for source in [
            "async function f() { await g(); }",
            "const f = async () => { await g(); };",
            "const f = async x => await g(x);",
            "class A { async load() { await g(); } }",
            "items.forEach(async (item) => { if (item) { await save(item); } });",
        ] {
            assert!(rules(source).is_empty(), "{}", source);
        }
    }

    #[test]
    fn test_await_at_top_level() {
        assert_eq!(rules("await ready();"), vec!["await-outside-async"]);
    }

    #[test]
    fn test_duplicate_lexical_in_same_block() {
        let errors = run("let a = 1;\nlet a = 2;", &Deadline::none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule(), Some("no-redeclare"));
        assert_eq!((errors[0].from, errors[0].to), (15, 16));
    }

    #[test]
    fn test_loop_heads_and_nested_blocks_do_not_collide() {
        let source = "for (let i = 0; i < 2; i++) {}\nfor (let i = 0; i < 2; i++) {}\n{ let a; }\n{ let a; }";
        assert!(rules(source).is_empty());
    }

    #[test]
    fn test_destructuring_from_undeclared() {
        let errors = run("const { a, b } = config;", &Deadline::none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Cannot destructure from undeclared variable: config");
        assert_eq!(&"const { a, b } = config;"[errors[0].from..errors[0].to], "config");
    }

    #[test]
    fn test_destructuring_from_declared() {
        assert!(rules("import config from './c';\nconst { a } = config;").is_empty());
        assert!(rules("const config = {};\nconst [x, y] = config;").is_empty());
        assert!(rules("const { a } = window;").is_empty());
    }

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header("if (x) "), BlockKind::Other);
        assert_eq!(
            classify_header("async function load(a, b) "),
            BlockKind::Function { is_async: true }
        );
        assert_eq!(
            classify_header(" function () "),
            BlockKind::Function { is_async: false }
        );
        assert_eq!(classify_header("\n  render() "), BlockKind::Function { is_async: false });
        assert_eq!(classify_header("\n  async render() "), BlockKind::Function { is_async: true });
        assert_eq!(classify_header(" x = "), BlockKind::Other);
        assert_eq!(classify_header(" for await (const item of items) "), BlockKind::Other);
        assert_eq!(
            classify_header(" async function* stream(source) "),
            BlockKind::Function { is_async: true }
        );
    }

    #[test]
    fn test_await_inside_for_await_body() {
        let source = "async function f(items) { for await (const item of items) { await item.save(); } }";
        assert!(rules(source).is_empty());

        let plain = "function f(items) { for await (const item of items) { await item.save(); } }";
        assert!(rules(plain).iter().all(|r| r == "await-outside-async"));
        assert!(!rules(plain).is_empty());
    }
}
