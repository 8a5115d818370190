//! Markup structural checker
//!
//! A left-to-right tag scan with an open-tag stack. Parent requirements and
//! forbidden nesting come from fixed tables checked when a tag is pushed.

use super::{CheckContext, Checker};
use crate::diagnostic::{Category, CodeError, TextEdit};
use crate::language::Language;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^<(/?)([A-Za-z][A-Za-z0-9:._-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#)
        .expect("valid tag pattern")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("valid attribute pattern")
});

/// Elements whose body is raw text rather than markup
const RAW_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "textarea", "title"];

/// How many tags to scan between deadline checks
const DEADLINE_STRIDE: usize = 64;

/// Maps child element -> elements it must sit directly inside
fn required_parents() -> HashMap<&'static str, &'static [&'static str]> {
    let mut map: HashMap<&'static str, &'static [&'static str]> = HashMap::new();

    // List items
    map.insert("li", &["ul", "ol", "menu"]);
    map.insert("dt", &["dl"]);
    map.insert("dd", &["dl"]);

    // Tables
    map.insert("tr", &["table", "thead", "tbody", "tfoot"]);
    map.insert("td", &["tr"]);
    map.insert("th", &["tr"]);
    map.insert("thead", &["table"]);
    map.insert("tbody", &["table"]);
    map.insert("tfoot", &["table"]);
    map.insert("caption", &["table"]);
    map.insert("colgroup", &["table"]);

    // Forms
    map.insert("option", &["select", "optgroup", "datalist"]);
    map.insert("optgroup", &["select"]);
    map.insert("legend", &["fieldset"]);

    map.insert("figcaption", &["figure"]);
    map.insert("summary", &["details"]);

    map
}

/// Unordered pairs that must not nest directly in either direction
const INVALID_NESTING: [(&str, &str); 7] = [
    ("p", "div"),
    ("p", "ul"),
    ("p", "ol"),
    ("a", "a"),
    ("button", "button"),
    ("form", "form"),
    ("label", "label"),
];

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// An element waiting for its closing tag
#[derive(Debug, Clone)]
struct OpenTag {
    name: String,
    position: usize,
    parent_name: Option<String>,
}

/// Structural checker for HTML
pub struct MarkupChecker {
    required_parents: HashMap<&'static str, &'static [&'static str]>,
    invalid_nesting: HashSet<(&'static str, &'static str)>,
    void_elements: HashSet<&'static str>,
}

impl MarkupChecker {
    pub fn new() -> Self {
        let invalid_nesting = INVALID_NESTING
            .iter()
            .flat_map(|&(a, b)| [(a, b), (b, a)])
            .collect();

        Self {
            required_parents: required_parents(),
            invalid_nesting,
            void_elements: VOID_ELEMENTS.into_iter().collect(),
        }
    }

    fn is_void(&self, name: &str) -> bool {
        self.void_elements.contains(name)
    }
}

impl Default for MarkupChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Checker for MarkupChecker {
    fn id(&self) -> &str {
        "markup"
    }

    fn description(&self) -> &str {
        "Tag matching, element nesting and attribute checks for HTML"
    }

    fn language(&self) -> Language {
        Language::Markup
    }

    fn check(&self, source: &str, ctx: &CheckContext<'_>) -> Vec<CodeError> {
        let mut scan = MarkupScan {
            checker: self,
            source,
            ctx,
            stack: Vec::new(),
            seen: HashSet::new(),
            errors: Vec::new(),
        };

        let completed = scan.run();
        if completed {
            scan.report_unclosed();
            if !ctx.options.allow_partial {
                scan.check_document_shape();
            }
        } else {
            log::warn!("Markup scan interrupted by timeout");
        }

        log::debug!("Markup scan produced {} diagnostics", scan.errors.len());
        scan.errors
    }
}

/// State of one markup scan
struct MarkupScan<'c, 's> {
    checker: &'c MarkupChecker,
    source: &'s str,
    ctx: &'c CheckContext<'c>,
    stack: Vec<OpenTag>,
    seen: HashSet<String>,
    errors: Vec<CodeError>,
}

impl MarkupScan<'_, '_> {
    /// Scan the whole source. Returns false if the deadline cut it short.
    fn run(&mut self) -> bool {
        let source = self.source;
        let mut pos = 0;
        let mut tags = 0usize;

        while let Some(rel) = source[pos..].find('<') {
            if tags % DEADLINE_STRIDE == 0 && self.ctx.deadline.is_expired() {
                return false;
            }

            let at = pos + rel;
            let rest = &source[at..];

            if rest.starts_with("<!--") {
                pos = match rest[4..].find("-->") {
                    Some(end) => at + 4 + end + 3,
                    None => {
                        self.errors.push(
                            CodeError::warning("Unclosed comment", at, at + 4)
                                .with_category(Category::Syntax)
                                .with_rule("unclosed-comment")
                                .with_fix("Close the comment", TextEdit::insert(source.len(), "-->")),
                        );
                        source.len()
                    }
                };
                continue;
            }

            let Some(caps) = TAG_RE.captures(rest) else {
                pos = at + 1;
                continue;
            };
            tags += 1;

            let tag_end = at + caps[0].len();
            let raw_name = &caps[2];
            let name = raw_name.to_ascii_lowercase();
            pos = tag_end;

            if !caps[1].is_empty() {
                self.close(&name, raw_name.len(), at, tag_end);
                continue;
            }

            let attrs = &caps[3];
            let attrs_start = at + 1 + raw_name.len();
            self.check_attributes(attrs, attrs_start);
            self.seen.insert(name.clone());

            let self_closing = attrs.trim_end().ends_with('/') || self.checker.is_void(&name);
            if self_closing {
                continue;
            }

            self.open(&name, at, tag_end);

            if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                let closer = format!("</{}", name);
                pos = source[pos..]
                    .to_ascii_lowercase()
                    .find(&closer)
                    .map_or(source.len(), |i| pos + i);
            }
        }

        true
    }

    fn open(&mut self, name: &str, at: usize, tag_end: usize) {
        let parent_name = self.stack.last().map(|t| t.name.clone());

        if let Some(parents) = self.checker.required_parents.get(name) {
            let satisfied = parent_name
                .as_deref()
                .is_some_and(|p| parents.contains(&p));
            if !satisfied {
                self.errors.push(
                    CodeError::error(
                        format!("Tag <{}> must be inside {}", name, describe_tags(parents)),
                        at,
                        tag_end,
                    )
                    .with_category(Category::Semantic)
                    .with_rule("invalid-parent"),
                );
            }
        }

        if let Some(parent) = parent_name.as_deref() {
            if self.checker.invalid_nesting.contains(&(parent, name)) {
                self.errors.push(
                    CodeError::error(
                        format!("Invalid nesting: <{}> cannot contain <{}>", parent, name),
                        at,
                        tag_end,
                    )
                    .with_category(Category::Semantic)
                    .with_rule("invalid-nesting"),
                );
            }
        }

        self.stack.push(OpenTag {
            name: name.to_string(),
            position: at,
            parent_name,
        });
    }

    fn close(&mut self, name: &str, name_len: usize, at: usize, tag_end: usize) {
        match self.stack.pop() {
            Some(open) if open.name == name => {}
            Some(open) => {
                let name_start = at + 2;
                self.errors.push(
                    CodeError::error(
                        format!(
                            "Mismatched closing tag: expected </{}> but found </{}>",
                            open.name, name
                        ),
                        at,
                        tag_end,
                    )
                    .with_category(Category::Syntax)
                    .with_rule("mismatched-closing-tag")
                    .with_fix(
                        format!("Change to </{}>", open.name),
                        TextEdit::replace(name_start, name_start + name_len, open.name.clone()),
                    ),
                );
            }
            None => {
                self.errors.push(
                    CodeError::error(
                        format!("Mismatched closing tag: found </{}> with no open tag", name),
                        at,
                        tag_end,
                    )
                    .with_category(Category::Syntax)
                    .with_rule("mismatched-closing-tag")
                    .with_fix(format!("Remove </{}>", name), TextEdit::delete(at, tag_end)),
                );
            }
        }
    }

    fn check_attributes(&mut self, attrs: &str, base: usize) {
        let mut names = HashSet::new();

        for caps in ATTR_RE.captures_iter(attrs) {
            let Some(whole) = caps.get(0) else { continue };
            let name = caps[1].to_ascii_lowercase();
            let from = base + whole.start();
            let to = base + whole.end();

            // Removal also takes the whitespace in front of the attribute
            let leading = attrs[..whole.start()].len() - attrs[..whole.start()].trim_end().len();
            let removal = TextEdit::delete(from - leading, to);

            if !names.insert(name.clone()) {
                self.errors.push(
                    CodeError::error(format!("Duplicate attribute: {}", name), from, to)
                        .with_category(Category::Syntax)
                        .with_rule("duplicate-attribute")
                        .with_fix(format!("Remove duplicate {}", name), removal),
                );
                continue;
            }

            let quoted = caps.get(2).or_else(|| caps.get(3));
            if quoted.is_some_and(|v| v.as_str().trim().is_empty()) {
                self.errors.push(
                    CodeError::warning(format!("Empty value for attribute: {}", name), from, to)
                        .with_category(Category::Semantic)
                        .with_rule("empty-attribute")
                        .with_fix(format!("Remove empty {}", name), removal),
                );
            }
        }
    }

    /// Innermost first, so appended closers nest correctly
    fn report_unclosed(&mut self) {
        let end = self.source.len();
        while let Some(open) = self.stack.pop() {
            let mut error = CodeError::error(
                format!("Unclosed tag: <{}>", open.name),
                open.position,
                open.position + open.name.len() + 1,
            )
            .with_category(Category::Syntax)
            .with_rule("unclosed-tag")
            .with_fix(
                format!("Add </{}>", open.name),
                TextEdit::insert(end, format!("</{}>", open.name)),
            );
            if let Some(parent) = &open.parent_name {
                error.message.push_str(&format!(" (inside <{}>)", parent));
            }
            self.errors.push(error);
        }
    }

    fn check_document_shape(&mut self) {
        if self.source.trim().is_empty() {
            return;
        }

        if !self.seen.contains("html") {
            self.errors.push(
                CodeError::warning("Missing <html> tag", 0, 0)
                    .with_category(Category::Semantic)
                    .with_rule("missing-root"),
            );
            return;
        }

        for (section, message) in [
            ("head", "Missing <head> section"),
            ("body", "Missing <body> section"),
        ] {
            if !self.seen.contains(section) {
                self.errors.push(
                    CodeError::warning(message, 0, 0)
                        .with_category(Category::Semantic)
                        .with_rule("missing-section"),
                );
            }
        }
    }
}

/// "<ul> or <ol>", "<table>, <thead> or <tbody>"
fn describe_tags(tags: &[&str]) -> String {
    let quoted: Vec<String> = tags.iter().map(|t| format!("<{}>", t)).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
