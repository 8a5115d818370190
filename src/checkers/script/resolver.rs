//! Scope-aware name resolution over the JavaScript syntax tree.
//!
//! The walk opens frames, binds declarations and records every identifier
//! use. Uses are resolved once the walk is finished, so hoisted functions
//! and `var`s are visible to code above them.

use super::is_ambient;
use super::scope::{DeclKind, Declaration, FrameId, FrameKind, ScopeStack, ROOT};
use crate::checkers::Deadline;
use crate::diagnostic::{Category, CodeError, TextEdit};
use std::ops::Range;
use tree_sitter::Node;

/// Nodes visited between deadline checks
const DEADLINE_STRIDE: usize = 256;

/// Initializers simple enough that dropping the statement changes nothing
const LITERAL_KINDS: [&str; 8] = [
    "number", "string", "true", "false", "null", "undefined", "regex", "template_string",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseRole {
    Read,
    Write,
    Call,
    /// `typeof x`, which is legal on undeclared names
    Probe,
}

#[derive(Debug)]
struct Use {
    name: String,
    frame: FrameId,
    span: Range<usize>,
    role: UseRole,
}

/// What a resolution pass found
#[derive(Debug, Default)]
pub struct Resolution {
    pub errors: Vec<CodeError>,
    pub interrupted: bool,
}

/// Resolve names in the tree rooted at `root`
pub fn resolve(root: Node<'_>, source: &str, deadline: &Deadline) -> Resolution {
    let mut resolver = Resolver {
        source,
        deadline,
        scopes: ScopeStack::new(),
        uses: Vec::new(),
        errors: Vec::new(),
        exporting: false,
        visited: 0,
        interrupted: false,
    };

    resolver.visit_children(root);

    if resolver.interrupted {
        // Unresolved uses would look undefined; report only what the walk saw
        log::debug!("Name resolution interrupted after {} nodes", resolver.visited);
        return Resolution {
            errors: resolver.errors,
            interrupted: true,
        };
    }

    resolver.resolve_uses();
    resolver.report_unused();

    Resolution {
        errors: resolver.errors,
        interrupted: false,
    }
}

struct Resolver<'s, 'd> {
    source: &'s str,
    deadline: &'d Deadline,
    scopes: ScopeStack,
    uses: Vec<Use>,
    errors: Vec<CodeError>,
    exporting: bool,
    visited: usize,
    interrupted: bool,
}

impl<'s> Resolver<'s, '_> {
    fn text(&self, node: Node<'_>) -> &'s str {
        self.source.get(node.byte_range()).unwrap_or_default()
    }

    fn visit_children(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        if self.interrupted {
            return;
        }
        self.visited += 1;
        if self.visited % DEADLINE_STRIDE == 0 && self.deadline.is_expired() {
            self.interrupted = true;
            return;
        }

        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.declare(name, DeclKind::Function, None);
                }
                self.visit_function(node, None);
            }
            "function_expression" | "function" | "generator_function" => {
                self.visit_function(node, node.child_by_field_name("name"));
            }
            "arrow_function" => self.visit_function(node, None),
            "method_definition" => {
                if let Some(name) = node.child_by_field_name("name") {
                    if name.kind() == "computed_property_name" {
                        self.visit(name);
                    }
                }
                self.visit_function(node, None);
            }
            "class_declaration" => {
                if let Some(name) = node.child_by_field_name("name") {
                    self.declare(name, DeclKind::Class, None);
                }
                self.visit_class(node, None);
            }
            "class" => self.visit_class(node, node.child_by_field_name("name")),
            "statement_block" | "switch_body" => {
                self.scopes.push(FrameKind::Block);
                self.visit_children(node);
                self.scopes.pop();
            }
            "for_statement" | "for_in_statement" => self.visit_for(node),
            "catch_clause" => self.visit_catch(node),
            "lexical_declaration" | "variable_declaration" => self.visit_declaration(node),
            "import_statement" => self.visit_import(node),
            "export_statement" => self.visit_export(node),
            "debugger_statement" => self.report_debugger(node),
            "identifier" | "shorthand_property_identifier" => self.record_use(node, UseRole::Read),
            "call_expression" => self.visit_call(node),
            "assignment_expression" | "augmented_assignment_expression" => {
                self.visit_assignment(node)
            }
            "unary_expression" => self.visit_unary(node),
            "jsx_opening_element" | "jsx_closing_element" | "jsx_self_closing_element" => {
                self.visit_jsx_element(node)
            }
            "ERROR" => {}
            _ => self.visit_children(node),
        }
    }

    /// Functions, arrows and methods: parameters and body share one frame
    fn visit_function(&mut self, node: Node<'_>, own_name: Option<Node<'_>>) {
        self.scopes.push(FrameKind::Function);

        if let Some(name) = own_name {
            self.declare(name, DeclKind::Function, None);
        }
        if let Some(param) = node.child_by_field_name("parameter") {
            self.declare_pattern(param, DeclKind::Param);
        }
        if let Some(params) = node.child_by_field_name("parameters") {
            let mut cursor = params.walk();
            for param in params.named_children(&mut cursor) {
                self.declare_pattern(param, DeclKind::Param);
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "statement_block" {
                self.visit_children(body);
            } else {
                self.visit(body);
            }
        }

        self.scopes.pop();
    }

    fn visit_class(&mut self, node: Node<'_>, own_name: Option<Node<'_>>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();

        for child in &children {
            if matches!(child.kind(), "class_heritage" | "decorator") {
                self.visit(*child);
            }
        }

        self.scopes.push(FrameKind::Block);
        if let Some(name) = own_name {
            self.declare(name, DeclKind::Class, None);
        }
        for child in children {
            if child.kind() == "class_body" {
                self.visit_children(child);
            }
        }
        self.scopes.pop();
    }

    /// Loop heads bind in a frame that also covers the body
    fn visit_for(&mut self, node: Node<'_>) {
        self.scopes.push(FrameKind::Block);

        if node.kind() == "for_in_statement" {
            let kind = node
                .child_by_field_name("kind")
                .map(|k| match self.text(k) {
                    "var" => DeclKind::Var,
                    "const" => DeclKind::Const,
                    _ => DeclKind::Let,
                });
            if let Some(left) = node.child_by_field_name("left") {
                match kind {
                    Some(kind) => self.declare_pattern(left, kind),
                    None if left.kind() == "identifier" => self.record_use(left, UseRole::Write),
                    None => self.visit(left),
                }
            }
            for field in ["right", "body"] {
                if let Some(child) = node.child_by_field_name(field) {
                    self.visit(child);
                }
            }
        } else {
            self.visit_children(node);
        }

        self.scopes.pop();
    }

    fn visit_catch(&mut self, node: Node<'_>) {
        self.scopes.push(FrameKind::Block);
        if let Some(param) = node.child_by_field_name("parameter") {
            self.declare_pattern(param, DeclKind::CatchParam);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.scopes.pop();
    }

    fn visit_declaration(&mut self, node: Node<'_>) {
        let kind = if node.kind() == "variable_declaration" {
            DeclKind::Var
        } else {
            match node.child_by_field_name("kind").map(|k| self.text(k)) {
                Some("const") => DeclKind::Const,
                _ => DeclKind::Let,
            }
        };

        let mut cursor = node.walk();
        let declarators: Vec<Node<'_>> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "variable_declarator")
            .collect();
        let single = declarators.len() == 1;

        for declarator in declarators {
            let Some(name) = declarator.child_by_field_name("name") else {
                continue;
            };
            let value = declarator.child_by_field_name("value");

            if name.kind() == "identifier" {
                let removable = single
                    && value.map_or(true, is_literal)
                    && is_statement_position(node);
                let removal = removable.then(|| self.statement_removal(node));
                self.declare(name, kind, removal);
            } else {
                self.declare_pattern(name, kind);
            }

            if let Some(value) = value {
                self.visit(value);
            }
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "import_clause" {
                continue;
            }
            let mut clause_cursor = clause.walk();
            for part in clause.named_children(&mut clause_cursor) {
                match part.kind() {
                    "identifier" => self.declare(part, DeclKind::Import, None),
                    "namespace_import" => {
                        let mut ns_cursor = part.walk();
                        for id in part.named_children(&mut ns_cursor) {
                            if id.kind() == "identifier" {
                                self.declare(id, DeclKind::Import, None);
                            }
                        }
                    }
                    "named_imports" => {
                        let mut spec_cursor = part.walk();
                        for spec in part.named_children(&mut spec_cursor) {
                            let local = spec
                                .child_by_field_name("alias")
                                .or_else(|| spec.child_by_field_name("name"));
                            if let Some(local) = local.filter(|n| n.kind() == "identifier") {
                                self.declare(local, DeclKind::Import, None);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn visit_export(&mut self, node: Node<'_>) {
        // `export { a } from "mod"` names another module's bindings
        let reexport = node.child_by_field_name("source").is_some();

        if let Some(declaration) = node.child_by_field_name("declaration") {
            self.exporting = true;
            self.visit(declaration);
            self.exporting = false;
        }
        if let Some(value) = node.child_by_field_name("value") {
            self.visit(value);
        }

        if reexport {
            return;
        }
        let mut cursor = node.walk();
        for clause in node.named_children(&mut cursor) {
            if clause.kind() != "export_clause" {
                continue;
            }
            let mut spec_cursor = clause.walk();
            for spec in clause.named_children(&mut spec_cursor) {
                if let Some(name) = spec.child_by_field_name("name") {
                    if name.kind() == "identifier" {
                        self.record_use(name, UseRole::Read);
                    }
                }
            }
        }
    }

    fn visit_call(&mut self, node: Node<'_>) {
        let callee = node.child_by_field_name("function");
        match callee {
            Some(callee) if callee.kind() == "identifier" => self.record_use(callee, UseRole::Call),
            Some(callee) => self.visit(callee),
            None => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if Some(child) != callee {
                self.visit(child);
            }
        }
    }

    fn visit_assignment(&mut self, node: Node<'_>) {
        let left = node.child_by_field_name("left");
        match left {
            Some(left) if left.kind() == "identifier" => {
                // `x += 1` reads x as well
                let role = if node.kind() == "augmented_assignment_expression" {
                    UseRole::Read
                } else {
                    UseRole::Write
                };
                self.record_use(left, role);
            }
            Some(left) => self.visit(left),
            None => {}
        }
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
    }

    fn visit_unary(&mut self, node: Node<'_>) {
        let operator = node.child_by_field_name("operator").map(|op| self.text(op));
        match node.child_by_field_name("argument") {
            Some(arg) if operator == Some("typeof") && arg.kind() == "identifier" => {
                self.record_use(arg, UseRole::Probe)
            }
            _ => self.visit_children(node),
        }
    }

    /// Lowercase tag names are intrinsic elements, not bindings
    fn visit_jsx_element(&mut self, node: Node<'_>) {
        let name = node.child_by_field_name("name");
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            let intrinsic = Some(child) == name
                && child.kind() == "identifier"
                && self.text(child).starts_with(|c: char| c.is_ascii_lowercase());
            if !intrinsic {
                self.visit(child);
            }
        }
    }

    fn report_debugger(&mut self, node: Node<'_>) {
        let span = node.byte_range();
        self.errors.push(
            CodeError::error("Unexpected debugger statement", span.start, span.end)
                .with_category(Category::Semantic)
                .with_rule("no-debugger")
                .with_fix(
                    "Remove debugger statement",
                    TextEdit::delete(span.start, span.end),
                ),
        );
    }

    /// Bind every name a binding pattern introduces
    fn declare_pattern(&mut self, node: Node<'_>, kind: DeclKind) {
        match node.kind() {
            "identifier" | "shorthand_property_identifier_pattern" => {
                self.declare(node, kind, None)
            }
            "object_pattern" | "array_pattern" | "rest_pattern" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.declare_pattern(child, kind);
                }
            }
            "pair_pattern" => {
                if let Some(key) = node.child_by_field_name("key") {
                    if key.kind() == "computed_property_name" {
                        self.visit(key);
                    }
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.declare_pattern(value, kind);
                }
            }
            "assignment_pattern" | "object_assignment_pattern" => {
                if let Some(left) = node.child_by_field_name("left") {
                    self.declare_pattern(left, kind);
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.visit(right);
                }
            }
            "undefined" | "ERROR" => {}
            // Member targets in destructuring assignment
            _ => self.visit(node),
        }
    }

    fn declare(&mut self, name_node: Node<'_>, kind: DeclKind, removal: Option<Range<usize>>) {
        let name = self.text(name_node);
        if name.is_empty() {
            return;
        }
        let frame = match kind {
            DeclKind::Var => self.scopes.nearest_function(),
            _ => self.scopes.current(),
        };
        let span = name_node.byte_range();

        let decl = Declaration {
            name: name.to_string(),
            kind,
            span: span.clone(),
            removal,
            exported: self.exporting && frame == ROOT,
            reads: 0,
        };

        let Err(existing) = self.scopes.declare(frame, decl) else {
            return;
        };
        let previous = self.scopes.declaration(existing).kind;

        let error = if previous.is_block_scoped() || kind.is_block_scoped() {
            CodeError::error(
                format!("Cannot redeclare block-scoped variable: {}", name),
                span.start,
                span.end,
            )
        } else {
            CodeError::warning(format!("Duplicate declaration: {}", name), span.start, span.end)
        };
        self.errors.push(
            error
                .with_category(Category::Semantic)
                .with_rule("no-redeclare"),
        );
    }

    fn record_use(&mut self, node: Node<'_>, role: UseRole) {
        let name = self.text(node);
        if name.is_empty() {
            return;
        }
        self.uses.push(Use {
            name: name.to_string(),
            frame: self.scopes.current(),
            span: node.byte_range(),
            role,
        });
    }

    fn resolve_uses(&mut self) {
        for usage in std::mem::take(&mut self.uses) {
            if let Some(id) = self.scopes.lookup(usage.frame, &usage.name) {
                if usage.role != UseRole::Write {
                    self.scopes.declaration_mut(id).reads += 1;
                }
                continue;
            }
            if is_ambient(&usage.name) {
                continue;
            }

            let span = usage.span;
            let error = match usage.role {
                UseRole::Probe => continue,
                UseRole::Call => CodeError::error(
                    format!("Undefined function: {}", usage.name),
                    span.start,
                    span.end,
                )
                .with_rule("no-undef-call"),
                UseRole::Read | UseRole::Write => CodeError::error(
                    format!("Undefined variable: {}", usage.name),
                    span.start,
                    span.end,
                )
                .with_rule("no-undef"),
            };
            self.errors.push(error.with_category(Category::Semantic));
        }
    }

    fn report_unused(&mut self) {
        let unused: Vec<&Declaration> = self
            .scopes
            .declarations()
            .iter()
            .filter(|d| d.kind.reports_unused() && d.reads == 0)
            .filter(|d| !d.exported && !d.name.starts_with('_'))
            .collect();

        for decl in unused {
            let message = if decl.kind == DeclKind::Import {
                format!("Unused import: {}", decl.name)
            } else {
                format!("Unused variable: {}", decl.name)
            };
            let mut error = CodeError::suggestion(message, decl.span.start, decl.span.end)
                .with_category(Category::Style)
                .with_rule("no-unused-vars");
            if let Some(removal) = &decl.removal {
                error = error.with_fix(
                    format!("Remove unused '{}'", decl.name),
                    TextEdit::delete(removal.start, removal.end),
                );
            }
            self.errors.push(error);
        }
    }

    /// The statement's range plus its line break, if the statement ends a line
    fn statement_removal(&self, statement: Node<'_>) -> Range<usize> {
        let range = statement.byte_range();
        let rest = &self.source[range.end.min(self.source.len())..];
        let trailing = if rest.starts_with("\r\n") {
            2
        } else if rest.starts_with('\n') {
            1
        } else {
            0
        };
        range.start..range.end + trailing
    }
}

fn is_literal(node: Node<'_>) -> bool {
    if node.kind() == "template_string" {
        let mut cursor = node.walk();
        let has_substitution = node
            .named_children(&mut cursor)
            .any(|child| child.kind() == "template_substitution");
        return !has_substitution;
    }
    LITERAL_KINDS.contains(&node.kind())
}

fn is_statement_position(node: Node<'_>) -> bool {
    node.parent()
        .is_some_and(|p| matches!(p.kind(), "program" | "statement_block" | "switch_case"))
}
