//! Language Server Protocol shapes
//!
//! Converts check results into the diagnostics and code actions an editor
//! speaking LSP expects. Positions are 0-based with UTF-16 columns.

use crate::diagnostic::{CheckResult, CodeError, Severity};
use crate::position::LineIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// LSP diagnostic severity (protocol numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LspSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl From<Severity> for LspSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => LspSeverity::Error,
            Severity::Warning => LspSeverity::Warning,
            Severity::Suggestion => LspSeverity::Hint,
        }
    }
}

/// LSP position (0-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

/// LSP range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// LSP diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspDiagnostic {
    pub range: Range,
    pub severity: Option<u32>,
    pub code: Option<String>,
    pub source: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// LSP code action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeAction {
    pub title: String,
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Vec<LspDiagnostic>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit: Option<WorkspaceEdit>,
    #[serde(rename = "isPreferred", skip_serializing_if = "Option::is_none")]
    pub is_preferred: Option<bool>,
}

/// LSP workspace edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceEdit {
    pub changes: Option<HashMap<String, Vec<TextEdit>>>,
}

/// LSP text edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub range: Range,
    #[serde(rename = "newText")]
    pub new_text: String,
}

/// Publish diagnostics notification parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishDiagnosticsParams {
    pub uri: String,
    pub diagnostics: Vec<LspDiagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

fn position(index: &LineIndex<'_>, offset: usize) -> Position {
    let (line, character) = index.utf16_position(offset);
    Position {
        line: line as u32,
        character: character as u32,
    }
}

fn range(index: &LineIndex<'_>, from: usize, to: usize) -> Range {
    Range {
        start: position(index, from),
        end: position(index, to),
    }
}

fn to_lsp_diagnostic(index: &LineIndex<'_>, error: &CodeError) -> LspDiagnostic {
    LspDiagnostic {
        range: range(index, error.from, error.to),
        severity: Some(LspSeverity::from(error.severity) as u32),
        code: error.rule_id.clone(),
        source: Some("livecheck".to_string()),
        message: error.message.clone(),
        data: error.has_fix().then(|| {
            serde_json::json!({
                "category": error.category.map(|c| c.as_str()),
                "fixes": error.fixes,
            })
        }),
    }
}

/// Convert a result's diagnostics for the document `source`
pub fn to_lsp_diagnostics(result: &CheckResult, source: &str) -> Vec<LspDiagnostic> {
    let index = LineIndex::new(source);
    result.map(|error| to_lsp_diagnostic(&index, error))
}

/// One quick-fix action per suggested fix; the first one is preferred
pub fn to_code_actions(error: &CodeError, source: &str, uri: &str) -> Vec<CodeAction> {
    let index = LineIndex::new(source);
    let diagnostic = to_lsp_diagnostic(&index, error);

    error
        .fixes
        .iter()
        .enumerate()
        .map(|(i, fix)| {
            let text_edit = TextEdit {
                range: range(&index, fix.edit.from, fix.edit.to),
                new_text: fix.edit.text.clone(),
            };

            let mut changes = HashMap::new();
            changes.insert(uri.to_string(), vec![text_edit]);

            CodeAction {
                title: fix.description.clone(),
                kind: Some("quickfix".to_string()),
                diagnostics: Some(vec![diagnostic.clone()]),
                edit: Some(WorkspaceEdit {
                    changes: Some(changes),
                }),
                is_preferred: Some(i == 0),
            }
        })
        .collect()
}

/// Create publish diagnostics params for one document
pub fn to_publish_diagnostics(
    uri: &str,
    result: &CheckResult,
    source: &str,
    version: Option<i32>,
) -> PublishDiagnosticsParams {
    PublishDiagnosticsParams {
        uri: uri.to_string(),
        diagnostics: to_lsp_diagnostics(result, source),
        version,
    }
}

/// `file://` URI for a path
pub fn file_uri(path: &Path) -> String {
    let absolute = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    format!("file://{}", absolute.display())
}
