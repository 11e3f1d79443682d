use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const DIAGNOSTIC_SOURCE: &str = "acumate";

pub const VIEW_NOT_FOUND: &str = "view-not-found";
pub const VIEW_KIND_MISMATCH: &str = "view-kind-mismatch";
pub const FIELD_PARENT_VIEW_MISSING: &str = "field-parent-view-missing";
pub const FIELD_NOT_FOUND: &str = "field-not-found";
pub const ACTION_NOT_FOUND: &str = "action-not-found";
pub const BACKEND_FIELD_MISSING: &str = "backend-field-missing";
pub const GRAPH_TYPE_NOT_FOUND: &str = "graph-type-not-found";
pub const BACKEND_VIEW_MISSING: &str = "backend-view-missing";
pub const BACKEND_ACTION_MISSING: &str = "backend-action-missing";

pub const ALL_CODES: &[&str] = &[
    VIEW_NOT_FOUND,
    VIEW_KIND_MISMATCH,
    FIELD_PARENT_VIEW_MISSING,
    FIELD_NOT_FOUND,
    ACTION_NOT_FOUND,
    BACKEND_FIELD_MISSING,
    GRAPH_TYPE_NOT_FOUND,
    BACKEND_VIEW_MISSING,
    BACKEND_ACTION_MISSING,
];

/// One-line description of a diagnostic code, for hover text and code actions.
pub fn describe(code: &str) -> &'static str {
    match code {
        VIEW_NOT_FOUND => "view.bind names a property that is not a view on any screen class.",
        VIEW_KIND_MISMATCH => "view.bind resolves to a class that is not declared as a view.",
        FIELD_PARENT_VIEW_MISSING => "A field element is not inside a resolvable view.bind container.",
        FIELD_NOT_FOUND => "A field element names a member that is not a field of its view class.",
        ACTION_NOT_FOUND => "state.bind names a property that is not an action on any screen class.",
        BACKEND_FIELD_MISSING => "The field exists in source but not in the backend view.",
        GRAPH_TYPE_NOT_FOUND => "graphType does not name a graph known to the backend.",
        BACKEND_VIEW_MISSING => "The view is not part of the backend graph structure.",
        BACKEND_ACTION_MISSING => "The action is not part of the backend graph structure.",
        _ => "Unknown diagnostic.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

/// Zero-based line and UTF-16 character offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub range: Range,
    pub message: String,
    pub severity: Severity,
    pub source: String,
    pub code: String,
    /// Class the offending identifier was looked up in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_class: Option<String>,
    /// Screen whose binding produced the diagnostic, when one owns it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Diagnostic {
    pub fn new(code: &str, severity: Severity, range: Range, message: impl Into<String>) -> Self {
        Self {
            range,
            message: message.into(),
            severity,
            source: DIAGNOSTIC_SOURCE.to_string(),
            code: code.to_string(),
            related_class: None,
            screen: None,
            file: None,
        }
    }

    pub fn error(code: &str, range: Range, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, range, message)
    }

    pub fn warning(code: &str, range: Range, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, range, message)
    }

    pub fn with_related_class(mut self, class_name: impl Into<String>) -> Self {
        self.related_class = Some(class_name.into());
        self
    }

    pub fn with_screen(mut self, screen: impl Into<String>) -> Self {
        self.screen = Some(screen.into());
        self
    }

    /// True when the diagnostic names `class_name` as its related class or its screen.
    pub fn concerns(&self, class_name: &str) -> bool {
        self.related_class.as_deref() == Some(class_name) || self.screen.as_deref() == Some(class_name)
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}
