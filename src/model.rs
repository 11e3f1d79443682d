use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::EngineConfig;

/// Byte range into a source or markup text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TextSpan {
    pub start: u32,
    pub end: u32,
}

impl TextSpan {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn from_range(range: std::ops::Range<usize>) -> Self {
        Self {
            start: range.start as u32,
            end: range.end as u32,
        }
    }
}

impl From<oxc_span::Span> for TextSpan {
    fn from(span: oxc_span::Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    Action,
    Field,
    View,
    ViewCollection,
    Unknown,
}

impl PropertyKind {
    pub fn is_view(self) -> bool {
        matches!(self, PropertyKind::View | PropertyKind::ViewCollection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclaredKind {
    Screen,
    View,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub name: String,
    pub kind: PropertyKind,
    pub type_name: Option<String>,
    pub view_class_name: Option<String>,
    /// Span of the member name in `declared_in`.
    pub span: Option<TextSpan>,
    pub declared_in: Option<PathBuf>,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_name: None,
            view_class_name: None,
            span: None,
            declared_in: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassInfo {
    pub class_name: String,
    pub declared_kind: Option<DeclaredKind>,
    pub properties: IndexMap<String, PropertyInfo>,
    pub file_path: PathBuf,
    pub span: Option<TextSpan>,
    pub base_class: Option<String>,
    pub graph_type: Option<String>,
    pub graph_type_span: Option<TextSpan>,
    pub primary_view: Option<String>,
    /// Backend features this class is gated on.
    pub feature_gates: Vec<String>,
}

impl ClassInfo {
    pub fn new(class_name: impl Into<String>, file_path: impl Into<PathBuf>) -> Self {
        Self {
            class_name: class_name.into(),
            declared_kind: None,
            properties: IndexMap::new(),
            file_path: file_path.into(),
            span: None,
            base_class: None,
            graph_type: None,
            graph_type_span: None,
            primary_view: None,
            feature_gates: Vec::new(),
        }
    }

    pub fn is_screen(&self) -> bool {
        self.declared_kind == Some(DeclaredKind::Screen)
    }

    pub fn is_view(&self) -> bool {
        self.declared_kind == Some(DeclaredKind::View)
    }

    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        self.properties.get(name)
    }

    pub fn properties_of_kind(&self, kind: PropertyKind) -> impl Iterator<Item = &PropertyInfo> {
        self.properties.values().filter(move |p| p.kind == kind)
    }
}

/// Shape of a member initializer, as far as kind classification cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitializerShape {
    /// `createSingle(X)` / `createCollection(X)` with a single identifier argument.
    Factory { collection: bool, class_name: String },
    Other,
}

/// Decide a member's kind from its declared type and initializer.
///
/// The declared type name wins; a factory initializer decides when the type is absent or not one
/// of the marker types. Returns the kind together with the nested view class name, if any.
pub fn classify_property(
    config: &EngineConfig,
    type_name: Option<&str>,
    type_argument: Option<&str>,
    initializer: &InitializerShape,
) -> (PropertyKind, Option<String>) {
    let factory_class = match initializer {
        InitializerShape::Factory { class_name, .. } => Some(class_name.clone()),
        InitializerShape::Other => None,
    };

    let from_type = type_name.and_then(|name| {
        if name == config.action_type {
            Some(PropertyKind::Action)
        } else if name == config.field_type {
            Some(PropertyKind::Field)
        } else if name == config.view_type {
            Some(PropertyKind::View)
        } else if name == config.view_collection_type {
            Some(PropertyKind::ViewCollection)
        } else {
            None
        }
    });

    match (from_type, initializer) {
        (Some(kind), _) if kind.is_view() => {
            let view_class = type_argument.map(str::to_string).or(factory_class);
            (kind, view_class)
        }
        (Some(kind), _) => (kind, None),
        (None, InitializerShape::Factory { collection, class_name }) => {
            let kind = if *collection {
                PropertyKind::ViewCollection
            } else {
                PropertyKind::View
            };
            (kind, Some(class_name.clone()))
        }
        (None, InitializerShape::Other) => (PropertyKind::Unknown, None),
    }
}
