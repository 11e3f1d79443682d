//! Markup Validator
//!
//! Walks a parsed template and checks every binding against the screen classes collected from the
//! template's source file:
//!
//! - `view.bind` must name a view (or view collection) property of a screen, and that property's
//!   class must be declared as a view.
//! - `field` elements are checked against the view bound by the nearest `view.bind` ancestor, or
//!   against the view named by a `View.Field` prefix.
//! - `state.bind` must name an action property of a screen.
//!
//! With backend metadata for the screen's graph, fields present in source but missing from the
//! backend view are reported as warnings.

use crate::binding::{resolve, resolve_action, screen_classes, ClassLookup, ViewResolution};
use crate::config::EngineConfig;
use crate::diagnostics::{
    Diagnostic, Range, ACTION_NOT_FOUND, BACKEND_FIELD_MISSING, FIELD_NOT_FOUND,
    FIELD_PARENT_VIEW_MISSING, VIEW_KIND_MISMATCH, VIEW_NOT_FOUND,
};
use crate::markup::{parse_markup, MarkupDocument, MarkupElement};
use crate::markup_scanner::LineIndex;
use crate::model::ClassInfo;
use crate::normalize::BackendGraph;
use crate::visitor::{walk_element, MarkupVisitor};

/// Validate `markup_text` against `classes` with the stock configuration.
pub fn validate(markup_text: &str, classes: &[ClassInfo]) -> Vec<Diagnostic> {
    MarkupValidator::new(&EngineConfig::default()).validate(markup_text, classes, None)
}

/// Like [`validate`], also checking fields against normalized backend metadata for the graph.
pub fn validate_with_backend(
    markup_text: &str,
    classes: &[ClassInfo],
    backend: Option<&BackendGraph>,
) -> Vec<Diagnostic> {
    MarkupValidator::new(&EngineConfig::default()).validate(markup_text, classes, backend)
}

pub struct MarkupValidator<'c> {
    config: &'c EngineConfig,
}

impl<'c> MarkupValidator<'c> {
    pub fn new(config: &'c EngineConfig) -> Self {
        Self { config }
    }

    pub fn validate(
        &self,
        markup_text: &str,
        classes: &[ClassInfo],
        backend: Option<&BackendGraph>,
    ) -> Vec<Diagnostic> {
        match parse_markup(markup_text) {
            Ok(document) => self.validate_document(&document, markup_text, classes, backend),
            Err(e) => {
                tracing::warn!(error = %e, "markup could not be parsed");
                Vec::new()
            }
        }
    }

    pub fn validate_document(
        &self,
        document: &MarkupDocument,
        markup_text: &str,
        classes: &[ClassInfo],
        backend: Option<&BackendGraph>,
    ) -> Vec<Diagnostic> {
        let mut visitor = BindingVisitor {
            config: self.config,
            screens: screen_classes(classes),
            lookup: ClassLookup::new(classes),
            backend,
            lines: LineIndex::new(markup_text),
            scopes: Vec::new(),
            diagnostics: Vec::new(),
        };
        visitor.visit_document(document);
        tracing::debug!(
            screens = visitor.screens.len(),
            diagnostics = visitor.diagnostics.len(),
            "markup validated"
        );
        visitor.diagnostics
    }
}

/// The view binding in effect for an element's descendants.
enum ViewScope<'a> {
    Resolved {
        binding: String,
        resolution: ViewResolution<'a>,
    },
    Unresolved {
        binding: String,
    },
}

struct BindingVisitor<'a> {
    config: &'a EngineConfig,
    screens: Vec<&'a ClassInfo>,
    lookup: ClassLookup<'a>,
    backend: Option<&'a BackendGraph>,
    lines: LineIndex<'a>,
    scopes: Vec<ViewScope<'a>>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> BindingVisitor<'a> {
    fn range(&self, element: &MarkupElement, attribute: &str) -> Range {
        element
            .span_for(attribute)
            .map(|span| self.lines.range(span))
            .unwrap_or_default()
    }

    fn check_view_binding(&mut self, element: &MarkupElement, binding: &str) -> ViewScope<'a> {
        let config = self.config;
        let attribute = config.view_binding_attribute.as_str();
        let Some(resolution) = resolve(binding, &self.screens, &self.lookup) else {
            // No screen owns an unresolved binding, so nothing attributes it to one.
            let range = self.range(element, attribute);
            self.diagnostics.push(Diagnostic::error(
                VIEW_NOT_FOUND,
                range,
                format!("View \"{}\" is not declared on the screen", binding),
            ));
            return ViewScope::Unresolved {
                binding: binding.to_string(),
            };
        };

        if let Some(view_class) = resolution.view_class {
            if !view_class.is_view() {
                let range = self.range(element, attribute);
                self.diagnostics.push(
                    Diagnostic::error(
                        VIEW_KIND_MISMATCH,
                        range,
                        format!(
                            "View \"{}\" is bound to class \"{}\", which is not a view",
                            binding, view_class.class_name
                        ),
                    )
                    .with_related_class(view_class.class_name.clone())
                    .with_screen(resolution.screen.class_name.clone()),
                );
            }
        }

        ViewScope::Resolved {
            binding: binding.to_string(),
            resolution,
        }
    }

    fn check_field(&mut self, element: &MarkupElement) {
        if element.has_attribute(&self.config.unbound_attribute) {
            return;
        }
        let name_attribute = self.config.field_name_attribute.clone();
        let Some(raw_name) = element.attribute_value(&name_attribute) else {
            return;
        };
        let raw_name = raw_name.trim();
        if raw_name.is_empty() {
            return;
        }

        // `View.Field` names its view explicitly.
        let qualified = raw_name
            .split_once('.')
            .map(|(view, field)| (view.to_string(), field.to_string()));
        let range = self.range(element, &name_attribute);

        let enclosing = self.scopes.last().map(|scope| match scope {
            ViewScope::Resolved {
                binding,
                resolution,
            } => (binding.clone(), Some(*resolution)),
            ViewScope::Unresolved { binding } => (binding.clone(), None),
        });

        let (binding, resolution, field_name) = match (qualified, enclosing) {
            (Some((view, field)), _) => {
                let resolution = resolve(&view, &self.screens, &self.lookup);
                (view, resolution, field)
            }
            (None, Some((binding, resolution))) => (binding, resolution, raw_name.to_string()),
            (None, None) => {
                self.diagnostics.push(Diagnostic::error(
                    FIELD_PARENT_VIEW_MISSING,
                    range,
                    format!("Field \"{}\" is not inside an element with view.bind", raw_name),
                ));
                return;
            }
        };

        let Some(resolution) = resolution else {
            self.diagnostics.push(Diagnostic::error(
                FIELD_PARENT_VIEW_MISSING,
                range,
                format!(
                    "Field \"{}\" belongs to view \"{}\", which is not declared on the screen",
                    field_name, binding
                ),
            ));
            return;
        };

        // Unresolvable view classes come from modules the collector does not follow.
        let Some(view_class) = resolution.view_class else {
            return;
        };

        let screen = resolution.screen.class_name.clone();
        if resolution.field(&field_name).is_none() {
            self.diagnostics.push(
                Diagnostic::error(
                    FIELD_NOT_FOUND,
                    range,
                    format!(
                        "Field \"{}\" is not declared on view \"{}\" ({})",
                        field_name, binding, view_class.class_name
                    ),
                )
                .with_related_class(view_class.class_name.clone())
                .with_screen(screen),
            );
            return;
        }

        if let Some(backend_view) = self.backend.and_then(|g| g.views.get(&binding)) {
            if !backend_view.fields.contains(&field_name) {
                self.diagnostics.push(
                    Diagnostic::warning(
                        BACKEND_FIELD_MISSING,
                        range,
                        format!(
                            "Field \"{}\" is missing from backend view \"{}\"",
                            field_name, backend_view.canonical_name
                        ),
                    )
                    .with_related_class(view_class.class_name.clone())
                    .with_screen(screen),
                );
            }
        }
    }

    fn check_action(&mut self, element: &MarkupElement, action: &str) {
        if resolve_action(action, &self.screens).is_some() {
            return;
        }
        let range = self.range(element, &self.config.action_binding_attribute);
        self.diagnostics.push(Diagnostic::error(
            ACTION_NOT_FOUND,
            range,
            format!("Action \"{}\" is not declared on the screen", action),
        ));
    }
}

impl<'a> MarkupVisitor for BindingVisitor<'a> {
    fn visit_element(&mut self, element: &MarkupElement) {
        if let Some(action) = element
            .attribute_value(&self.config.action_binding_attribute)
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            self.check_action(element, action);
        }

        if self.config.is_field_tag(&element.tag) {
            self.check_field(element);
        }

        let binding = element
            .attribute_value(&self.config.view_binding_attribute)
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);

        match binding {
            Some(binding) => {
                let scope = self.check_view_binding(element, &binding);
                self.scopes.push(scope);
                walk_element(self, element);
                self.scopes.pop();
            }
            None => walk_element(self, element),
        }
    }
}
