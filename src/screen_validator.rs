//! Screen Source Validator
//!
//! Checks the screens declared in one source file against backend metadata: the `graphType` must
//! name a known graph, and the views, actions and view fields declared in the file must exist in
//! that graph's structure. Members inherited from other files are reported where they are
//! declared, not here.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use crate::backend::GraphModel;
use crate::binding::ClassLookup;
use crate::diagnostics::{
    Diagnostic, BACKEND_ACTION_MISSING, BACKEND_FIELD_MISSING, BACKEND_VIEW_MISSING,
    GRAPH_TYPE_NOT_FOUND,
};
use crate::markup_scanner::LineIndex;
use crate::model::{ClassInfo, PropertyKind, TextSpan};
use crate::module_resolver::normalize_path;
use crate::normalize::{normalize, BackendGraph};

/// Backend metadata available to one validation pass.
#[derive(Debug, Clone, Default)]
pub struct BackendMetadata {
    /// Known graphs; `None` when the graph list could not be fetched.
    pub graphs: Option<Rc<Vec<GraphModel>>>,
    structures: HashMap<String, BackendGraph>,
}

impl BackendMetadata {
    pub fn new(graphs: Option<Rc<Vec<GraphModel>>>) -> Self {
        Self {
            graphs,
            structures: HashMap::new(),
        }
    }

    pub fn insert_structure(&mut self, graph_type: &str, graph: BackendGraph) {
        if let Some(key) = normalize(graph_type) {
            self.structures.insert(key, graph);
        }
    }

    pub fn structure(&self, graph_type: &str) -> Option<&BackendGraph> {
        self.structures.get(&normalize(graph_type)?)
    }

    /// `Some(false)` only when the graph list is known and lacks `graph_type`.
    pub fn has_graph(&self, graph_type: &str) -> Option<bool> {
        let graphs = self.graphs.as_ref()?;
        let key = normalize(graph_type)?;
        Some(
            graphs
                .iter()
                .any(|g| normalize(&g.name).as_deref() == Some(key.as_str())),
        )
    }
}

pub fn validate_screen_source(
    classes: &[ClassInfo],
    file_path: &Path,
    source_text: &str,
    backend: &BackendMetadata,
) -> Vec<Diagnostic> {
    let file_path = normalize_path(file_path);
    let lines = LineIndex::new(source_text);
    let lookup = ClassLookup::new(classes);
    let declared_here = |declared_in: Option<&Path>| declared_in == Some(file_path.as_path());
    let range = |span: Option<TextSpan>| span.map(|s| lines.range(s)).unwrap_or_default();

    let mut diagnostics = Vec::new();
    let mut reported_fields = HashSet::new();

    for screen in classes
        .iter()
        .filter(|c| c.is_screen() && c.file_path == file_path)
    {
        let Some(graph_type) = screen.graph_type.as_deref() else {
            continue;
        };

        if backend.has_graph(graph_type) == Some(false) {
            diagnostics.push(
                Diagnostic::error(
                    GRAPH_TYPE_NOT_FOUND,
                    range(screen.graph_type_span.or(screen.span)),
                    format!("Graph \"{}\" is not known to the backend", graph_type),
                )
                .with_related_class(screen.class_name.clone())
                .with_screen(screen.class_name.clone()),
            );
            continue;
        }

        let Some(graph) = backend.structure(graph_type) else {
            continue;
        };

        for property in screen.properties.values() {
            if !declared_here(property.declared_in.as_deref()) {
                continue;
            }
            match property.kind {
                PropertyKind::Action if !graph.has_action(&property.name) => {
                    diagnostics.push(
                        Diagnostic::warning(
                            BACKEND_ACTION_MISSING,
                            range(property.span),
                            format!(
                                "Action \"{}\" is not part of graph \"{}\"",
                                property.name, graph_type
                            ),
                        )
                        .with_related_class(screen.class_name.clone())
                        .with_screen(screen.class_name.clone()),
                    );
                }
                PropertyKind::View | PropertyKind::ViewCollection => {
                    let Some(backend_view) = graph.views.get(&property.name) else {
                        diagnostics.push(
                            Diagnostic::warning(
                                BACKEND_VIEW_MISSING,
                                range(property.span),
                                format!(
                                    "View \"{}\" is not part of graph \"{}\"",
                                    property.name, graph_type
                                ),
                            )
                            .with_related_class(screen.class_name.clone())
                            .with_screen(screen.class_name.clone()),
                        );
                        continue;
                    };

                    let Some(view_class) = property
                        .view_class_name
                        .as_deref()
                        .and_then(|name| lookup.get(name))
                    else {
                        continue;
                    };
                    for field in view_class.properties_of_kind(PropertyKind::Field) {
                        if !declared_here(field.declared_in.as_deref())
                            || backend_view.fields.contains(&field.name)
                            || !reported_fields.insert((view_class.class_name.as_str(), field.name.as_str()))
                        {
                            continue;
                        }
                        diagnostics.push(
                            Diagnostic::warning(
                                BACKEND_FIELD_MISSING,
                                range(field.span),
                                format!(
                                    "Field \"{}\" is missing from backend view \"{}\"",
                                    field.name, backend_view.canonical_name
                                ),
                            )
                            .with_related_class(view_class.class_name.clone())
                            .with_screen(screen.class_name.clone()),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SourceCollector;
    use crate::config::EngineConfig;

    const SOURCE: &str = r#"@graphInfo({ graphType: "PX.Objects.SO.SOOrderEntry", primaryView: "Document" })
export class SO301000 extends PXScreen {
    Save: PXActionState;
    Release: PXActionState;
    Document = createSingle(SOOrder);
    Ghost = createCollection(SOLine);
}

export class SOOrder extends PXView {
    OrderNbr: PXFieldState;
    Legacy: PXFieldState;
}
"#;

    fn classes() -> Vec<ClassInfo> {
        SourceCollector::new(Rc::new(EngineConfig::default()))
            .collect(SOURCE, Path::new("/virtual/SO301000.ts"))
    }

    fn graphs(names: &[&str]) -> Option<Rc<Vec<GraphModel>>> {
        Some(Rc::new(
            names
                .iter()
                .map(|n| GraphModel {
                    name: n.to_string(),
                    text: None,
                })
                .collect(),
        ))
    }

    #[test]
    fn test_unknown_graph_type() {
        let backend = BackendMetadata::new(graphs(&["PX.Objects.AR.CustomerMaint"]));
        let diagnostics =
            validate_screen_source(&classes(), Path::new("/virtual/SO301000.ts"), SOURCE, &backend);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, GRAPH_TYPE_NOT_FOUND);
        assert_eq!(diagnostics[0].range.start.line, 0);
        assert_eq!(diagnostics[0].related_class.as_deref(), Some("SO301000"));
    }

    #[test]
    fn test_no_backend_no_diagnostics() {
        let diagnostics = validate_screen_source(
            &classes(),
            Path::new("/virtual/SO301000.ts"),
            SOURCE,
            &BackendMetadata::default(),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_structure_mismatches() {
        let structure = serde_json::from_value(serde_json::json!({
            "views": {
                "document": { "name": "Document", "fields": { "OrderNbr": {} } }
            },
            "actions": [{ "name": "save" }]
        }))
        .unwrap();
        let mut backend = BackendMetadata::new(graphs(&["px.objects.so.soorderentry"]));
        backend.insert_structure("PX.Objects.SO.SOOrderEntry", BackendGraph::from_structure(&structure));

        let diagnostics =
            validate_screen_source(&classes(), Path::new("/virtual/SO301000.ts"), SOURCE, &backend);
        let found: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.code.as_str(), d.range.start.line))
            .collect();
        assert_eq!(
            found,
            vec![
                (BACKEND_ACTION_MISSING, 3),
                (BACKEND_FIELD_MISSING, 10),
                (BACKEND_VIEW_MISSING, 5),
            ]
        );
    }
}
