//! Validation passes.
//!
//! A [`ValidationContext`] lives for the editor session. It owns the source collector (and its
//! parse cache), the metadata cache and the configuration, and runs one full pass per file:
//! collect classes, drop feature-disabled screens, look up backend metadata, validate, suppress.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::{BackendClient, OfflineClient};
use crate::collector::SourceCollector;
use crate::config::EngineConfig;
use crate::diagnostics::Diagnostic;
use crate::error::{EngineError, EngineResult};
use crate::markup_validator::MarkupValidator;
use crate::metadata_cache::MetadataCache;
use crate::model::ClassInfo;
use crate::module_resolver::normalize_path;
use crate::normalize::{normalize, BackendGraph};
use crate::screen_validator::{validate_screen_source, BackendMetadata};
use crate::store::{MemoryStore, MetadataStore};
use crate::suppression::{Language, SuppressionEngine};

pub struct ValidationContext {
    config: Rc<EngineConfig>,
    collector: SourceCollector,
    metadata: MetadataCache,
}

impl ValidationContext {
    pub fn new(
        config: EngineConfig,
        client: Rc<dyn BackendClient>,
        store: Rc<dyn MetadataStore>,
    ) -> Self {
        let config = Rc::new(config);
        Self {
            collector: SourceCollector::new(Rc::clone(&config)),
            metadata: MetadataCache::new(&config, client, store),
            config,
        }
    }

    /// A context with no backend connection and a session-lifetime store.
    pub fn offline(config: EngineConfig) -> Self {
        Self::new(config, Rc::new(OfflineClient), Rc::new(MemoryStore::new()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn collector(&self) -> &SourceCollector {
        &self.collector
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    /// Forget the cached parse of `path` after the editor reports a change.
    pub fn invalidate(&self, path: &Path) {
        self.collector.cache().invalidate(path);
    }

    /// Source file holding the screen classes for a markup file: same stem, `.ts`.
    pub fn source_for_markup(&self, markup_path: &Path) -> PathBuf {
        markup_path.with_extension("ts")
    }

    pub async fn validate_markup_file(&self, path: &Path, text: Option<&str>) -> Vec<Diagnostic> {
        let text = match read_text(path, text) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "markup file skipped");
                return Vec::new();
            }
        };

        let source_path = self.source_for_markup(path);
        if !source_path.is_file() {
            tracing::debug!(markup = %path.display(), "no screen source next to markup");
            return Vec::new();
        }
        let classes = self.collector.collect_file(&source_path);

        let disabled = self.disabled_classes(&classes).await;
        let source_path = normalize_path(&source_path);
        if all_screens_disabled(&classes, &disabled, Some(source_path.as_path())) {
            tracing::debug!(markup = %path.display(), "every screen is feature-disabled");
            return Vec::new();
        }

        let graph = match classes
            .iter()
            .filter(|c| c.is_screen() && !disabled.contains(&c.class_name))
            .find_map(|c| c.graph_type.as_deref())
        {
            Some(graph_type) => self
                .metadata
                .get_graph_structure(graph_type)
                .await
                .map(|structure| BackendGraph::from_structure(&structure)),
            None => None,
        };

        let diagnostics =
            MarkupValidator::new(&self.config).validate(&text, &classes, graph.as_ref());
        finish(diagnostics, &disabled, &text, path)
    }

    pub async fn validate_source_file(&self, path: &Path, text: Option<&str>) -> Vec<Diagnostic> {
        let text = match read_text(path, text) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "source file skipped");
                return Vec::new();
            }
        };

        let classes = self.collector.collect(&text, path);
        let disabled = self.disabled_classes(&classes).await;
        let normalized = normalize_path(path);
        if all_screens_disabled(&classes, &disabled, Some(normalized.as_path())) {
            return Vec::new();
        }

        let graph_types: Vec<&str> = classes
            .iter()
            .filter(|c| c.is_screen() && c.file_path == normalized)
            .filter(|c| !disabled.contains(&c.class_name))
            .filter_map(|c| c.graph_type.as_deref())
            .collect();
        if graph_types.is_empty() {
            return Vec::new();
        }

        let mut backend = BackendMetadata::new(self.metadata.get_graphs().await);
        for graph_type in graph_types {
            if backend.has_graph(graph_type) == Some(false) {
                continue;
            }
            if let Some(structure) = self.metadata.get_graph_structure(graph_type).await {
                backend.insert_structure(graph_type, BackendGraph::from_structure(&structure));
            }
        }

        // Disabled screens must not claim view fields shared with enabled ones.
        let enabled: Vec<ClassInfo> = classes
            .into_iter()
            .filter(|c| !disabled.contains(&c.class_name))
            .collect();
        let diagnostics = validate_screen_source(&enabled, path, &text, &backend);
        finish(diagnostics, &disabled, &text, path)
    }

    /// Classes gated on a feature the backend reports as disabled. Unknown features count as
    /// enabled.
    async fn disabled_classes(&self, classes: &[ClassInfo]) -> HashSet<String> {
        if classes.iter().all(|c| c.feature_gates.is_empty()) {
            return HashSet::new();
        }
        let Some(features) = self.metadata.get_features().await else {
            return HashSet::new();
        };
        let disabled_features: HashSet<String> = features
            .iter()
            .filter(|f| !f.enabled)
            .filter_map(|f| normalize(&f.feature_name))
            .collect();

        classes
            .iter()
            .filter(|c| {
                c.feature_gates
                    .iter()
                    .filter_map(|gate| normalize(gate))
                    .any(|gate| disabled_features.contains(&gate))
            })
            .map(|c| c.class_name.clone())
            .collect()
    }
}

fn read_text(path: &Path, text: Option<&str>) -> EngineResult<String> {
    match text {
        Some(text) => Ok(text.to_string()),
        None => fs::read_to_string(path).map_err(|e| EngineError::io(path, e)),
    }
}

/// True when there is at least one screen (declared in `file`, if given) and all are disabled.
fn all_screens_disabled(
    classes: &[ClassInfo],
    disabled: &HashSet<String>,
    file: Option<&Path>,
) -> bool {
    let mut screens = classes
        .iter()
        .filter(|c| c.is_screen())
        .filter(|c| file.map_or(true, |f| c.file_path == f))
        .peekable();
    screens.peek().is_some() && screens.all(|c| disabled.contains(&c.class_name))
}

fn finish(
    diagnostics: Vec<Diagnostic>,
    disabled: &HashSet<String>,
    text: &str,
    path: &Path,
) -> Vec<Diagnostic> {
    let diagnostics: Vec<Diagnostic> = diagnostics
        .into_iter()
        .filter(|d| !disabled.iter().any(|class_name| d.concerns(class_name)))
        .map(|d| d.with_file(path))
        .collect();
    SuppressionEngine::build(text, Language::from_path(path)).filter(diagnostics)
}
