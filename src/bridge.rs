//! JSON surface for the editor host.
//!
//! The host owns the HTTP transport: it hands the engine a metadata snapshot (graphs, graph
//! structures, features) as JSON and receives diagnostics back as JSON. The N-API exports at the
//! bottom are thin wrappers over the functions here and keep one session per JS thread.

use serde_json::Value;
use std::path::Path;
use std::rc::Rc;

use crate::backend::{BackendClient, OfflineClient, StaticClient};
use crate::config::EngineConfig;
use crate::context::ValidationContext;
use crate::error::EngineResult;
use crate::store::{FileStore, MemoryStore, MetadataStore};
use crate::suppression::{directive_text, DirectiveKind, Language};

/// Build a session context from host-supplied JSON.
///
/// `config_json` is an [`EngineConfig`] object; `metadata_json` a [`StaticClient`] snapshot
/// (absent means offline). With `cache_dir`, fetched metadata persists across sessions.
pub fn session_from_json(
    config_json: Option<&str>,
    metadata_json: Option<&str>,
    cache_dir: Option<&Path>,
) -> EngineResult<ValidationContext> {
    let config = match config_json {
        Some(json) => EngineConfig::from_json_str(json)?,
        None => EngineConfig::default(),
    };
    let client: Rc<dyn BackendClient> = match metadata_json {
        Some(json) => Rc::new(serde_json::from_str::<StaticClient>(json)?),
        None => Rc::new(OfflineClient),
    };
    let store: Rc<dyn MetadataStore> = match cache_dir {
        Some(dir) => Rc::new(FileStore::new(dir)),
        None => Rc::new(MemoryStore::new()),
    };
    Ok(ValidationContext::new(config, client, store))
}

pub fn validate_markup_json(context: &ValidationContext, path: &Path, text: Option<&str>) -> Value {
    let diagnostics = futures::executor::block_on(context.validate_markup_file(path, text));
    serde_json::to_value(diagnostics).unwrap_or(Value::Null)
}

pub fn validate_source_json(context: &ValidationContext, path: &Path, text: Option<&str>) -> Value {
    let diagnostics = futures::executor::block_on(context.validate_source_file(path, text));
    serde_json::to_value(diagnostics).unwrap_or(Value::Null)
}

pub fn validate_workspace_json(context: &ValidationContext, root: &Path) -> Value {
    let reports = futures::executor::block_on(crate::discovery::validate_workspace(context, root));
    serde_json::to_value(reports).unwrap_or(Value::Null)
}

pub fn collect_classes_json(context: &ValidationContext, path: &Path, text: &str) -> Value {
    let classes = context.collector().collect(text, path);
    serde_json::to_value(classes).unwrap_or(Value::Null)
}

/// Directive text for a quick fix; `language` is `"markup"` or `"code"`, `kind` is
/// `"next-line"` or `"file"`.
pub fn suppression_directive(language: &str, kind: &str, codes: &[&str]) -> Option<String> {
    let language = match language {
        "markup" | "html" => Language::Markup,
        "code" | "typescript" | "ts" => Language::Code,
        _ => return None,
    };
    let kind = match kind {
        "next-line" => DirectiveKind::NextLine,
        "file" => DirectiveKind::File,
        _ => return None,
    };
    Some(directive_text(language, kind, codes))
}

#[cfg(feature = "napi")]
mod exports {
    use napi_derive::napi;
    use serde_json::Value;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use crate::context::ValidationContext;

    thread_local! {
        static SESSION: RefCell<Option<ValidationContext>> = const { RefCell::new(None) };
    }

    fn with_session<R>(f: impl FnOnce(&ValidationContext) -> R) -> napi::Result<R> {
        SESSION.with(|session| match session.borrow().as_ref() {
            Some(context) => Ok(f(context)),
            None => Err(napi::Error::from_reason("acumate session not initialized")),
        })
    }

    #[napi]
    pub fn init_session(
        config_json: Option<String>,
        metadata_json: Option<String>,
        cache_dir: Option<String>,
    ) -> napi::Result<()> {
        crate::logging::init_logging();
        let context = super::session_from_json(
            config_json.as_deref(),
            metadata_json.as_deref(),
            cache_dir.as_deref().map(Path::new),
        )
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
        SESSION.with(|session| *session.borrow_mut() = Some(context));
        Ok(())
    }

    #[napi]
    pub fn validate_markup_native(path: String, text: Option<String>) -> napi::Result<Value> {
        with_session(|context| {
            super::validate_markup_json(context, &PathBuf::from(path), text.as_deref())
        })
    }

    #[napi]
    pub fn validate_source_native(path: String, text: Option<String>) -> napi::Result<Value> {
        with_session(|context| {
            super::validate_source_json(context, &PathBuf::from(path), text.as_deref())
        })
    }

    #[napi]
    pub fn validate_workspace_native(root: String) -> napi::Result<Value> {
        with_session(|context| super::validate_workspace_json(context, Path::new(&root)))
    }

    #[napi]
    pub fn collect_classes_native(path: String, text: String) -> napi::Result<Value> {
        with_session(|context| super::collect_classes_json(context, Path::new(&path), &text))
    }

    #[napi]
    pub fn invalidate_native(path: String) -> napi::Result<()> {
        with_session(|context| context.invalidate(Path::new(&path)))
    }

    #[napi]
    pub fn clear_metadata_native(graph_names: Vec<String>) -> napi::Result<()> {
        with_session(|context| {
            let names: Vec<&str> = graph_names.iter().map(String::as_str).collect();
            context.metadata().clear(&names);
        })
    }

    #[napi]
    pub fn suppression_directive_native(
        language: String,
        kind: String,
        codes: Vec<String>,
    ) -> Option<String> {
        let codes: Vec<&str> = codes.iter().map(String::as_str).collect();
        super::suppression_directive(&language, &kind, &codes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_from_json() {
        let context = session_from_json(
            Some(r#"{ "useBackend": false }"#),
            Some(r#"{ "graphs": [{ "name": "PX.Objects.SO.SOOrderEntry" }] }"#),
            None,
        )
        .unwrap();
        assert!(!context.config().use_backend);
        assert!(session_from_json(Some("{ nope"), None, None).is_err());
    }

    #[test]
    fn test_collect_classes_json() {
        let context = session_from_json(None, None, None).unwrap();
        let json = collect_classes_json(
            &context,
            Path::new("/virtual/SO301000.ts"),
            "export class SO301000 extends PXScreen { Save: PXActionState; }",
        );
        assert_eq!(json[0]["className"], "SO301000");
        assert_eq!(json[0]["declaredKind"], "Screen");
        assert_eq!(json[0]["properties"]["Save"]["kind"], "action");
    }

    #[test]
    fn test_suppression_directive() {
        assert_eq!(
            suppression_directive("markup", "file", &["all"]).as_deref(),
            Some("<!-- acumate-disable-file all -->")
        );
        assert!(suppression_directive("markdown", "file", &["all"]).is_none());
    }
}
