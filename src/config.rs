//! Engine configuration.
//!
//! Loaded from the host's settings as camelCase JSON. Every field has a default, so an empty
//! object (or no file at all) yields the stock screen toolkit conventions.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Read and write backend metadata through the persistent store.
    pub use_cache: bool,
    /// Allow fetching metadata from the backend at all.
    pub use_backend: bool,

    pub screen_base_type: String,
    pub view_base_type: String,

    pub action_type: String,
    pub field_type: String,
    pub view_type: String,
    pub view_collection_type: String,

    pub single_factory: String,
    pub collection_factory: String,

    pub graph_info_decorator: String,
    pub feature_decorator: String,

    pub view_binding_attribute: String,
    pub action_binding_attribute: String,
    pub field_tags: Vec<String>,
    pub field_name_attribute: String,
    pub unbound_attribute: String,

    /// Extensions tried, in order, when resolving a relative import specifier.
    pub source_extensions: Vec<String>,
    pub markup_extensions: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            use_backend: true,
            screen_base_type: "PXScreen".to_string(),
            view_base_type: "PXView".to_string(),
            action_type: "PXActionState".to_string(),
            field_type: "PXFieldState".to_string(),
            view_type: "PXView".to_string(),
            view_collection_type: "PXViewCollection".to_string(),
            single_factory: "createSingle".to_string(),
            collection_factory: "createCollection".to_string(),
            graph_info_decorator: "graphInfo".to_string(),
            feature_decorator: "featureInstalled".to_string(),
            view_binding_attribute: "view.bind".to_string(),
            action_binding_attribute: "state.bind".to_string(),
            field_tags: vec!["field".to_string()],
            field_name_attribute: "name".to_string(),
            unbound_attribute: "unbound".to_string(),
            source_extensions: vec![
                ".ts".to_string(),
                ".tsx".to_string(),
                ".d.ts".to_string(),
                "/index.ts".to_string(),
            ],
            markup_extensions: vec![".html".to_string()],
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a settings file; a missing file yields the defaults.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_json_str(&data)
    }

    pub fn is_field_tag(&self, tag: &str) -> bool {
        self.field_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e == "ts" || e == "tsx")
            .unwrap_or(false)
            && !path.to_string_lossy().ends_with(".d.ts")
    }

    pub fn is_markup_file(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.markup_extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}
