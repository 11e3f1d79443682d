//! Backend metadata shapes and the client contract.
//!
//! The transport (HTTP, authentication) lives in the host; the engine only sees these
//! deserialized shapes through [`BackendClient`].

use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::BackendResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphModel {
    pub name: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureModel {
    pub feature_name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Raw structure of one graph: its views (each with fields) and actions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStructure {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub views: IndexMap<String, RawView>,
    #[serde(default)]
    pub actions: Vec<RawAction>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawView {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: IndexMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Metadata service consumed by the cache layer.
///
/// Each call returns a boxed local future so one fetch can be shared by every waiter. `Ok(None)`
/// means the backend answered but had nothing for the request.
pub trait BackendClient {
    fn get_graphs(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<GraphModel>>>>;

    fn get_graph_structure(
        &self,
        graph_name: &str,
    ) -> LocalBoxFuture<'static, BackendResult<Option<GraphStructure>>>;

    fn get_features(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<FeatureModel>>>>;
}

/// Client for sessions without a backend connection: every request answers "nothing".
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl BackendClient for OfflineClient {
    fn get_graphs(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<GraphModel>>>> {
        Box::pin(async { Ok(None) })
    }

    fn get_graph_structure(
        &self,
        _graph_name: &str,
    ) -> LocalBoxFuture<'static, BackendResult<Option<GraphStructure>>> {
        Box::pin(async { Ok(None) })
    }

    fn get_features(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<FeatureModel>>>> {
        Box::pin(async { Ok(None) })
    }
}

/// Client answering from a snapshot the host fetched itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticClient {
    pub graphs: Option<Vec<GraphModel>>,
    /// Structures keyed by graph name.
    pub structures: IndexMap<String, GraphStructure>,
    pub features: Option<Vec<FeatureModel>>,
}

impl StaticClient {
    fn structure(&self, graph_name: &str) -> Option<GraphStructure> {
        self.structures
            .get(graph_name)
            .or_else(|| {
                self.structures
                    .iter()
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case(graph_name.trim()))
                    .map(|(_, structure)| structure)
            })
            .cloned()
    }
}

impl BackendClient for StaticClient {
    fn get_graphs(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<GraphModel>>>> {
        let graphs = self.graphs.clone();
        Box::pin(async move { Ok(graphs) })
    }

    fn get_graph_structure(
        &self,
        graph_name: &str,
    ) -> LocalBoxFuture<'static, BackendResult<Option<GraphStructure>>> {
        let structure = self.structure(graph_name);
        Box::pin(async move { Ok(structure) })
    }

    fn get_features(&self) -> LocalBoxFuture<'static, BackendResult<Option<Vec<FeatureModel>>>> {
        let features = self.features.clone();
        Box::pin(async move { Ok(features) })
    }
}
