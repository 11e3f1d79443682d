//! # acumate native engine
//!
//! Cross-checks screen source files (TypeScript classes) and their markup templates (HTML)
//! against each other and against backend graph metadata.
//!
//! ## Pipeline
//!
//! 1. **Collect**: [`SourceCollector`] turns a source file into [`ClassInfo`]s, following
//!    `extends` across relative imports and flattening inherited members.
//! 2. **Resolve**: [`binding::resolve`] maps a `view.bind` name to a screen property and its view
//!    class through a [`ClassLookup`] built once per pass.
//! 3. **Fetch**: [`MetadataCache`] fronts the host's [`BackendClient`] with a persistent
//!    [`MetadataStore`] and coalesces identical in-flight requests; [`BackendGraph`] normalizes
//!    what comes back.
//! 4. **Validate**: [`MarkupValidator`] walks the template, [`validate_screen_source`] checks the
//!    source against the backend.
//! 5. **Suppress**: [`SuppressionEngine`] drops diagnostics silenced by inline directives.
//!
//! ## Ground Rules
//!
//! 1. **Nothing is fatal**: unreadable or unparsable files produce no classes and no diagnostics;
//!    backend failures surface as `None`.
//! 2. **Binding names are exact**: markup names match source properties case-sensitively; only
//!    backend names are compared case-insensitively.
//! 3. **Single-threaded**: shared state lives in `Rc<RefCell<_>>`; the only suspension points are
//!    backend fetches.

pub mod backend;
pub mod binding;
pub mod bridge;
pub mod collector;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod markup;
pub mod markup_scanner;
pub mod markup_validator;
pub mod metadata_cache;
pub mod model;
pub mod module_resolver;
pub mod normalize;
pub mod screen_validator;
pub mod source_cache;
pub mod source_module;
pub mod store;
pub mod suppression;
pub mod visitor;

#[cfg(test)]
mod validation_tests;

pub use backend::{BackendClient, FeatureModel, GraphModel, GraphStructure, OfflineClient, StaticClient};
pub use binding::{ClassLookup, ViewResolution};
pub use collector::SourceCollector;
pub use config::EngineConfig;
pub use context::ValidationContext;
pub use diagnostics::{Diagnostic, Position, Range, Severity};
pub use error::{BackendError, EngineError};
pub use markup_validator::{validate, validate_with_backend, MarkupValidator};
pub use metadata_cache::MetadataCache;
pub use model::{ClassInfo, DeclaredKind, PropertyInfo, PropertyKind};
pub use normalize::{normalize, BackendGraph};
pub use screen_validator::{validate_screen_source, BackendMetadata};
pub use store::{FileStore, MemoryStore, MetadataStore};
pub use suppression::{Language, SuppressionDirective, SuppressionEngine};

#[cfg(feature = "napi")]
use napi_derive::napi;

#[cfg(feature = "napi")]
#[napi]
pub fn engine_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
