//! Source Property Collector
//!
//! Turns screen source files into [`ClassInfo`]s. Each class gets its own members plus every
//! member inherited through `extends`, where the base class may live in the same file or in a
//! module reached through relative imports (named, default, renamed, or barrel re-exports).
//!
//! ## Invariants
//!
//! 1. **Most-derived wins**: a member redeclared by a subclass replaces the inherited one.
//! 2. **Cycle safety**: a `(file, class)` pair already on the current heritage chain is skipped,
//!    keeping whatever was collected before the cycle was hit.
//! 3. **One parse per file per request**: the import-graph walk tracks visited files.
//! 4. **Bad input is empty input**: unreadable or unparsable files contribute no classes.

use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::module_resolver::{normalize_path, ModuleResolver};
use crate::model::{
    classify_property, ClassInfo, DeclaredKind, InitializerShape, PropertyInfo,
};
use crate::source_cache::SourceCache;
use crate::source_module::{RawClass, RawMember, ReExport, SourceModule};

/// Where a class declaration lives.
struct ClassLocation {
    path: PathBuf,
    module: Rc<SourceModule>,
    index: usize,
}

impl ClassLocation {
    fn class(&self) -> &RawClass {
        &self.module.classes[self.index]
    }
}

struct MergedClass {
    properties: IndexMap<String, PropertyInfo>,
    declared_kind: Option<DeclaredKind>,
}

pub struct SourceCollector {
    config: Rc<EngineConfig>,
    cache: SourceCache,
    resolver: ModuleResolver,
}

impl SourceCollector {
    pub fn new(config: Rc<EngineConfig>) -> Self {
        let resolver = ModuleResolver::new(config.source_extensions.clone());
        Self {
            config,
            cache: SourceCache::new(),
            resolver,
        }
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    /// Collect every class reachable from `file_path`, whose current text is `file_content`.
    pub fn collect(&self, file_content: &str, file_path: &Path) -> Vec<ClassInfo> {
        let path = normalize_path(file_path);
        match self.cache.load_text(&path, file_content) {
            Ok(module) => self.collect_reachable(path, module),
            Err(e) => {
                tracing::debug!(error = %e, "source file contributes no classes");
                Vec::new()
            }
        }
    }

    /// Same as [`collect`](Self::collect) but reads the file from disk.
    pub fn collect_file(&self, file_path: &Path) -> Vec<ClassInfo> {
        let path = normalize_path(file_path);
        match self.cache.load(&path) {
            Ok(module) => self.collect_reachable(path, module),
            Err(e) => {
                tracing::debug!(error = %e, "source file contributes no classes");
                Vec::new()
            }
        }
    }

    fn collect_reachable(&self, root: PathBuf, root_module: Rc<SourceModule>) -> Vec<ClassInfo> {
        let mut classes = Vec::new();
        let mut visited_files = HashSet::new();
        let mut queue = VecDeque::new();

        visited_files.insert(root.clone());
        queue.push_back((root, root_module));

        while let Some((path, module)) = queue.pop_front() {
            for index in 0..module.classes.len() {
                let location = ClassLocation {
                    path: path.clone(),
                    module: Rc::clone(&module),
                    index,
                };
                classes.push(self.build_class_info(&location));
            }

            for specifier in module.dependencies() {
                let Some(dependency) = self.resolver.resolve(&path, specifier) else {
                    continue;
                };
                if !visited_files.insert(dependency.clone()) {
                    continue;
                }
                match self.cache.load(&dependency) {
                    Ok(dep_module) => queue.push_back((dependency, dep_module)),
                    Err(e) => tracing::debug!(error = %e, "skipping imported module"),
                }
            }
        }

        classes
    }

    fn build_class_info(&self, location: &ClassLocation) -> ClassInfo {
        let raw = location.class();
        let mut chain = HashSet::new();
        let merged = self.merge_class(location, &mut chain);

        let mut info = ClassInfo::new(raw.name.clone(), location.path.clone());
        info.declared_kind = merged.declared_kind;
        info.properties = merged.properties;
        info.span = Some(raw.span);
        info.base_class = raw.super_class.clone();

        for decorator in &raw.decorators {
            if decorator.name == self.config.graph_info_decorator {
                if let Some((graph_type, span)) = decorator.object_prop("graphType") {
                    info.graph_type = Some(graph_type.to_string());
                    info.graph_type_span = Some(span);
                }
                if let Some((primary_view, _)) = decorator.object_prop("primaryView") {
                    info.primary_view = Some(primary_view.to_string());
                }
            } else if decorator.name == self.config.feature_decorator {
                info.feature_gates
                    .extend(decorator.string_args.iter().map(|(name, _)| name.clone()));
            }
        }

        info
    }

    /// Flatten `location`'s heritage chain into one property map, ancestors first.
    fn merge_class(
        &self,
        location: &ClassLocation,
        chain: &mut HashSet<(PathBuf, String)>,
    ) -> MergedClass {
        let raw = location.class();
        let mut merged = MergedClass {
            properties: IndexMap::new(),
            declared_kind: None,
        };

        if !chain.insert((location.path.clone(), raw.name.clone())) {
            tracing::debug!(class = %raw.name, "inheritance cycle, stopping");
            return merged;
        }

        if let Some(base) = &raw.super_class {
            if *base == self.config.screen_base_type {
                merged.declared_kind = Some(DeclaredKind::Screen);
            } else if *base == self.config.view_base_type {
                merged.declared_kind = Some(DeclaredKind::View);
            } else {
                let mut lookups = HashSet::new();
                match self.find_class(&location.path, &location.module, base, &mut lookups) {
                    Some(base_location) => merged = self.merge_class(&base_location, chain),
                    None => tracing::trace!(class = %raw.name, base = %base, "base class not resolved"),
                }
            }
        }

        for member in &raw.members {
            let property = self.property_from_member(member, &location.path);
            merged.properties.insert(member.name.clone(), property);
        }

        merged
    }

    fn property_from_member(&self, member: &RawMember, path: &Path) -> PropertyInfo {
        let shape = match &member.initializer {
            Some(call) => match &call.argument {
                Some(argument) if call.callee == self.config.single_factory => {
                    InitializerShape::Factory {
                        collection: false,
                        class_name: argument.clone(),
                    }
                }
                Some(argument) if call.callee == self.config.collection_factory => {
                    InitializerShape::Factory {
                        collection: true,
                        class_name: argument.clone(),
                    }
                }
                _ => InitializerShape::Other,
            },
            None => InitializerShape::Other,
        };

        let (kind, view_class_name) = classify_property(
            &self.config,
            member.type_name.as_deref(),
            member.type_argument.as_deref(),
            &shape,
        );

        PropertyInfo {
            name: member.name.clone(),
            kind,
            type_name: member.type_name.clone(),
            view_class_name,
            span: Some(member.span),
            declared_in: Some(path.to_path_buf()),
        }
    }

    /// Resolve identifier `name` as seen from `module`: a local class, else an imported one.
    fn find_class(
        &self,
        path: &Path,
        module: &Rc<SourceModule>,
        name: &str,
        lookups: &mut HashSet<(PathBuf, String)>,
    ) -> Option<ClassLocation> {
        if let Some(index) = module.classes.iter().position(|c| c.name == name) {
            return Some(ClassLocation {
                path: path.to_path_buf(),
                module: Rc::clone(module),
                index,
            });
        }

        let import = module.import(name)?;
        let (target, target_module) = self.load_dependency(path, &import.source)?;
        self.find_export(&target, &target_module, &import.imported, lookups)
    }

    /// Resolve the class exported as `exported` from `module`, following re-exports.
    fn find_export(
        &self,
        path: &Path,
        module: &Rc<SourceModule>,
        exported: &str,
        lookups: &mut HashSet<(PathBuf, String)>,
    ) -> Option<ClassLocation> {
        if exported == "*" || !lookups.insert((path.to_path_buf(), exported.to_string())) {
            return None;
        }

        let local_name = if exported == "default" {
            module.default_export.clone()?
        } else {
            module
                .local_exports
                .iter()
                .find(|(_, e)| e == exported)
                .map(|(local, _)| local.clone())
                .unwrap_or_else(|| exported.to_string())
        };

        if let Some(index) = module.classes.iter().position(|c| c.name == local_name) {
            return Some(ClassLocation {
                path: path.to_path_buf(),
                module: Rc::clone(module),
                index,
            });
        }

        // `import { X } from "./x"; export { X };`
        if let Some(import) = module.import(&local_name) {
            if let Some((target, target_module)) = self.load_dependency(path, &import.source) {
                if let Some(found) =
                    self.find_export(&target, &target_module, &import.imported, lookups)
                {
                    return Some(found);
                }
            }
        }

        for reexport in &module.reexports {
            let (source, name) = match reexport {
                ReExport::Named {
                    exported: e,
                    imported,
                    source,
                } if e == exported => (source, imported.as_str()),
                ReExport::All { source } => (source, exported),
                _ => continue,
            };
            let Some((target, target_module)) = self.load_dependency(path, source) else {
                continue;
            };
            if let Some(found) = self.find_export(&target, &target_module, name, lookups) {
                return Some(found);
            }
        }

        None
    }

    fn load_dependency(&self, from: &Path, specifier: &str) -> Option<(PathBuf, Rc<SourceModule>)> {
        let target = self.resolver.resolve(from, specifier)?;
        match self.cache.load(&target) {
            Ok(module) => Some((target, module)),
            Err(e) => {
                tracing::debug!(error = %e, "imported module unavailable");
                None
            }
        }
    }
}
