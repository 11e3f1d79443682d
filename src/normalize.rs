//! Backend Metadata Normalizer
//!
//! Backend structures are free-form: a view may be listed under its name and again under an alias
//! key, with a different slice of its fields each time. Lookups here are case-insensitive and every
//! alias resolves to one canonical entry, the first one created for any of its keys.

use indexmap::IndexMap;
use std::collections::HashSet;

use crate::backend::{GraphStructure, RawView};

/// Trim and lower-case a backend name. Blank names are absent.
pub fn normalize(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendFieldMetadata {
    pub canonical_name: String,
    pub normalized_key: String,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendViewMetadata {
    pub canonical_name: String,
    pub normalized_key: String,
    pub fields: FieldMap,
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// Canonical entries plus every normalized key that aliases them.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasMap<T> {
    entries: Vec<T>,
    index: IndexMap<String, usize>,
}

pub type ViewMap = AliasMap<BackendViewMetadata>;
pub type FieldMap = AliasMap<BackendFieldMetadata>;

impl<T> Default for AliasMap<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: IndexMap::new(),
        }
    }
}

impl<T> AliasMap<T> {
    /// Look up by any spelling of any alias.
    pub fn get(&self, name: &str) -> Option<&T> {
        let key = normalize(name)?;
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of canonical entries (not keys).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    fn position(&self, keys: &[String]) -> Option<usize> {
        keys.iter().find_map(|k| self.index.get(k).copied())
    }

    fn alias(&mut self, keys: &[String], position: usize) {
        for key in keys {
            self.index.entry(key.clone()).or_insert(position);
        }
    }

    fn push(&mut self, entry: T, keys: &[String]) {
        let position = self.entries.len();
        self.entries.push(entry);
        self.alias(keys, position);
    }

    /// Add entries of `other` whose keys are all unknown here; known ones only gain aliases.
    fn absorb(&mut self, other: AliasMap<T>) {
        let mut keys_by_entry: Vec<Vec<String>> = vec![Vec::new(); other.entries.len()];
        for (key, &position) in &other.index {
            keys_by_entry[position].push(key.clone());
        }
        for (entry, keys) in other.entries.into_iter().zip(keys_by_entry) {
            match self.position(&keys) {
                Some(position) => self.alias(&keys, position),
                None => self.push(entry, &keys),
            }
        }
    }
}

/// Lookup keys for an entry: the embedded name first, then the map key, deduplicated.
fn lookup_keys(embedded: Option<&str>, map_key: &str) -> Vec<String> {
    let mut keys = Vec::with_capacity(2);
    for key in [embedded.and_then(normalize), normalize(map_key)].into_iter().flatten() {
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

fn display_name(embedded: Option<&str>, map_key: &str) -> String {
    embedded
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| map_key.trim())
        .to_string()
}

pub fn build_field_map(view: &RawView) -> FieldMap {
    let mut map = FieldMap::default();
    for (key, value) in &view.fields {
        let embedded = value.get("name").and_then(|n| n.as_str());
        let keys = lookup_keys(embedded, key);
        if keys.is_empty() {
            continue;
        }

        match map.position(&keys) {
            Some(position) => {
                if let (Some(canonical), Some(later)) =
                    (map.entries[position].raw.as_object_mut(), value.as_object())
                {
                    for (k, v) in later {
                        canonical.entry(k.clone()).or_insert_with(|| v.clone());
                    }
                }
                map.alias(&keys, position);
            }
            None => {
                let entry = BackendFieldMetadata {
                    canonical_name: display_name(embedded, key),
                    normalized_key: keys[0].clone(),
                    raw: value.clone(),
                };
                map.push(entry, &keys);
            }
        }
    }
    map
}

pub fn build_view_map(structure: &GraphStructure) -> ViewMap {
    let mut map = ViewMap::default();
    for (key, view) in &structure.views {
        let keys = lookup_keys(view.name.as_deref(), key);
        if keys.is_empty() {
            continue;
        }
        let fields = build_field_map(view);

        match map.position(&keys) {
            Some(position) => {
                let canonical = &mut map.entries[position];
                canonical.fields.absorb(fields);
                for (k, v) in &view.extra {
                    canonical.raw.entry(k.clone()).or_insert_with(|| v.clone());
                }
                map.alias(&keys, position);
            }
            None => {
                let entry = BackendViewMetadata {
                    canonical_name: display_name(view.name.as_deref(), key),
                    normalized_key: keys[0].clone(),
                    fields,
                    raw: view.extra.clone(),
                };
                map.push(entry, &keys);
            }
        }
    }
    map
}

pub fn build_action_set(structure: &GraphStructure) -> HashSet<String> {
    structure
        .actions
        .iter()
        .filter_map(|a| a.name.as_deref().and_then(normalize))
        .collect()
}

/// Normalized view of one graph, as consumed by the validators.
#[derive(Debug, Clone, Default)]
pub struct BackendGraph {
    pub views: ViewMap,
    pub actions: HashSet<String>,
}

impl BackendGraph {
    pub fn from_structure(structure: &GraphStructure) -> Self {
        Self {
            views: build_view_map(structure),
            actions: build_action_set(structure),
        }
    }

    pub fn has_action(&self, name: &str) -> bool {
        normalize(name)
            .map(|key| self.actions.contains(&key))
            .unwrap_or(false)
    }
}
