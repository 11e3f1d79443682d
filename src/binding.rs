//! View/Field Binding Resolver
//!
//! Binding names are matched exactly against declared source properties. Only backend names are
//! compared case-insensitively (see [`crate::normalize`]).

use std::collections::HashMap;

use crate::model::{ClassInfo, PropertyInfo, PropertyKind};

/// Name → class map built once per validation pass. The first class collected under a name wins,
/// which puts the validated file's own declarations ahead of imported ones.
#[derive(Debug, Default)]
pub struct ClassLookup<'a> {
    classes: HashMap<&'a str, &'a ClassInfo>,
}

impl<'a> ClassLookup<'a> {
    pub fn new(classes: &'a [ClassInfo]) -> Self {
        let mut map = HashMap::new();
        for class in classes {
            map.entry(class.class_name.as_str()).or_insert(class);
        }
        Self { classes: map }
    }

    pub fn get(&self, name: &str) -> Option<&'a ClassInfo> {
        self.classes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ViewResolution<'a> {
    pub property: &'a PropertyInfo,
    pub view_class: Option<&'a ClassInfo>,
    /// Screen class declaring `property`.
    pub screen: &'a ClassInfo,
}

impl<'a> ViewResolution<'a> {
    /// The field named `field_name` on the resolved view class, if it is a field.
    pub fn field(&self, field_name: &str) -> Option<&'a PropertyInfo> {
        self.view_class?
            .property(field_name)
            .filter(|p| p.kind == PropertyKind::Field)
    }
}

/// Find the screen view property named `binding_name` and its nested view class.
pub fn resolve<'a>(
    binding_name: &str,
    screen_classes: &[&'a ClassInfo],
    lookup: &ClassLookup<'a>,
) -> Option<ViewResolution<'a>> {
    screen_classes.iter().copied().find_map(|screen| {
        let property = screen.property(binding_name)?;
        if !property.kind.is_view() {
            return None;
        }
        let view_class = property
            .view_class_name
            .as_deref()
            .and_then(|name| lookup.get(name));
        Some(ViewResolution {
            property,
            view_class,
            screen,
        })
    })
}

/// Find the screen action property named `action_name`.
pub fn resolve_action<'a>(
    action_name: &str,
    screen_classes: &[&'a ClassInfo],
) -> Option<(&'a ClassInfo, &'a PropertyInfo)> {
    screen_classes.iter().copied().find_map(|screen| {
        screen
            .property(action_name)
            .filter(|p| p.kind == PropertyKind::Action)
            .map(|p| (screen, p))
    })
}

/// Screen-like classes among `classes`.
pub fn screen_classes(classes: &[ClassInfo]) -> Vec<&ClassInfo> {
    classes.iter().filter(|c| c.is_screen()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeclaredKind;

    fn screen_and_view() -> Vec<ClassInfo> {
        let mut screen = ClassInfo::new("SO301000", "/virtual/SO301000.ts");
        screen.declared_kind = Some(DeclaredKind::Screen);
        let mut document = PropertyInfo::new("Document", PropertyKind::View);
        document.view_class_name = Some("DocView".to_string());
        screen.properties.insert("Document".to_string(), document);
        screen.properties.insert(
            "Save".to_string(),
            PropertyInfo::new("Save", PropertyKind::Action),
        );

        let mut view = ClassInfo::new("DocView", "/virtual/SO301000.ts");
        view.declared_kind = Some(DeclaredKind::View);
        view.properties.insert(
            "OrderNbr".to_string(),
            PropertyInfo::new("OrderNbr", PropertyKind::Field),
        );
        vec![screen, view]
    }

    #[test]
    fn test_resolve_positive() {
        let classes = screen_and_view();
        let lookup = ClassLookup::new(&classes);
        let screens = screen_classes(&classes);

        let resolution = resolve("Document", &screens, &lookup).unwrap();
        assert_eq!(resolution.screen.class_name, "SO301000");
        let view = resolution.view_class.unwrap();
        assert_eq!(view.property("OrderNbr").unwrap().kind, PropertyKind::Field);
        assert!(resolution.field("OrderNbr").is_some());
        assert!(resolution.field("Missing").is_none());
    }

    #[test]
    fn test_resolve_is_exact() {
        let classes = screen_and_view();
        let lookup = ClassLookup::new(&classes);
        let screens = screen_classes(&classes);

        assert!(resolve("document", &screens, &lookup).is_none());
        assert!(resolve("Save", &screens, &lookup).is_none());
        assert!(resolve_action("Save", &screens).is_some());
        assert!(resolve_action("Document", &screens).is_none());
    }

    #[test]
    fn test_lookup_first_wins() {
        let mut classes = screen_and_view();
        classes.push(ClassInfo::new("DocView", "/virtual/other.ts"));
        let lookup = ClassLookup::new(&classes);
        assert_eq!(lookup.len(), 2);
        assert!(lookup.get("DocView").unwrap().is_view());
    }
}
