use crate::markup::{MarkupDocument, MarkupElement};

/// The MarkupVisitor trait is the single traversal mechanism for markup trees.
///
/// Rules:
/// 1. Traversal order is document order, parents before children.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers call the matching `walk_*` function to continue traversal unless pruning is
///    intended.
pub trait MarkupVisitor {
    fn visit_document(&mut self, document: &MarkupDocument) {
        walk_document(self, document);
    }

    fn visit_element(&mut self, element: &MarkupElement) {
        walk_element(self, element);
    }

    fn visit_children(&mut self, children: &[MarkupElement]) {
        walk_children(self, children);
    }
}

pub fn walk_document<V: MarkupVisitor + ?Sized>(visitor: &mut V, document: &MarkupDocument) {
    visitor.visit_children(&document.nodes);
}

pub fn walk_children<V: MarkupVisitor + ?Sized>(visitor: &mut V, children: &[MarkupElement]) {
    for element in children {
        visitor.visit_element(element);
    }
}

pub fn walk_element<V: MarkupVisitor + ?Sized>(visitor: &mut V, element: &MarkupElement) {
    visitor.visit_children(&element.children);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    struct TagCollector {
        tags: Vec<String>,
        prune: &'static str,
    }

    impl MarkupVisitor for TagCollector {
        fn visit_element(&mut self, element: &MarkupElement) {
            self.tags.push(element.tag.clone());
            if element.tag != self.prune {
                walk_element(self, element);
            }
        }
    }

    #[test]
    fn test_document_order_and_pruning() {
        let doc = parse_markup("<div><span><b></b></span><i></i></div><p></p>").unwrap();

        let mut all = TagCollector { tags: Vec::new(), prune: "" };
        all.visit_document(&doc);
        assert_eq!(all.tags, vec!["div", "span", "b", "i", "p"]);

        let mut pruned = TagCollector { tags: Vec::new(), prune: "span" };
        pruned.visit_document(&doc);
        assert_eq!(pruned.tags, vec!["div", "span", "i", "p"]);
    }
}
