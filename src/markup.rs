//! Markup parsing.
//!
//! html5ever builds the element tree; [`crate::markup_scanner`] supplies source offsets. Only
//! elements are kept: text, comments and doctypes carry no bindings.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::{EngineError, EngineResult};
use crate::markup_scanner::{fallback_attributes, scan_start_tags, ScannedTag};
use crate::model::TextSpan;

/// Elements that never have content; `<br/>` needs no rewriting.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements the tree builder creates on its own when the source omits them.
const IMPLIED_TAGS: &[&str] = &["html", "head", "body", "tbody", "tr", "colgroup"];

/// Document wrappers flattened away unless written in the source.
const WRAPPER_TAGS: &[&str] = &["html", "head", "body"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupAttribute {
    pub name: String,
    pub value: String,
    pub name_span: Option<TextSpan>,
    pub value_span: Option<TextSpan>,
    /// Taken from the raw start tag because the tree builder dropped it.
    pub recovered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupElement {
    pub tag: String,
    pub attributes: Vec<MarkupAttribute>,
    pub children: Vec<MarkupElement>,
    /// Span of the start tag.
    pub span: Option<TextSpan>,
}

impl MarkupElement {
    pub fn attribute(&self, name: &str) -> Option<&MarkupAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Best span for a diagnostic about `attribute`: its value, else the start tag.
    pub fn span_for(&self, attribute: &str) -> Option<TextSpan> {
        self.attribute(attribute)
            .and_then(|a| a.value_span.or(a.name_span))
            .or(self.span)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkupDocument {
    pub nodes: Vec<MarkupElement>,
}

/// Rewrite `<x ... />` for non-void elements as `<x ...></x>`. html5ever ignores the slash and
/// would nest every following sibling inside the custom element.
fn expand_self_closing<'t>(text: &'t str, tags: &[ScannedTag]) -> Cow<'t, str> {
    let mut expanded = String::new();
    let mut last = 0;
    for tag in tags
        .iter()
        .filter(|t| t.self_closing && !VOID_TAGS.contains(&t.name.as_str()))
    {
        let end = tag.span.end as usize;
        if !text[..end].ends_with("/>") {
            continue;
        }
        expanded.push_str(&text[last..end - 2]);
        expanded.push_str("></");
        expanded.push_str(&tag.name);
        expanded.push('>');
        last = end;
    }
    if last == 0 {
        return Cow::Borrowed(text);
    }
    expanded.push_str(&text[last..]);
    Cow::Owned(expanded)
}

struct TreeBuilder<'s> {
    tags: &'s [ScannedTag],
    cursor: usize,
}

impl<'s> TreeBuilder<'s> {
    /// Pair the next tree element with its scanned start tag. Both sequences are in document
    /// order; scanned tags the tree builder discarded are skipped over.
    fn pair(&mut self, tag_name: &str) -> Option<&'s ScannedTag> {
        if let Some(tag) = self.tags.get(self.cursor) {
            if tag.name == tag_name {
                self.cursor += 1;
                return Some(tag);
            }
        }
        if IMPLIED_TAGS.contains(&tag_name) {
            return None;
        }
        let offset = self.tags.get(self.cursor..)?
            .iter()
            .position(|t| t.name == tag_name)?;
        let index = self.cursor + offset;
        self.cursor = index + 1;
        Some(&self.tags[index])
    }

    fn build_children(&mut self, handle: &Handle, out: &mut Vec<MarkupElement>) {
        for child in handle.children.borrow().iter() {
            self.build_node(child, out);
        }
    }

    fn build_node(&mut self, handle: &Handle, out: &mut Vec<MarkupElement>) {
        match &handle.data {
            NodeData::Document => self.build_children(handle, out),
            NodeData::Element {
                name,
                attrs,
                template_contents,
                ..
            } => {
                let tag = name.local.to_string();
                let scanned = self.pair(&tag);

                let mut children = Vec::new();
                if let Some(contents) = template_contents.borrow().as_ref() {
                    self.build_children(contents, &mut children);
                }
                self.build_children(handle, &mut children);

                if scanned.is_none() && WRAPPER_TAGS.contains(&tag.as_str()) {
                    out.extend(children);
                    return;
                }

                let mut attributes: Vec<MarkupAttribute> = attrs
                    .borrow()
                    .iter()
                    .map(|attr| {
                        let name = attr.name.local.to_string();
                        let raw = scanned.and_then(|t| t.attribute(&name));
                        MarkupAttribute {
                            value: attr.value.to_string(),
                            name_span: raw.map(|a| a.name_span),
                            value_span: raw.and_then(|a| a.value_span),
                            recovered: false,
                            name,
                        }
                    })
                    .collect();

                if let Some(raw_tag) = scanned {
                    let recovered: Vec<MarkupAttribute> = fallback_attributes(raw_tag, |n| {
                        attributes.iter().any(|a| a.name.eq_ignore_ascii_case(n))
                    })
                    .into_iter()
                    .map(|a| MarkupAttribute {
                        name: a.name.clone(),
                        value: a.value.clone().unwrap_or_default(),
                        name_span: Some(a.name_span),
                        value_span: a.value_span,
                        recovered: true,
                    })
                    .collect();
                    if !recovered.is_empty() {
                        tracing::trace!(tag = %tag, count = recovered.len(), "recovered attributes from raw start tag");
                    }
                    attributes.extend(recovered);
                }

                out.push(MarkupElement {
                    tag,
                    attributes,
                    children,
                    span: scanned.map(|t| t.span),
                });
            }
            _ => {}
        }
    }
}

/// Parse markup into an element tree with start-tag and attribute-value spans.
pub fn parse_markup(text: &str) -> EngineResult<MarkupDocument> {
    let tags = scan_start_tags(text);
    let source = expand_self_closing(text, &tags);

    let dom = parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut source.as_bytes())
        .map_err(|e| EngineError::parse("<markup>", e.to_string()))?;

    let mut builder = TreeBuilder {
        tags: &tags,
        cursor: 0,
    };
    let mut nodes = Vec::new();
    builder.build_node(&dom.document, &mut nodes);
    Ok(MarkupDocument { nodes })
}
