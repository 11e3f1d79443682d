//! Offset scanner for markup start tags.
//!
//! html5ever builds the tree but keeps no source positions. This scanner walks the raw text once
//! and records every start tag in document order with byte spans for the tag, its attribute names
//! and values. The tree builder pairs its elements with these tags; the scanner is also the
//! fallback when the tree builder drops an attribute.

use crate::diagnostics::{Position, Range};
use crate::model::TextSpan;

/// Elements whose content is raw text: tags inside them are not tags.
const RAW_TEXT_TAGS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedAttribute {
    /// ASCII-lowercased, as the tree builder reports it.
    pub name: String,
    pub value: Option<String>,
    pub name_span: TextSpan,
    pub value_span: Option<TextSpan>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedTag {
    /// ASCII-lowercased tag name.
    pub name: String,
    /// From `<` through `>` (or end of text for an unterminated tag).
    pub span: TextSpan,
    pub attributes: Vec<ScannedAttribute>,
    /// Written as `<x ... />`.
    pub self_closing: bool,
}

impl ScannedTag {
    pub fn attribute(&self, name: &str) -> Option<&ScannedAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn skip_past(text: &str, from: usize, needle: &str) -> usize {
    match text[from..].find(needle) {
        Some(p) => from + p + needle.len(),
        None => text.len(),
    }
}

/// All start tags in `text`, in document order. Comments, end tags, doctypes, processing
/// instructions and raw-text element bodies are skipped.
pub fn scan_start_tags(text: &str) -> Vec<ScannedTag> {
    let bytes = text.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while let Some(rel) = bytes[i..].iter().position(|&b| b == b'<') {
        let lt = i + rel;
        let rest = &text[lt..];

        if rest.starts_with("<!--") {
            i = skip_past(text, lt + 4, "-->");
            continue;
        }
        if rest.starts_with("</") || rest.starts_with("<!") || rest.starts_with("<?") {
            i = skip_past(text, lt, ">");
            continue;
        }
        if !bytes.get(lt + 1).map_or(false, u8::is_ascii_alphabetic) {
            i = lt + 1;
            continue;
        }

        let tag = scan_tag(text, lt);
        i = tag.span.end as usize;
        if !tag.self_closing && RAW_TEXT_TAGS.contains(&tag.name.as_str()) {
            let close = format!("</{}", tag.name);
            i = text[i..]
                .to_ascii_lowercase()
                .find(&close)
                .map_or(text.len(), |p| i + p);
        }
        tags.push(tag);
    }

    tags
}

fn scan_tag(text: &str, lt: usize) -> ScannedTag {
    let bytes = text.as_bytes();
    let len = bytes.len();

    let mut i = lt + 1;
    while i < len && !is_space(bytes[i]) && bytes[i] != b'/' && bytes[i] != b'>' {
        i += 1;
    }
    let name = text[lt + 1..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;
    loop {
        while i < len && (is_space(bytes[i]) || bytes[i] == b'/') {
            if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'>') {
                self_closing = true;
            }
            i += 1;
        }
        if i >= len {
            break;
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }

        let name_start = i;
        i += 1;
        while i < len && !is_space(bytes[i]) && !matches!(bytes[i], b'/' | b'>' | b'=') {
            i += 1;
        }
        let name_span = TextSpan::from_range(name_start..i);

        let mut j = i;
        while j < len && is_space(bytes[j]) {
            j += 1;
        }
        let mut value_range = None;
        if j < len && bytes[j] == b'=' {
            j += 1;
            while j < len && is_space(bytes[j]) {
                j += 1;
            }
            if j < len && (bytes[j] == b'"' || bytes[j] == b'\'') {
                let quote = bytes[j];
                let start = j + 1;
                let end = bytes[start..]
                    .iter()
                    .position(|&b| b == quote)
                    .map_or(len, |p| start + p);
                value_range = Some(start..end);
                i = (end + 1).min(len);
            } else {
                let start = j;
                while j < len && !is_space(bytes[j]) && bytes[j] != b'>' {
                    j += 1;
                }
                value_range = Some(start..j);
                i = j;
            }
        }

        attributes.push(ScannedAttribute {
            name: text[name_span.start as usize..name_span.end as usize].to_ascii_lowercase(),
            value: value_range.clone().map(|r| text[r].to_string()),
            name_span,
            value_span: value_range.map(TextSpan::from_range),
        });
    }

    ScannedTag {
        name,
        span: TextSpan::from_range(lt..i),
        attributes,
        self_closing,
    }
}

/// Fallback attribute source: attributes of the raw start tag for which `present` is false,
/// first occurrence per name.
pub fn fallback_attributes<'t>(
    tag: &'t ScannedTag,
    present: impl Fn(&str) -> bool,
) -> Vec<&'t ScannedAttribute> {
    tag.attributes
        .iter()
        .enumerate()
        .filter(|(index, attr)| {
            tag.attributes[..*index].iter().all(|a| a.name != attr.name) && !present(&attr.name)
        })
        .map(|(_, attr)| attr)
        .collect()
}

/// Byte offset to line/character conversion over one text.
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { text, line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn position(&self, offset: usize) -> Position {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let character = self.text[self.line_starts[line]..offset]
            .encode_utf16()
            .count();
        Position::new(line as u32, character as u32)
    }

    pub fn range(&self, span: TextSpan) -> Range {
        Range::new(
            self.position(span.start as usize),
            self.position(span.end as usize),
        )
    }
}
