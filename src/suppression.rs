//! Suppression Engine
//!
//! Inline directives silence diagnostics by code:
//!
//! ```text
//! <!-- acumate-disable-next-line field-not-found -->
//! <!-- acumate-disable-file all -->
//! // acumate-disable-next-line backend-view-missing,backend-action-missing
//! /* acumate-disable-next-line graph-type-not-found */
//! ```
//!
//! Lines are zero-based. A next-line directive on line N covers line N+1; a file directive covers
//! the whole file wherever it appears. Codes compare case-insensitively and `all` matches any code.
//! A directive listing no codes covers all of them.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::diagnostics::Diagnostic;

const ALL: &str = "all";

lazy_static! {
    static ref MARKUP_DIRECTIVE_RE: Regex =
        Regex::new(r"(?i)<!--\s*acumate-disable-(next-line|file)\b(.*?)-->").unwrap();
    static ref LINE_COMMENT_DIRECTIVE_RE: Regex =
        Regex::new(r"(?i)//\s*acumate-disable-(next-line|file)\b(.*)$").unwrap();
    static ref BLOCK_COMMENT_DIRECTIVE_RE: Regex =
        Regex::new(r"(?i)/\*\s*acumate-disable-(next-line)\b(.*?)\*/").unwrap();
    static ref CODE_SEPARATOR_RE: Regex = Regex::new(r"[\s,]+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// HTML templates: directives live in `<!-- -->` comments.
    Markup,
    /// Screen source: directives live in `//` or `/* */` comments.
    Code,
}

impl Language {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm") => {
                Language::Markup
            }
            _ => Language::Code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    NextLine,
    File,
}

impl DirectiveKind {
    fn marker(self) -> &'static str {
        match self {
            DirectiveKind::NextLine => "acumate-disable-next-line",
            DirectiveKind::File => "acumate-disable-file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressionDirective {
    Line {
        target_line: u32,
        codes: HashSet<String>,
    },
    File {
        codes: HashSet<String>,
    },
}

fn parse_codes(raw: &str) -> HashSet<String> {
    let codes: HashSet<String> = CODE_SEPARATOR_RE
        .split(raw.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_lowercase)
        .collect();
    if codes.is_empty() {
        HashSet::from([ALL.to_string()])
    } else {
        codes
    }
}

fn covers(codes: &HashSet<String>, code: &str) -> bool {
    codes.contains(ALL) || codes.contains(code)
}

#[derive(Debug, Clone, Default)]
pub struct SuppressionEngine {
    directives: Vec<SuppressionDirective>,
    by_line: HashMap<u32, HashSet<String>>,
    file_wide: HashSet<String>,
}

impl SuppressionEngine {
    pub fn build(text: &str, language: Language) -> Self {
        let mut engine = SuppressionEngine::default();
        for (index, line) in text.lines().enumerate() {
            let line_number = index as u32;
            match language {
                Language::Markup => {
                    for caps in MARKUP_DIRECTIVE_RE.captures_iter(line) {
                        engine.add(line_number, &caps[1], &caps[2]);
                    }
                }
                Language::Code => {
                    for caps in BLOCK_COMMENT_DIRECTIVE_RE.captures_iter(line) {
                        engine.add(line_number, &caps[1], &caps[2]);
                    }
                    if let Some(caps) = LINE_COMMENT_DIRECTIVE_RE.captures(line) {
                        engine.add(line_number, &caps[1], &caps[2]);
                    }
                }
            }
        }
        if !engine.directives.is_empty() {
            tracing::trace!(count = engine.directives.len(), "suppression directives found");
        }
        engine
    }

    fn add(&mut self, line_number: u32, kind: &str, raw_codes: &str) {
        let codes = parse_codes(raw_codes);
        if kind.eq_ignore_ascii_case("file") {
            self.file_wide.extend(codes.iter().cloned());
            self.directives.push(SuppressionDirective::File { codes });
        } else {
            let target_line = line_number + 1;
            self.by_line
                .entry(target_line)
                .or_default()
                .extend(codes.iter().cloned());
            self.directives.push(SuppressionDirective::Line { target_line, codes });
        }
    }

    pub fn directives(&self) -> &[SuppressionDirective] {
        &self.directives
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }

    pub fn is_suppressed(&self, line: u32, code: &str) -> bool {
        if self.directives.is_empty() {
            return false;
        }
        let code = code.to_ascii_lowercase();
        covers(&self.file_wide, &code)
            || self
                .by_line
                .get(&line)
                .map_or(false, |codes| covers(codes, &code))
    }

    pub fn filter(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        if self.directives.is_empty() {
            return diagnostics;
        }
        diagnostics
            .into_iter()
            .filter(|d| !self.is_suppressed(d.range.start.line, &d.code))
            .collect()
    }
}

/// The directive a quick fix inserts, without indentation or line break.
pub fn directive_text(language: Language, kind: DirectiveKind, codes: &[&str]) -> String {
    let codes = codes.join(",");
    match language {
        Language::Markup => format!("<!-- {} {} -->", kind.marker(), codes),
        Language::Code => format!("// {} {}", kind.marker(), codes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Position, Range, FIELD_NOT_FOUND, VIEW_NOT_FOUND};

    fn diagnostic(line: u32, code: &str) -> Diagnostic {
        let at = Position::new(line, 4);
        Diagnostic::error(code, Range::new(at, at), "x")
    }

    #[test]
    fn test_no_directives() {
        let engine = SuppressionEngine::build("<div></div>\n<field></field>", Language::Markup);
        assert!(engine.is_empty());
        assert!(!engine.is_suppressed(1, FIELD_NOT_FOUND));
    }

    #[test]
    fn test_next_line_markup() {
        let text = "<div>\n  <!-- acumate-disable-next-line Field-Not-Found -->\n  <field name=\"X\"></field>\n</div>";
        let engine = SuppressionEngine::build(text, Language::Markup);
        assert_eq!(
            engine.directives(),
            &[SuppressionDirective::Line {
                target_line: 2,
                codes: HashSet::from([FIELD_NOT_FOUND.to_string()]),
            }]
        );
        assert!(engine.is_suppressed(2, FIELD_NOT_FOUND));
        assert!(engine.is_suppressed(2, "FIELD-NOT-FOUND"));
        assert!(!engine.is_suppressed(2, VIEW_NOT_FOUND));
        assert!(!engine.is_suppressed(1, FIELD_NOT_FOUND));
        assert!(!engine.is_suppressed(3, FIELD_NOT_FOUND));
    }

    #[test]
    fn test_file_directive_anywhere() {
        let text = "<div></div>\n<!-- acumate-disable-file view-not-found, field-not-found -->";
        let engine = SuppressionEngine::build(text, Language::Markup);
        assert!(engine.is_suppressed(0, VIEW_NOT_FOUND));
        assert!(engine.is_suppressed(40, FIELD_NOT_FOUND));
        assert!(!engine.is_suppressed(0, "action-not-found"));
    }

    #[test]
    fn test_code_comment_forms() {
        let text = "// acumate-disable-file all\n/* acumate-disable-next-line graph-type-not-found */\nclass X {}";
        let engine = SuppressionEngine::build(text, Language::Code);
        assert_eq!(engine.directives().len(), 2);
        assert!(engine.is_suppressed(7, "anything"));

        let block = SuppressionEngine::build(
            "/* acumate-disable-next-line graph-type-not-found */\n@graphInfo({})",
            Language::Code,
        );
        assert!(block.is_suppressed(1, "graph-type-not-found"));
        assert!(!block.is_suppressed(1, "backend-view-missing"));
    }

    #[test]
    fn test_markup_directive_ignored_in_code() {
        let engine = SuppressionEngine::build(
            "<!-- acumate-disable-file all -->",
            Language::Code,
        );
        assert!(engine.is_empty());
    }

    #[test]
    fn test_bare_directive_means_all() {
        let engine = SuppressionEngine::build("// acumate-disable-next-line\nfoo", Language::Code);
        assert!(engine.is_suppressed(1, VIEW_NOT_FOUND));
    }

    #[test]
    fn test_filter_keeps_other_lines_and_codes() {
        let text = "<a></a>\n<!-- acumate-disable-next-line field-not-found -->\n<b></b>";
        let engine = SuppressionEngine::build(text, Language::Markup);
        let kept = engine.filter(vec![
            diagnostic(2, FIELD_NOT_FOUND),
            diagnostic(2, VIEW_NOT_FOUND),
            diagnostic(0, FIELD_NOT_FOUND),
        ]);
        let kept: Vec<_> = kept.iter().map(|d| (d.range.start.line, d.code.as_str())).collect();
        assert_eq!(kept, vec![(2, VIEW_NOT_FOUND), (0, FIELD_NOT_FOUND)]);
    }

    #[test]
    fn test_directive_text_round_trips() {
        let markup = directive_text(Language::Markup, DirectiveKind::NextLine, &[FIELD_NOT_FOUND]);
        assert_eq!(markup, "<!-- acumate-disable-next-line field-not-found -->");
        let code = directive_text(
            Language::Code,
            DirectiveKind::File,
            &["backend-view-missing", "backend-action-missing"],
        );
        assert_eq!(code, "// acumate-disable-file backend-view-missing,backend-action-missing");
        assert!(SuppressionEngine::build(&code, Language::Code).is_suppressed(9, "backend-action-missing"));
    }

    #[test]
    fn test_language_from_path() {
        assert_eq!(Language::from_path(Path::new("SO301000.html")), Language::Markup);
        assert_eq!(Language::from_path(Path::new("SO301000.ts")), Language::Code);
    }
}
