//! Immutable source document.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::DocumentError;

/// Byte span of a named section within the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpan {
    pub start: usize,
    pub end: usize,
}

impl SectionSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Publication text plus optional section spans.
///
/// Cloning is cheap; every clone shares the same text. There is no API to
/// mutate a document after construction.
#[derive(Debug, Clone)]
pub struct Document {
    text: Arc<str>,
    sections: Arc<BTreeMap<String, SectionSpan>>,
}

impl Document {
    /// A document without section annotations.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Arc::from(text.into()),
            sections: Arc::new(BTreeMap::new()),
        }
    }

    /// A document with named sections. Every span must lie within the text
    /// and on UTF-8 character boundaries.
    pub fn with_sections(
        text: impl Into<String>,
        sections: BTreeMap<String, SectionSpan>,
    ) -> Result<Self, DocumentError> {
        let text: String = text.into();
        for (name, span) in &sections {
            if span.start > span.end || span.end > text.len() {
                return Err(DocumentError::SectionOutOfBounds {
                    section: name.clone(),
                    start: span.start,
                    end: span.end,
                    len: text.len(),
                });
            }
            if !text.is_char_boundary(span.start) || !text.is_char_boundary(span.end) {
                return Err(DocumentError::NotCharBoundary {
                    section: name.clone(),
                    start: span.start,
                    end: span.end,
                });
            }
        }
        Ok(Self {
            text: Arc::from(text),
            sections: Arc::new(sections),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text of a named section, if annotated.
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .get(name)
            .map(|span| &self.text[span.start..span.end])
    }

    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn sections(&self) -> &BTreeMap<String, SectionSpan> {
        &self.sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_lookup() {
        let text = "Abstract here. Methods here.";
        let mut sections = BTreeMap::new();
        sections.insert("abstract".to_string(), SectionSpan::new(0, 14));
        sections.insert("methods".to_string(), SectionSpan::new(15, 28));

        let doc = Document::with_sections(text, sections).unwrap();
        assert_eq!(doc.section("abstract"), Some("Abstract here."));
        assert_eq!(doc.section("methods"), Some("Methods here."));
        assert_eq!(doc.section("results"), None);
        assert_eq!(doc.section_names().count(), 2);
    }

    #[test]
    fn test_out_of_bounds_section_rejected() {
        let mut sections = BTreeMap::new();
        sections.insert("abstract".to_string(), SectionSpan::new(0, 99));
        let err = Document::with_sections("short", sections).unwrap_err();
        assert!(matches!(err, DocumentError::SectionOutOfBounds { .. }));
    }

    #[test]
    fn test_non_char_boundary_rejected() {
        let mut sections = BTreeMap::new();
        sections.insert("title".to_string(), SectionSpan::new(0, 1));
        let err = Document::with_sections("αβγ", sections).unwrap_err();
        assert!(matches!(err, DocumentError::NotCharBoundary { .. }));
    }

    #[test]
    fn test_clones_share_text() {
        let doc = Document::new("BRAF V600E confers sensitivity to vemurafenib.");
        let copy = doc.clone();
        assert!(std::ptr::eq(doc.text(), copy.text()));
    }
}
