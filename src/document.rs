//! Documents, snippets and the closed vocabularies they use.
//!
//! Everything loosely typed that arrives from a backend is coerced into these
//! types at the analysis boundary, so the rest of the crate only ever sees a
//! rubric [`Category`] and a [`Relevance`] level.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The eight-point classification rubric plus the fallback label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Statute + Citation")]
    StatuteCitation,
    #[serde(rename = "Doctrine")]
    Doctrine,
    #[serde(rename = "Literary/Scholarly Reference")]
    ScholarlyReference,
    #[serde(rename = "Court/Judge/Legislative Opinions")]
    Opinions,
    #[serde(rename = "Templates")]
    Templates,
    #[serde(rename = "Philosophy")]
    Philosophy,
    #[serde(rename = "Psychology")]
    Psychology,
    #[serde(rename = "Case Law Reference")]
    CaseLawReference,
    #[serde(rename = "Uncategorized")]
    Uncategorized,
}

impl Category {
    /// Rubric categories in prompt order. `Uncategorized` is not part of it.
    pub const RUBRIC: [Category; 8] = [
        Category::StatuteCitation,
        Category::Doctrine,
        Category::ScholarlyReference,
        Category::Opinions,
        Category::Templates,
        Category::Philosophy,
        Category::Psychology,
        Category::CaseLawReference,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::StatuteCitation => "Statute + Citation",
            Category::Doctrine => "Doctrine",
            Category::ScholarlyReference => "Literary/Scholarly Reference",
            Category::Opinions => "Court/Judge/Legislative Opinions",
            Category::Templates => "Templates",
            Category::Philosophy => "Philosophy",
            Category::Psychology => "Psychology",
            Category::CaseLawReference => "Case Law Reference",
            Category::Uncategorized => "Uncategorized",
        }
    }

    /// Map a backend-supplied label onto the rubric. Anything that is not an
    /// exact rubric label becomes `Uncategorized`.
    pub fn coerce(raw: Option<&str>) -> Self {
        raw.and_then(|label| {
            Self::RUBRIC
                .iter()
                .copied()
                .find(|category| category.label() == label)
        })
        .unwrap_or(Category::Uncategorized)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Self::RUBRIC
            .iter()
            .chain(std::iter::once(&Category::Uncategorized))
            .copied()
            .find(|category| category.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::InvalidCategory(s.to_string()))
    }
}

/// How relevant a snippet is to the case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relevance {
    High,
    Medium,
    Low,
}

impl Relevance {
    pub fn coerce(raw: Option<&str>) -> Self {
        match raw {
            Some("High") => Relevance::High,
            Some("Low") => Relevance::Low,
            _ => Relevance::Medium,
        }
    }
}

impl fmt::Display for Relevance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relevance::High => write!(f, "High"),
            Relevance::Medium => write!(f, "Medium"),
            Relevance::Low => write!(f, "Low"),
        }
    }
}

/// Review workflow state of a snippet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::Approved => write!(f, "approved"),
        }
    }
}

/// One extracted fact tied to its source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub id: String,
    pub source_doc_id: String,
    pub source_doc_name: String,
    pub headline: String,
    pub category: Category,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_citation: Option<String>,
    pub relevance_score: Relevance,
    #[serde(default)]
    pub status: ReviewStatus,
}

/// A web source the backend grounded its answer on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub url: String,
}

/// Text of a document, or the reason it could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum DocumentContent {
    Readable(String),
    Unreadable(String),
}

impl DocumentContent {
    pub fn is_empty(&self) -> bool {
        match self {
            DocumentContent::Readable(text) => text.is_empty(),
            DocumentContent::Unreadable(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DocumentContent::Readable(text) | DocumentContent::Unreadable(text) => text.len(),
        }
    }
}

/// An uploaded document and everything extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    pub content: DocumentContent,
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_sources: Option<Vec<GroundingSource>>,
    pub is_processed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Document {
    /// A fresh pending document. Every call gets a new id, so uploading the
    /// same file twice yields two records.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, text: String) -> Self {
        let name = name.into();
        Self {
            id: new_document_id(&name),
            name,
            content_type: content_type.into(),
            content: DocumentContent::Readable(text),
            snippets: Vec::new(),
            grounding_sources: None,
            is_processed: false,
            error: None,
        }
    }

    /// A document whose source could not be read. It is already terminal.
    pub fn unreadable(
        name: impl Into<String>,
        content_type: impl Into<String>,
        reason: String,
    ) -> Self {
        let name = name.into();
        Self {
            id: new_document_id(&name),
            name,
            content_type: content_type.into(),
            error: Some(Error::Read(reason.clone()).to_string()),
            content: DocumentContent::Unreadable(reason),
            snippets: Vec::new(),
            grounding_sources: None,
            is_processed: true,
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self.content, DocumentContent::Readable(_))
    }

    /// Status derived from the persisted flags
    pub fn derived_status(&self) -> ProcessingStatus {
        match (self.is_processed, self.error.is_some()) {
            (false, _) => ProcessingStatus::Pending,
            (true, true) => ProcessingStatus::Error,
            (true, false) => ProcessingStatus::Done,
        }
    }

    pub fn find_snippet_mut(&mut self, snippet_id: &str) -> Option<&mut Snippet> {
        self.snippets.iter_mut().find(|s| s.id == snippet_id)
    }
}

fn new_document_id(name: &str) -> String {
    format!("{}-{}", name, Uuid::new_v4().simple())
}

/// Live processing state of a document. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingStatus::Pending => write!(f, "pending"),
            ProcessingStatus::Processing => write!(f, "processing"),
            ProcessingStatus::Done => write!(f, "done"),
            ProcessingStatus::Error => write!(f, "error"),
        }
    }
}

impl FromStr for ProcessingStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ProcessingStatus::Pending),
            "processing" => Ok(ProcessingStatus::Processing),
            "done" => Ok(ProcessingStatus::Done),
            "error" => Ok(ProcessingStatus::Error),
            _ => Err(Error::Config(format!("Unknown processing status: {}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_coercion() {
        assert_eq!(Category::coerce(Some("Random String")), Category::Uncategorized);
        assert_eq!(Category::coerce(Some("Doctrine")), Category::Doctrine);
        assert_eq!(Category::coerce(None), Category::Uncategorized);
        // Coercion is exact; the rubric labels are what the prompt asks for
        assert_eq!(Category::coerce(Some("doctrine")), Category::Uncategorized);
    }

    #[test]
    fn test_category_from_str_accepts_fallback() {
        assert_eq!(
            "case law reference".parse::<Category>().unwrap(),
            Category::CaseLawReference
        );
        assert_eq!(
            "Uncategorized".parse::<Category>().unwrap(),
            Category::Uncategorized
        );
        assert!("Astrology".parse::<Category>().is_err());
    }

    #[test]
    fn test_relevance_coercion() {
        assert_eq!(Relevance::coerce(Some("High")), Relevance::High);
        assert_eq!(Relevance::coerce(Some("Low")), Relevance::Low);
        assert_eq!(Relevance::coerce(Some("Critical")), Relevance::Medium);
        assert_eq!(Relevance::coerce(None), Relevance::Medium);
    }

    #[test]
    fn test_derived_status() {
        let mut doc = Document::new("brief.txt", "text/plain", "text".to_string());
        assert_eq!(doc.derived_status(), ProcessingStatus::Pending);

        doc.is_processed = true;
        assert_eq!(doc.derived_status(), ProcessingStatus::Done);

        doc.error = Some("boom".to_string());
        assert_eq!(doc.derived_status(), ProcessingStatus::Error);
    }

    #[test]
    fn test_unreadable_document_is_terminal() {
        let doc = Document::unreadable("scan.pdf", "application/pdf", "disk fault".to_string());
        assert!(!doc.is_readable());
        assert!(doc.is_processed);
        assert_eq!(doc.error.as_deref(), Some("Error reading file: disk fault"));
        assert_eq!(doc.derived_status(), ProcessingStatus::Error);
    }

    #[test]
    fn test_document_ids_are_unique_per_upload() {
        let a = Document::new("brief.txt", "text/plain", "x".to_string());
        let b = Document::new("brief.txt", "text/plain", "x".to_string());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("brief.txt-"));
    }

    #[test]
    fn test_document_json_shape() {
        let doc = Document::new("brief.txt", "text/plain", "body".to_string());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["type"], "text/plain");
        assert_eq!(value["isProcessed"], false);
        assert_eq!(value["content"]["kind"], "readable");
        assert!(value.get("error").is_none());
    }
}
