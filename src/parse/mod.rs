//! Reading source files into documents
//!
//! This module handles:
//! - Walking files and directories
//! - Filtering out hidden, empty and unsupported files
//! - Text extraction (UTF-8 text, and PDF with the `pdf` feature)
//!
//! A file that fails to read still becomes a [`Document`], marked unreadable,
//! so the failure is visible to the user rather than silently dropped.

use crate::document::Document;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// How a supported file is turned into text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Text,
    Pdf,
}

const MIME_PDF: &str = "application/pdf";
const MIME_JSON: &str = "application/json";
const MIME_JSONL: &str = "application/jsonl";

/// Detect the content type of a file and whether it can be ingested.
///
/// Accepts PDFs, JSON, JSON Lines and anything `text/*`. PDFs are always
/// accepted; without the `pdf` feature they become unreadable documents.
pub fn detect_kind(path: &Path) -> Option<(SourceKind, String)> {
    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
    if is_jsonl {
        return Some((SourceKind::Text, MIME_JSONL.to_string()));
    }

    let mime = mime_guess::from_path(path).first()?;
    let essence = mime.essence_str();
    match essence {
        MIME_PDF => Some((SourceKind::Pdf, essence.to_string())),
        MIME_JSON => Some((SourceKind::Text, essence.to_string())),
        _ if mime.type_() == mime_guess::mime::TEXT => {
            Some((SourceKind::Text, essence.to_string()))
        }
        _ => None,
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Read one file. Returns `None` for files that are skipped.
pub fn read_file(path: &Path) -> Option<Document> {
    let name = path.file_name()?.to_string_lossy().to_string();
    if is_hidden(&name) {
        return None;
    }

    let Some((kind, content_type)) = detect_kind(path) else {
        debug!("Skipping unsupported file {:?}", path);
        return None;
    };

    match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() && metadata.len() == 0 => {
            debug!("Skipping empty file {:?}", path);
            return None;
        }
        Ok(_) => {}
        Err(e) => return Some(Document::unreadable(name, content_type, e.to_string())),
    }

    match extract_text(path, kind) {
        Ok(text) => Some(Document::new(name, content_type, text)),
        Err(reason) => {
            warn!("Error reading {:?}: {}", path, reason);
            Some(Document::unreadable(name, content_type, reason))
        }
    }
}

fn extract_text(path: &Path, kind: SourceKind) -> std::result::Result<String, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    match kind {
        SourceKind::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        SourceKind::Pdf => extract_pdf(&bytes),
    }
}

#[cfg(feature = "pdf")]
fn extract_pdf(bytes: &[u8]) -> std::result::Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| format!("PDF parse error: {}", e))
}

#[cfg(not(feature = "pdf"))]
fn extract_pdf(_bytes: &[u8]) -> std::result::Result<String, String> {
    Err("PDF support is not enabled in this build".to_string())
}

/// Read every supported file under the given paths, in a stable order.
///
/// Directories are walked recursively; hidden directories are not entered.
pub fn read_paths(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();

    for root in paths {
        if !root.exists() {
            return Err(Error::Read(format!(
                "{}: no such file or directory",
                root.display()
            )));
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_hidden_entry(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(document) = read_file(entry.path()) {
                documents.push(document);
            }
        }
    }

    debug!("Read {} documents", documents.len());
    Ok(documents)
}

fn is_hidden_entry(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(is_hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentContent;
    use std::fs;
    use tempfile::TempDir;

    fn names(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.name.as_str()).collect()
    }

    #[test]
    fn test_detect_kind() {
        assert_eq!(
            detect_kind(Path::new("brief.txt")),
            Some((SourceKind::Text, "text/plain".to_string()))
        );
        assert_eq!(
            detect_kind(Path::new("exhibits.json")),
            Some((SourceKind::Text, MIME_JSON.to_string()))
        );
        assert_eq!(
            detect_kind(Path::new("rows.jsonl")),
            Some((SourceKind::Text, MIME_JSONL.to_string()))
        );
        assert!(detect_kind(Path::new("page.html")).is_some());
        assert!(detect_kind(Path::new("table.csv")).is_some());
        assert_eq!(detect_kind(Path::new("photo.png")), None);
        assert_eq!(detect_kind(Path::new("archive.zip")), None);
        assert_eq!(detect_kind(Path::new("no_extension")), None);
    }

    #[test]
    fn test_pdf_detected() {
        assert_eq!(
            detect_kind(Path::new("opinion.pdf")),
            Some((SourceKind::Pdf, MIME_PDF.to_string()))
        );
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn test_pdf_without_feature_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("opinion.pdf"), b"%PDF-1.4\n").unwrap();

        let documents = read_paths(&[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(names(&documents), vec!["opinion.pdf"]);

        let document = &documents[0];
        assert_eq!(document.content_type, MIME_PDF);
        assert!(!document.is_readable());
        assert!(document.is_processed);
        assert_eq!(
            document.error.as_deref(),
            Some("Error reading file: PDF support is not enabled in this build")
        );
    }

    #[test]
    fn test_read_paths_filters_and_orders() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join("b_brief.txt"), "The court held that...").unwrap();
        fs::write(root.join("a_notes.md"), "# Notes\nDoctrine of laches").unwrap();
        fs::write(root.join(".DS_Store"), "junk").unwrap();
        fs::write(root.join("empty.txt"), "").unwrap();
        fs::write(root.join("scan.png"), [0x89, 0x50, 0x4e, 0x47]).unwrap();
        fs::create_dir(root.join("exhibits")).unwrap();
        fs::write(root.join("exhibits/c.json"), r#"{"exhibit": 1}"#).unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.txt"), "hidden").unwrap();

        let documents = read_paths(&[root.to_path_buf()]).unwrap();
        assert_eq!(names(&documents), vec!["a_notes.md", "b_brief.txt", "c.json"]);

        let brief = &documents[1];
        assert_eq!(brief.content_type, "text/plain");
        assert_eq!(
            brief.content,
            DocumentContent::Readable("The court held that...".to_string())
        );
        assert!(!brief.is_processed);
        assert!(brief.id.starts_with("b_brief.txt-"));
    }

    #[test]
    fn test_read_paths_accepts_single_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("motion.txt");
        fs::write(&file, "Motion to dismiss").unwrap();

        let documents = read_paths(&[file]).unwrap();
        assert_eq!(names(&documents), vec!["motion.txt"]);
    }

    #[test]
    fn test_read_paths_missing_root() {
        let tmp = TempDir::new().unwrap();
        let err = read_paths(&[tmp.path().join("nope")]).unwrap_err();
        assert!(matches!(err, Error::Read(_)));
    }

    #[test]
    fn test_read_failure_becomes_unreadable_document() {
        let tmp = TempDir::new().unwrap();
        // A directory with a text extension passes detection but cannot be read
        let path = tmp.path().join("folder.txt");
        fs::create_dir(&path).unwrap();

        let document = read_file(&path).unwrap();
        assert!(!document.is_readable());
        assert!(document.is_processed);
        assert!(document
            .error
            .as_deref()
            .unwrap()
            .starts_with("Error reading file: "));
    }

    #[test]
    fn test_invalid_utf8_is_read_lossily() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, [b'C', b'a', b'f', 0xe9]).unwrap();

        let document = read_file(&path).unwrap();
        assert!(document.is_readable());
        assert_eq!(document.content.len(), "Caf\u{fffd}".len());
    }
}
