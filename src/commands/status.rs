//! Status, list and show command implementations

use crate::config::Config;
use crate::document::{Category, Document, ProcessingStatus, ReviewStatus};
use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, SchedulerSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub max_concurrency: usize,
    pub backends: Vec<String>,
    pub documents: SchedulerSnapshot,
    pub snippets: usize,
    pub approved: usize,
}

/// Get system status
pub fn cmd_status(config: &Config, scheduler: &Scheduler) -> StatusInfo {
    info!("Getting status");

    let documents = scheduler.documents();
    let snippets = documents.iter().flat_map(|d| &d.snippets);

    StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        max_concurrency: config.scheduler.max_concurrency,
        backends: config.backends.iter().map(|b| b.to_string()).collect(),
        documents: scheduler.snapshot(),
        snippets: snippets.clone().count(),
        approved: snippets
            .filter(|s| s.status == ReviewStatus::Approved)
            .count(),
    }
}

/// One row of the document list
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub status: ProcessingStatus,
    pub snippets: usize,
    pub error: Option<String>,
}

/// List documents, optionally only those in one status
pub fn cmd_list(scheduler: &Scheduler, filter: Option<ProcessingStatus>) -> Vec<DocumentSummary> {
    scheduler
        .documents()
        .into_iter()
        .filter_map(|d| {
            let status = scheduler.status(&d.id).unwrap_or_else(|| d.derived_status());
            if filter.is_some_and(|wanted| wanted != status) {
                return None;
            }
            Some(DocumentSummary {
                status,
                snippets: d.snippets.len(),
                id: d.id,
                name: d.name,
                content_type: d.content_type,
                error: d.error,
            })
        })
        .collect()
}

/// Fetch one document with all of its snippets
pub fn cmd_show(scheduler: &Scheduler, id: &str) -> Result<Document> {
    scheduler
        .document(id)
        .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 docket Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nBackends ({} concurrent):", status.max_concurrency);
    for backend in &status.backends {
        println!("  • {}", backend);
    }

    let docs = &status.documents;
    println!("\nDocuments: {}", docs.total());
    println!("  Pending: {}", docs.pending);
    println!("  Done: {}", docs.done);
    println!("  Failed: {}", docs.error);
    println!("\nSnippets: {} ({} approved)", status.snippets, status.approved);
    println!("Sync: {}", docs.sync_status);
    if let Some(saved) = docs.last_saved {
        println!("Last saved: {}", saved.to_rfc3339());
    }
}

/// Print document list to console
pub fn print_documents(documents: &[DocumentSummary]) {
    if documents.is_empty() {
        println!("No documents. Use 'docket ingest' to add some.");
        return;
    }

    for doc in documents {
        let marker = match doc.status {
            ProcessingStatus::Done => "✓",
            ProcessingStatus::Error => "✗",
            ProcessingStatus::Processing => "…",
            ProcessingStatus::Pending => "○",
        };
        println!("{} {} [{}] {} snippets", marker, doc.name, doc.status, doc.snippets);
        println!("  ID: {}", doc.id);
        if let Some(error) = &doc.error {
            println!("  Error: {}", error);
        }
    }
}

/// Print a document's snippets grouped by category, rubric order first
pub fn print_document(document: &Document) {
    println!("\n📄 {} ({})", document.name, document.id);
    println!("Type: {}", document.content_type);
    println!("Status: {}", document.derived_status());
    if let Some(error) = &document.error {
        println!("Error: {}", error);
    }

    let mut grouped: BTreeMap<usize, (Category, Vec<_>)> = BTreeMap::new();
    for snippet in &document.snippets {
        let order = Category::RUBRIC
            .iter()
            .position(|c| *c == snippet.category)
            .unwrap_or(Category::RUBRIC.len());
        grouped
            .entry(order)
            .or_insert_with(|| (snippet.category, Vec::new()))
            .1
            .push(snippet);
    }

    for (category, snippets) in grouped.values() {
        println!("\n## {}", category);
        for snippet in snippets {
            let approved = if snippet.status == ReviewStatus::Approved {
                " ✓"
            } else {
                ""
            };
            println!("\n• {} [{}]{}", snippet.headline, snippet.relevance_score, approved);
            println!("  ID: {}", snippet.id);
            if let Some(citation) = &snippet.legal_citation {
                println!("  Citation: {}", citation);
            }
            println!("  \"{}\"", snippet.content);
        }
    }

    if let Some(sources) = &document.grounding_sources {
        if !sources.is_empty() {
            println!("\nSources:");
            for source in sources {
                println!("  {} <{}>", source.title, source.url);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{AnalysisOutput, Analyzer};
    use crate::backend::BackendDescriptor;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct NoAnalyzer;

    #[async_trait]
    impl Analyzer for NoAnalyzer {
        async fn analyze(
            &self,
            _content: &str,
            _document_id: &str,
            _document_name: &str,
            _backend: &BackendDescriptor,
        ) -> Result<AnalysisOutput> {
            Err(Error::Other("not used".to_string()))
        }
    }

    async fn loaded_scheduler(documents: Vec<Document>) -> Scheduler {
        let config = Config::default();
        let scheduler = Scheduler::from_config(
            &config,
            Arc::new(MemoryStore::with_documents(documents)),
            Arc::new(NoAnalyzer),
        )
        .unwrap();
        scheduler.load().await.unwrap();
        scheduler
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let pending = Document::new("a.txt", "text/plain", "x".to_string());
        let failed = Document::unreadable("b.pdf", "application/pdf", "corrupt".to_string());
        let scheduler = loaded_scheduler(vec![pending.clone(), failed.clone()]).await;

        let all = cmd_list(&scheduler, None);
        assert_eq!(all.len(), 2);

        let errors = cmd_list(&scheduler, Some(ProcessingStatus::Error));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, failed.id);

        let waiting = cmd_list(&scheduler, Some(ProcessingStatus::Pending));
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].name, "a.txt");
    }

    #[tokio::test]
    async fn test_status_and_show() {
        let doc = Document::new("a.txt", "text/plain", "x".to_string());
        let scheduler = loaded_scheduler(vec![doc.clone()]).await;

        let status = cmd_status(&Config::default(), &scheduler);
        assert_eq!(status.documents.pending, 1);
        assert_eq!(status.backends.len(), 7);
        assert_eq!(status.snippets, 0);

        assert_eq!(cmd_show(&scheduler, &doc.id).unwrap(), doc);
        assert!(matches!(
            cmd_show(&scheduler, "missing"),
            Err(Error::DocumentNotFound(_))
        ));
    }
}
