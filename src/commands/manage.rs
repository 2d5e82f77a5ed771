//! Remove, clear and export commands

use crate::document::Document;
use crate::error::Result;
use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON archive written by `docket export`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArchive {
    pub exported_at: DateTime<Utc>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    pub path: PathBuf,
    pub documents: usize,
    pub snippets: usize,
}

/// Remove one document and everything extracted from it
pub async fn cmd_remove(scheduler: &Scheduler, id: &str) -> Result<()> {
    info!("Removing document {}", id);
    scheduler.delete(id).await
}

/// Remove every document. Returns how many there were.
pub async fn cmd_clear(scheduler: &Scheduler) -> Result<usize> {
    let count = scheduler.documents().len();
    info!("Clearing {} documents", count);
    scheduler.clear_all().await?;
    Ok(count)
}

/// Write all documents to a JSON file
pub fn cmd_export(scheduler: &Scheduler, path: &Path) -> Result<ExportStats> {
    let archive = ExportArchive {
        exported_at: Utc::now(),
        documents: scheduler.documents(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, serde_json::to_string_pretty(&archive)?)?;
    info!("Exported {} documents to {:?}", archive.documents.len(), path);

    Ok(ExportStats {
        path: path.to_path_buf(),
        documents: archive.documents.len(),
        snippets: archive.documents.iter().map(|d| d.snippets.len()).sum(),
    })
}

pub fn print_export_stats(stats: &ExportStats) {
    println!("✓ Exported to {}", stats.path.display());
    println!("  Documents: {}", stats.documents);
    println!("  Snippets: {}", stats.snippets);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{AnalysisOutput, Analyzer};
    use crate::backend::BackendDescriptor;
    use crate::config::default_backends;
    use crate::error::Error;
    use crate::store::{DocumentStore, MemoryStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

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

    async fn setup(documents: Vec<Document>) -> (Scheduler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_documents(documents));
        let scheduler =
            Scheduler::new(store.clone(), Arc::new(NoAnalyzer), default_backends(), 7).unwrap();
        scheduler.load().await.unwrap();
        (scheduler, store)
    }

    fn processed(name: &str) -> Document {
        let mut doc = Document::new(name, "text/plain", "body".to_string());
        doc.is_processed = true;
        doc
    }

    #[tokio::test]
    async fn test_export_round_trips_documents() {
        let tmp = TempDir::new().unwrap();
        let (scheduler, _store) = setup(vec![processed("a.txt"), processed("b.txt")]).await;

        let path = tmp.path().join("out/archive.json");
        let stats = cmd_export(&scheduler, &path).unwrap();
        assert_eq!(stats.documents, 2);

        let archive: ExportArchive =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(archive.documents, scheduler.documents());
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let a = processed("a.txt");
        let (scheduler, store) = setup(vec![a.clone(), processed("b.txt")]).await;

        cmd_remove(&scheduler, &a.id).await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 1);
        assert!(cmd_remove(&scheduler, &a.id).await.is_err());

        assert_eq!(cmd_clear(&scheduler).await.unwrap(), 1);
        assert!(store.is_empty());
    }
}
