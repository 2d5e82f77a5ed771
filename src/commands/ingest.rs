//! Ingest and process command implementations

use super::{open_scheduler, run_until_idle};
use crate::config::Config;
use crate::document::{Document, ProcessingStatus};
use crate::error::Result;
use crate::parse::read_paths;
use crate::scheduler::{Scheduler, SyncStatus};
use crate::store::{DocumentStore, SqliteStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Outcome of a processing run over the whole document set
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessStats {
    pub documents: usize,
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub snippets: usize,
    pub sync_status: Option<SyncStatus>,
    pub failures: Vec<FailureInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureInfo {
    pub id: String,
    pub name: String,
    pub error: String,
}

/// Ingestion statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_read: usize,
    pub documents_added: usize,
    pub unreadable: usize,
    pub processing: Option<ProcessStats>,
}

/// Read files into new documents and, unless `process` is false, analyze
/// everything that is pending
pub async fn cmd_ingest(config: &Config, paths: &[PathBuf], process: bool) -> Result<IngestStats> {
    info!("Reading {} paths", paths.len());
    let documents = read_paths(paths)?;

    let mut stats = IngestStats {
        files_read: documents.len(),
        unreadable: documents.iter().filter(|d| !d.is_readable()).count(),
        ..Default::default()
    };

    if !process {
        stats.documents_added = store_documents(config, &documents).await?;
        return Ok(stats);
    }

    let scheduler = open_scheduler(config).await?;
    stats.documents_added = scheduler.upload(documents);
    run_until_idle(&scheduler).await;
    stats.processing = Some(summarize(&scheduler));
    Ok(stats)
}

/// Persist documents without analyzing them
async fn store_documents(config: &Config, documents: &[Document]) -> Result<usize> {
    let store = SqliteStore::from_config(config);
    let mut added = 0;
    for document in documents.iter().filter(|d| !d.content.is_empty()) {
        store.upsert(document).await?;
        added += 1;
    }
    store.close().await;
    Ok(added)
}

/// Analyze every pending document, including ones reset after transient failures
pub async fn cmd_process(config: &Config) -> Result<ProcessStats> {
    let scheduler = open_scheduler(config).await?;
    let pending = scheduler.snapshot().pending;
    info!("Processing {} pending documents", pending);

    run_until_idle(&scheduler).await;
    Ok(summarize(&scheduler))
}

fn summarize(scheduler: &Scheduler) -> ProcessStats {
    let snapshot = scheduler.snapshot();
    let documents = scheduler.documents();

    let failures = documents
        .iter()
        .filter(|d| scheduler.status(&d.id) == Some(ProcessingStatus::Error))
        .map(|d| FailureInfo {
            id: d.id.clone(),
            name: d.name.clone(),
            error: d.error.clone().unwrap_or_default(),
        })
        .collect();

    ProcessStats {
        documents: documents.len(),
        done: snapshot.done,
        failed: snapshot.error,
        pending: snapshot.pending,
        snippets: documents.iter().map(|d| d.snippets.len()).sum(),
        sync_status: Some(snapshot.sync_status),
        failures,
    }
}

pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n✓ Ingestion complete");
    println!("  Files read: {}", stats.files_read);
    println!("  Documents added: {}", stats.documents_added);
    if stats.unreadable > 0 {
        println!("  Unreadable: {}", stats.unreadable);
    }
    match &stats.processing {
        Some(processing) => print_process_stats(processing),
        None => println!("\nRun 'docket process' to analyze the new documents."),
    }
}

pub fn print_process_stats(stats: &ProcessStats) {
    println!("\n✓ Processing complete");
    println!("  Documents: {}", stats.documents);
    println!("  Done: {}", stats.done);
    println!("  Failed: {}", stats.failed);
    println!("  Snippets: {}", stats.snippets);
    if let Some(sync) = stats.sync_status {
        if sync == SyncStatus::Error {
            println!("  ⚠ Some results could not be saved; they will be retried on the next write");
        }
    }

    if !stats.failures.is_empty() {
        println!("\nFailures:");
        for failure in &stats.failures {
            println!("  ✗ {} ({})", failure.name, failure.id);
            println!("    {}", failure.error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProvidersConfig;
    use tempfile::TempDir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(tmp: &TempDir, endpoint: &str) -> Config {
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().join("docket")));
        config.providers = ProvidersConfig::with_endpoint(endpoint);
        config
    }

    fn write_case_files(tmp: &TempDir) -> PathBuf {
        let dir = tmp.path().join("case");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("brief.txt"), "Under 42 U.S.C. § 1983 ...").unwrap();
        std::fs::write(dir.join("notes.md"), "Laches bars the claim.").unwrap();
        std::fs::write(dir.join("photo.png"), [0x89, 0x50]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_ingest_without_processing_only_stores() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp, "http://127.0.0.1:9/v1/chat/completions");
        let dir = write_case_files(&tmp);

        let stats = cmd_ingest(&config, &[dir], false).await.unwrap();
        assert_eq!(stats.files_read, 2);
        assert_eq!(stats.documents_added, 2);
        assert!(stats.processing.is_none());

        let stored = SqliteStore::from_config(&config).get_all().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|d| !d.is_processed));
    }

    #[tokio::test]
    async fn test_ingest_and_process_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": r#"{"snippets":[
                    {"headline":"Civil rights claim","category":"Statute + Citation",
                     "content":"Under 42 U.S.C. § 1983","legal_citation":"42 U.S.C. § 1983",
                     "relevanceScore":"High"}
                ]}"# } }]
            })))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let endpoint = format!("{}/v1/chat/completions", server.uri());
        let config = test_config(&tmp, &endpoint);
        let dir = write_case_files(&tmp);

        let stats = cmd_ingest(&config, &[dir], true).await.unwrap();
        let processing = stats.processing.unwrap();
        assert_eq!(processing.documents, 2);
        assert_eq!(processing.done, 2);
        assert_eq!(processing.failed, 0);
        assert_eq!(processing.snippets, 2);
        assert_eq!(processing.sync_status, Some(SyncStatus::Synced));

        let stored = SqliteStore::from_config(&config).get_all().await.unwrap();
        assert!(stored.iter().all(|d| d.is_processed && d.snippets.len() == 1));

        // Nothing left for a second run
        let again = cmd_process(&config).await.unwrap();
        assert_eq!(again.done, 2);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_process_records_backend_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": { "message": "Invalid API Key" }
            })))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let endpoint = format!("{}/v1/chat/completions", server.uri());
        let config = test_config(&tmp, &endpoint);
        let dir = write_case_files(&tmp);

        cmd_ingest(&config, &[dir], false).await.unwrap();
        let stats = cmd_process(&config).await.unwrap();

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.failures.len(), 2);
        assert!(stats
            .failures
            .iter()
            .all(|f| f.error.ends_with("Invalid API Key")));
    }
}
