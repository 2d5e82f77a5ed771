//! Processing scheduler
//!
//! Holds the working copy of every document, picks the next eligible one,
//! bounds how many are analyzed at once, rotates backends across dispatches,
//! and commits each outcome to the [`DocumentStore`].
//!
//! All claim decisions happen under one lock, so a document can never be
//! claimed twice. Each claimed document runs as its own tokio task holding a
//! semaphore permit; the permit and the claim are released together when the
//! task finishes, whatever the outcome.

use crate::analyze::Analyzer;
use crate::backend::{BackendDescriptor, BackendRotation};
use crate::config::Config;
use crate::document::{
    Category, Document, DocumentContent, ProcessingStatus, ReviewStatus, Snippet,
};
use crate::error::{Error, Result};
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Recorded on documents whose content could not be read
pub const SKIPPED_MESSAGE: &str = "Skipping analysis due to file read error.";

/// Error fragments that mark a failure as transient. Documents carrying one
/// are reset to pending when the scheduler loads.
const TRANSIENT_SIGNATURES: [&str; 2] = ["decommissioned", "Rate limit"];

/// Health of the most recent persistence activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Synced,
    Syncing,
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Synced => write!(f, "synced"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// Aggregate state published after every transition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerSnapshot {
    pub active_workers: usize,
    pub pending: usize,
    pub processing: usize,
    pub done: usize,
    pub error: usize,
    pub sync_status: SyncStatus,
    pub last_saved: Option<DateTime<Utc>>,
}

impl SchedulerSnapshot {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.done + self.error
    }

    /// Nothing running, nothing waiting, nothing being written
    pub fn is_idle(&self) -> bool {
        self.active_workers == 0 && self.pending == 0 && self.sync_status != SyncStatus::Syncing
    }
}

#[derive(Default)]
struct SchedulerState {
    documents: Vec<Document>,
    statuses: HashMap<String, ProcessingStatus>,
    /// Documents a worker currently owns
    claimed: HashSet<String>,
    /// Uploaded documents whose initial commit has not resolved yet
    staged: HashSet<String>,
    commits_in_flight: usize,
    commit_failed: bool,
    sync_status: SyncStatus,
    last_saved: Option<DateTime<Utc>>,
}

impl SchedulerState {
    fn status(&self, id: &str) -> ProcessingStatus {
        self.statuses
            .get(id)
            .copied()
            .unwrap_or(ProcessingStatus::Pending)
    }

    fn is_pending(&self, document: &Document) -> bool {
        !document.is_processed && self.status(&document.id) == ProcessingStatus::Pending
    }

    fn is_eligible(&self, document: &Document) -> bool {
        self.is_pending(document)
            && !self.claimed.contains(&document.id)
            && !self.staged.contains(&document.id)
    }

    fn contains(&self, id: &str) -> bool {
        self.documents.iter().any(|d| d.id == id)
    }

    fn begin_commit(&mut self) {
        self.commits_in_flight += 1;
        self.sync_status = SyncStatus::Syncing;
    }

    fn end_commit(&mut self, succeeded: bool) {
        self.commits_in_flight = self.commits_in_flight.saturating_sub(1);
        if succeeded {
            self.last_saved = Some(Utc::now());
        } else {
            self.commit_failed = true;
        }
        if self.commits_in_flight == 0 {
            self.sync_status = if self.commit_failed {
                SyncStatus::Error
            } else {
                SyncStatus::Synced
            };
            self.commit_failed = false;
        }
    }

    fn snapshot(&self) -> SchedulerSnapshot {
        let mut snapshot = SchedulerSnapshot {
            active_workers: self.claimed.len(),
            sync_status: self.sync_status,
            last_saved: self.last_saved,
            ..Default::default()
        };
        for document in &self.documents {
            match self.status(&document.id) {
                ProcessingStatus::Pending if document.is_processed => {}
                ProcessingStatus::Pending => snapshot.pending += 1,
                ProcessingStatus::Processing => snapshot.processing += 1,
                ProcessingStatus::Done => snapshot.done += 1,
                ProcessingStatus::Error => snapshot.error += 1,
            }
        }
        snapshot
    }
}

struct Inner {
    store: Arc<dyn DocumentStore>,
    analyzer: Arc<dyn Analyzer>,
    rotation: BackendRotation,
    slots: Arc<Semaphore>,
    state: Mutex<SchedulerState>,
    snapshot: watch::Sender<SchedulerSnapshot>,
}

impl Inner {
    fn publish(&self, state: &SchedulerState) {
        self.snapshot.send_replace(state.snapshot());
    }
}

/// Ownership of one document by one worker. Dropping it frees the slot.
struct Claim {
    inner: Arc<Inner>,
    id: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.claimed.remove(&self.id);
        // Released under the lock so the claimed set and the permit count
        // never disagree from the dispatcher's point of view.
        self.permit.take();
    }
}

struct Job {
    document: Document,
    backend: Option<BackendDescriptor>,
    claim: Claim,
}

/// Bounded-concurrency document processing scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        analyzer: Arc<dyn Analyzer>,
        backends: Vec<BackendDescriptor>,
        max_concurrency: usize,
    ) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(Error::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        let rotation = BackendRotation::new(backends)?;
        let (snapshot, _) = watch::channel(SchedulerSnapshot::default());

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                analyzer,
                rotation,
                slots: Arc::new(Semaphore::new(max_concurrency)),
                state: Mutex::new(SchedulerState::default()),
                snapshot,
            }),
        })
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn DocumentStore>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Result<Self> {
        Self::new(
            store,
            analyzer,
            config.backends.clone(),
            config.scheduler.max_concurrency,
        )
    }

    /// Load every stored document and rebuild statuses.
    ///
    /// Documents that failed with a transient error are reset to pending in
    /// memory only; they are persisted again once they are reprocessed.
    pub async fn load(&self) -> Result<usize> {
        let stored = match self.inner.store.get_all().await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Could not load documents from the store: {}", e);
                let mut state = self.inner.state.lock();
                state.sync_status = SyncStatus::Error;
                self.inner.publish(&state);
                return Err(e);
            }
        };

        let (documents, reset) = reconcile(stored);
        if reset > 0 {
            info!("Reset {} documents with transient failures to pending", reset);
        }

        let mut state = self.inner.state.lock();
        state.statuses = documents
            .iter()
            .map(|d| (d.id.clone(), d.derived_status()))
            .collect();
        state.documents = documents;
        state.sync_status = SyncStatus::Synced;
        state.last_saved = Some(Utc::now());
        self.inner.publish(&state);

        debug!("Loaded {} documents", state.documents.len());
        Ok(state.documents.len())
    }

    /// Add freshly read documents. Empty documents are dropped.
    ///
    /// Returns immediately with the number accepted. The documents are
    /// committed in the background and each becomes eligible for analysis
    /// once its own write resolves. Must be called within a tokio runtime.
    pub fn upload(&self, documents: Vec<Document>) -> usize {
        let accepted: Vec<Document> = documents
            .into_iter()
            .filter(|d| !d.content.is_empty())
            .collect();
        if accepted.is_empty() {
            return 0;
        }

        {
            let mut state = self.inner.state.lock();
            for document in &accepted {
                let status = if document.is_readable() {
                    ProcessingStatus::Pending
                } else {
                    ProcessingStatus::Error
                };
                state.statuses.insert(document.id.clone(), status);
                state.staged.insert(document.id.clone());
                state.documents.push(document.clone());
            }
            state.begin_commit();
            self.inner.publish(&state);
        }

        let count = accepted.len();
        info!("Uploaded {} documents", count);

        let scheduler = self.clone();
        tokio::spawn(async move {
            let mut succeeded = true;
            for document in &accepted {
                let present = scheduler.inner.state.lock().contains(&document.id);
                if present {
                    if let Err(e) = scheduler.persist(document).await {
                        warn!("Failed to persist '{}': {}", document.name, e);
                        succeeded = false;
                    }
                }
                {
                    let mut state = scheduler.inner.state.lock();
                    state.staged.remove(&document.id);
                    scheduler.inner.publish(&state);
                }
                scheduler.dispatch();
            }

            let mut state = scheduler.inner.state.lock();
            state.end_commit(succeeded);
            scheduler.inner.publish(&state);
        });

        count
    }

    /// Claim as many eligible documents as there are free slots and spawn a
    /// worker for each. Returns the number of documents claimed.
    pub fn dispatch(&self) -> usize {
        let mut jobs = Vec::new();
        {
            let mut state = self.inner.state.lock();
            loop {
                let Some(index) = state.documents.iter().position(|d| state.is_eligible(d)) else {
                    break;
                };
                let Ok(permit) = self.inner.slots.clone().try_acquire_owned() else {
                    break;
                };

                let document = state.documents[index].clone();
                state.claimed.insert(document.id.clone());
                state
                    .statuses
                    .insert(document.id.clone(), ProcessingStatus::Processing);

                // Unreadable documents never reach a backend, so they do not
                // take a turn in the rotation.
                let backend = document
                    .is_readable()
                    .then(|| self.inner.rotation.next().1.clone());

                jobs.push(Job {
                    claim: Claim {
                        inner: self.inner.clone(),
                        id: document.id.clone(),
                        permit: Some(permit),
                    },
                    document,
                    backend,
                });
            }
            self.inner.publish(&state);
        }

        let claimed = jobs.len();
        for job in jobs {
            let scheduler = self.clone();
            tokio::spawn(async move { scheduler.process(job).await });
        }
        claimed
    }

    async fn process(self, job: Job) {
        let Job {
            mut document,
            backend,
            claim,
        } = job;

        let outcome = match (&document.content, &backend) {
            (DocumentContent::Readable(text), Some(backend)) => {
                self.inner
                    .analyzer
                    .analyze(text, &document.id, &document.name, backend)
                    .await
            }
            _ => Err(Error::Skipped(SKIPPED_MESSAGE.to_string())),
        };

        let status = match outcome {
            Ok(output) => {
                info!(
                    "Extracted {} snippets from '{}'",
                    output.snippets.len(),
                    document.name
                );
                document.snippets = output.snippets;
                document.grounding_sources = Some(output.grounding_sources);
                document.is_processed = true;
                document.error = None;
                ProcessingStatus::Done
            }
            Err(e) => {
                warn!("Worker failed for '{}': {}", document.name, e);
                document.error = Some(e.to_string());
                document.is_processed = true;
                ProcessingStatus::Error
            }
        };

        let present = self.inner.state.lock().contains(&document.id);
        if present {
            // A failed commit leaves the in-memory result in place.
            let _ = self.commit(self.persist(&document)).await;
            self.record_outcome(document, status);
        } else {
            debug!("'{}' was removed while processing; discarding result", document.name);
        }

        drop(claim);
        self.dispatch();
    }

    /// Replace the working copy with a finished document and publish the
    /// new counts. A document removed in the meantime stays removed.
    fn record_outcome(&self, document: Document, status: ProcessingStatus) {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;
        if let Some(slot) = state.documents.iter_mut().find(|d| d.id == document.id) {
            state.statuses.insert(document.id.clone(), status);
            *slot = document;
        }
        self.inner.publish(state);
    }

    /// Upsert a document that is still tracked. If it is removed while the
    /// write is in flight, the removal is replayed against the store once
    /// the write settles.
    async fn persist(&self, document: &Document) -> Result<()> {
        let result = self.inner.store.upsert(document).await;

        let present = self.inner.state.lock().contains(&document.id);
        if !present {
            debug!("'{}' was removed during its write; deleting it again", document.name);
            return self.inner.store.delete(&document.id).await;
        }
        result
    }

    /// Run one store operation, tracking it in the sync status
    async fn commit(&self, operation: impl Future<Output = Result<()>>) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            state.begin_commit();
            self.inner.publish(&state);
        }

        let result = operation.await;
        if let Err(e) = &result {
            warn!("Document store commit failed: {}", e);
        }

        let mut state = self.inner.state.lock();
        state.end_commit(result.is_ok());
        self.inner.publish(&state);
        result
    }

    /// Remove a document. An in-flight analysis of it is discarded.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let present = self.inner.state.lock().contains(id);
        if !present {
            return Err(Error::DocumentNotFound(id.to_string()));
        }

        let result = self.commit(self.inner.store.delete(id)).await;

        let mut state = self.inner.state.lock();
        state.documents.retain(|d| d.id != id);
        state.statuses.remove(id);
        state.staged.remove(id);
        self.inner.publish(&state);
        result
    }

    /// Remove every document
    pub async fn clear_all(&self) -> Result<()> {
        let result = self.commit(self.inner.store.clear()).await;

        let mut state = self.inner.state.lock();
        state.documents.clear();
        state.statuses.clear();
        state.staged.clear();
        self.inner.publish(&state);
        result
    }

    /// Replace the working copy of a document and persist it
    pub async fn update_document(&self, document: Document) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.documents.iter_mut().find(|d| d.id == document.id) else {
                return Err(Error::DocumentNotFound(document.id));
            };
            *slot = document.clone();
        }
        self.commit(self.inner.store.upsert(&document)).await
    }

    /// Mark a snippet as reviewed and approved
    pub async fn approve_snippet(&self, snippet_id: &str) -> Result<Document> {
        self.edit_snippet(snippet_id, |snippet| snippet.status = ReviewStatus::Approved)
            .await
    }

    /// Move a snippet into another category
    pub async fn recategorize_snippet(
        &self,
        snippet_id: &str,
        category: Category,
    ) -> Result<Document> {
        self.edit_snippet(snippet_id, |snippet| snippet.category = category)
            .await
    }

    async fn edit_snippet<F>(&self, snippet_id: &str, edit: F) -> Result<Document>
    where
        F: FnOnce(&mut Snippet),
    {
        let mut document = self
            .inner
            .state
            .lock()
            .documents
            .iter()
            .find(|d| d.snippets.iter().any(|s| s.id == snippet_id))
            .cloned()
            .ok_or_else(|| Error::SnippetNotFound(snippet_id.to_string()))?;

        if let Some(snippet) = document.find_snippet_mut(snippet_id) {
            edit(snippet);
        }
        self.update_document(document.clone()).await?;
        Ok(document)
    }

    pub fn status(&self, id: &str) -> Option<ProcessingStatus> {
        self.inner.state.lock().statuses.get(id).copied()
    }

    pub fn error(&self, id: &str) -> Option<String> {
        self.inner
            .state
            .lock()
            .documents
            .iter()
            .find(|d| d.id == id)
            .and_then(|d| d.error.clone())
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.inner
            .state
            .lock()
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Working copies of all documents, in upload order
    pub fn documents(&self) -> Vec<Document> {
        self.inner.state.lock().documents.clone()
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Dispatch pending work and wait until the scheduler is idle
    pub async fn wait_idle(&self) {
        let mut receiver = self.subscribe();
        self.dispatch();
        // The sender lives as long as `self`, so this only returns once idle.
        let _ = receiver.wait_for(SchedulerSnapshot::is_idle).await;
    }
}

/// Whether an error message marks a failure worth retrying automatically
pub fn is_transient_failure(message: &str) -> bool {
    TRANSIENT_SIGNATURES
        .iter()
        .any(|signature| message.contains(signature))
}

/// Reset documents that failed transiently back to pending.
/// Returns the documents and how many were reset.
pub fn reconcile(documents: Vec<Document>) -> (Vec<Document>, usize) {
    let mut reset = 0;
    let documents = documents
        .into_iter()
        .map(|mut document| {
            if document.error.as_deref().is_some_and(is_transient_failure) {
                debug!("Resetting '{}' to pending", document.name);
                document.is_processed = false;
                document.error = None;
                reset += 1;
            }
            document
        })
        .collect();
    (documents, reset)
}
