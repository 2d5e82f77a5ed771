//! In-memory [`DocumentStore`] for tests and embedding hosts.

use super::DocumentStore;
use crate::document::Document;
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Documents kept in a `Vec` so insertion order is preserved.
#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store preloaded with documents, as if a previous session saved them
    pub fn with_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self) -> Result<Vec<Document>> {
        Ok(self.docs.read().clone())
    }

    async fn upsert(&self, document: &Document) -> Result<()> {
        let mut docs = self.docs.write();
        match docs.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => docs.push(document.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.docs.write().retain(|d| d.id != id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.docs.write().clear();
        Ok(())
    }
}
