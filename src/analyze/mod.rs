//! Snippet extraction
//!
//! The [`Analyzer`] trait is the seam the scheduler dispatches through.
//! [`AnalysisInvoker`] is the production implementation: it truncates the
//! document to the backend's capacity, bounds the call with a timeout, and
//! turns whatever the backend returns into well-formed [`Snippet`]s.
//! It never retries; a failed attempt is reported to the caller as is.

mod prompt;

pub use prompt::*;

use crate::backend::{BackendDescriptor, ChatClient};
use crate::config::Config;
use crate::document::{Category, GroundingSource, Relevance, ReviewStatus, Snippet};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

const UNTITLED_HEADLINE: &str = "Untitled Extraction";
const MISSING_CONTENT: &str = "No content extracted";

/// Output of one successful analysis pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisOutput {
    pub snippets: Vec<Snippet>,
    pub grounding_sources: Vec<GroundingSource>,
}

/// Trait for snippet extraction providers
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one document with the given backend
    async fn analyze(
        &self,
        content: &str,
        document_id: &str,
        document_name: &str,
        backend: &BackendDescriptor,
    ) -> Result<AnalysisOutput>;
}

/// Analyzer backed by the hosted chat completion providers
pub struct AnalysisInvoker {
    client: ChatClient,
    system_prompt: String,
    timeout: Duration,
}

impl AnalysisInvoker {
    pub fn new(client: ChatClient, timeout: Duration) -> Self {
        Self {
            client,
            system_prompt: system_prompt(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ChatClient::new(&config.providers, config.analysis.temperature)?;
        Ok(Self::new(client, config.scheduler.analysis_timeout()))
    }
}

#[async_trait]
impl Analyzer for AnalysisInvoker {
    async fn analyze(
        &self,
        content: &str,
        document_id: &str,
        document_name: &str,
        backend: &BackendDescriptor,
    ) -> Result<AnalysisOutput> {
        let submitted = truncate_chars(content, backend.input_capacity);
        if submitted.len() < content.len() {
            debug!(
                "Truncated '{}' to {} characters for {}",
                document_name, backend.input_capacity, backend
            );
        }

        info!("Assigning '{}' to {}", document_name, backend);
        let user = user_prompt(document_name, submitted);

        // Dropping the request future on expiry aborts the in-flight call.
        let text = match tokio::time::timeout(
            self.timeout,
            self.client.complete(backend, &self.system_prompt, &user),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
        .inspect_err(|e| warn!("{} failed on '{}': {}", backend, document_name, e))?;

        let snippets = parse_snippets(&text, document_id, document_name)?;
        debug!("{} returned {} snippets for '{}'", backend, snippets.len(), document_name);

        Ok(AnalysisOutput {
            snippets,
            grounding_sources: Vec::new(),
        })
    }
}

/// The first `capacity` characters of `content`
pub fn truncate_chars(content: &str, capacity: usize) -> &str {
    match content.char_indices().nth(capacity) {
        Some((byte_index, _)) => &content[..byte_index],
        None => content,
    }
}

/// Parse a completion body into snippets.
///
/// A body that is not JSON is an error. A JSON body without a `snippets`
/// array is treated as "nothing found".
pub fn parse_snippets(text: &str, document_id: &str, document_name: &str) -> Result<Vec<Snippet>> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::Parse(format!("backend response is not valid JSON: {}", e)))?;

    let Some(records) = value.get("snippets").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let stamp = Utc::now().timestamp_millis();
    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| normalize_snippet(record, index, stamp, document_id, document_name))
        .collect())
}

fn normalize_snippet(
    record: &Value,
    index: usize,
    stamp: i64,
    document_id: &str,
    document_name: &str,
) -> Snippet {
    Snippet {
        id: format!("{}-snip-{}-{}", document_id, index, stamp),
        source_doc_id: document_id.to_string(),
        source_doc_name: document_name.to_string(),
        headline: text_field(record, "headline")
            .unwrap_or(UNTITLED_HEADLINE)
            .to_string(),
        category: Category::coerce(text_field(record, "category")),
        content: text_field(record, "content")
            .unwrap_or(MISSING_CONTENT)
            .to_string(),
        legal_citation: text_field(record, "legal_citation").map(str::to_string),
        relevance_score: Relevance::coerce(text_field(record, "relevanceScore")),
        status: ReviewStatus::Pending,
    }
}

/// Non-empty string field, if present
fn text_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
