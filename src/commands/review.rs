//! Snippet review commands

use crate::document::{Category, Snippet};
use crate::error::{Error, Result};
use crate::scheduler::Scheduler;

/// Approve a snippet and return it as stored
pub async fn cmd_approve(scheduler: &Scheduler, snippet_id: &str) -> Result<Snippet> {
    let document = scheduler.approve_snippet(snippet_id).await?;
    find(document.snippets, snippet_id)
}

/// Move a snippet to another category. `category` is parsed case-insensitively.
pub async fn cmd_recategorize(
    scheduler: &Scheduler,
    snippet_id: &str,
    category: &str,
) -> Result<Snippet> {
    let category: Category = category.parse()?;
    let document = scheduler.recategorize_snippet(snippet_id, category).await?;
    find(document.snippets, snippet_id)
}

fn find(snippets: Vec<Snippet>, snippet_id: &str) -> Result<Snippet> {
    snippets
        .into_iter()
        .find(|s| s.id == snippet_id)
        .ok_or_else(|| Error::SnippetNotFound(snippet_id.to_string()))
}

pub fn print_snippet_update(snippet: &Snippet) {
    println!(
        "✓ {} [{}] {}",
        snippet.headline, snippet.category, snippet.status
    );
    println!("  ID: {}", snippet.id);
}
