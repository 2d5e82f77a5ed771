//! Instruction preamble sent with every extraction request

use crate::document::Category;

/// Build the system prompt. The category list is generated from the rubric so
/// the prompt and the coercion step can never disagree.
pub fn system_prompt() -> String {
    let categories = Category::RUBRIC
        .iter()
        .enumerate()
        .map(|(i, category)| format!("{}. {}", i + 1, category.label()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"ROLE: Legal data surveyor and research clerk.
TASK: Read the document and extract verbatim snippets into the legal categories below.
OUTPUT FORMAT: Strict JSON only. No markdown. No commentary.

CATEGORIES (STRICT RUBRIC):
{categories}

INSTRUCTIONS:
1. Copy matching passages exactly as written. Do not summarize.
2. When the text refers to an authority loosely (for example 'Rule 11' or 'Roe'), identify it and give the full official citation in "legal_citation".
3. Cover the entire text. Most documents contain snippets for several categories.
4. Only output categories that are actually present.
5. Do not invent categories or cite authorities that do not exist.

JSON SCHEMA:
{{
  "snippets": [
    {{
      "headline": "Brief title of the fact or issue",
      "category": "One of the categories above",
      "content": "Exact verbatim text from the source",
      "legal_citation": "Standard citation (e.g. 384 U.S. 436) or null",
      "relevanceScore": "High" | "Medium" | "Low"
    }}
  ]
}}
"#
    )
}

/// User message carrying the (already truncated) document text
pub fn user_prompt(document_name: &str, content: &str) -> String {
    format!("DOCUMENT NAME: {}\n\nCONTENT:\n{}", document_name, content)
}
