//! SQLite schema definition

/// SQL schema for the document database.
///
/// Each row holds one whole serialized document; `rowid` keeps insertion order.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    data_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
