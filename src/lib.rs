//! docket - extract categorized legal snippets from case files
//!
//! This crate provides:
//! - Readers that turn text, JSON and (optionally) PDF files into documents
//! - A bounded worker pool that rotates documents across LLM backends
//! - A SQLite document store with review actions over extracted snippets

pub mod analyze;
pub mod backend;
pub mod commands;
pub mod config;
pub mod document;
pub mod error;
pub mod parse;
pub mod progress;
pub mod scheduler;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
