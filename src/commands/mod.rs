//! CLI commands implementation

pub mod ingest;
pub mod init;
pub mod manage;
pub mod review;
pub mod status;

pub use ingest::*;
pub use init::*;
pub use manage::*;
pub use review::*;
pub use status::*;

use crate::analyze::AnalysisInvoker;
use crate::config::Config;
use crate::error::Result;
use crate::progress::{add_progress_bar, follow_scheduler};
use crate::scheduler::Scheduler;
use crate::store::SqliteStore;
use std::sync::Arc;
use tracing::debug;

/// Build a scheduler over the configured SQLite store and backends, and load
/// the stored documents into it
pub async fn open_scheduler(config: &Config) -> Result<Scheduler> {
    let store = Arc::new(SqliteStore::from_config(config));
    let analyzer = Arc::new(AnalysisInvoker::from_config(config)?);
    let scheduler = Scheduler::from_config(config, store, analyzer)?;

    let loaded = scheduler.load().await?;
    debug!("Scheduler loaded {} documents", loaded);
    Ok(scheduler)
}

/// Drive the scheduler until it has nothing left to do, showing progress
pub async fn run_until_idle(scheduler: &Scheduler) {
    let bar = add_progress_bar(0);
    let follower = follow_scheduler(scheduler.subscribe(), bar);
    scheduler.wait_idle().await;
    let _ = follower.await;
}
