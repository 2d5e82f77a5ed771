//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::store::{DocumentStore, SqliteStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Where init put things
#[derive(Debug, Clone, Serialize)]
pub struct InitInfo {
    pub base_dir: PathBuf,
    pub config_path: PathBuf,
    pub db_path: PathBuf,
    pub backends: usize,
}

/// Write a default config and create the document database
pub async fn cmd_init(base_dir: Option<PathBuf>, force: bool) -> Result<InitInfo> {
    let mut config = Config::default();
    config.init_paths(base_dir);

    if config.is_initialized() && !force {
        return Err(Error::AlreadyInitialized(
            config.paths.config_file.display().to_string(),
        ));
    }

    config.validate()?;
    config.save()?;
    info!("Created config at {:?}", config.paths.config_file);

    // Opening the store creates the file and schema
    let store = SqliteStore::from_config(&config);
    store.get_all().await?;
    info!("Created database at {:?}", store.path());
    store.close().await;

    Ok(InitInfo {
        base_dir: config.paths.base_dir.clone(),
        config_path: config.paths.config_file.clone(),
        db_path: config.paths.db_file.clone(),
        backends: config.backends.len(),
    })
}

pub fn print_init(info: &InitInfo) {
    println!("✓ Initialized docket at {}", info.base_dir.display());
    println!("\nConfiguration: {}", info.config_path.display());
    println!("Database: {}", info.db_path.display());
    println!("Backends in rotation: {}", info.backends);
    println!("\nNext steps:");
    println!("  export GROQ_API_KEY=... MISTRAL_API_KEY=... CODESTRAL_API_KEY=...");
    println!("  docket ingest ./path/to/case-files    # Read and analyze documents");
    println!("  docket list                           # Review progress");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("docket");

        let info = cmd_init(Some(base.clone()), false).await.unwrap();
        assert!(info.config_path.exists());
        assert!(info.db_path.exists());
        assert_eq!(info.backends, 7);

        let loaded = Config::load(&info.config_path).unwrap();
        assert_eq!(loaded.scheduler.max_concurrency, 7);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_path_buf();

        cmd_init(Some(base.clone()), false).await.unwrap();
        let err = cmd_init(Some(base.clone()), false).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized(_)));

        cmd_init(Some(base), true).await.unwrap();
    }
}
