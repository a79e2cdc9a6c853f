pub mod auth;
pub mod backup;
pub mod backups;
pub mod config;
pub mod init;
pub mod list;
pub mod meta;
pub mod restore;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use savezone_backup::Savezone;
use savezone_core::config::SavezoneConfig;
use savezone_core::config::credentials::FileTokenStore;
use savezone_storage::http::ReqwestTransport;
use savezone_storage::registry::StorageRegistry;

/// Effective configuration: the config file when present, defaults otherwise.
pub fn load_config(base_dir: &Path) -> Result<SavezoneConfig> {
    let config_path = SavezoneConfig::default_path(base_dir);
    let config = SavezoneConfig::load_or_default(&config_path)?;
    tracing::debug!(path = %config_path.display(), exists = config_path.exists(), "configuration loaded");
    Ok(config)
}

pub fn token_store(config: &SavezoneConfig, base_dir: &Path) -> FileTokenStore {
    FileTokenStore::new(&config.token_store_path(base_dir))
}

/// Orchestrator wired to the real HTTP client and the on-disk token store.
pub fn open(base_dir: &Path) -> Result<Savezone> {
    let config = load_config(base_dir)?;
    let store = Arc::new(token_store(&config, base_dir));
    let registry = StorageRegistry::with_defaults(&config, base_dir);
    Ok(Savezone::new(registry, store, Arc::new(ReqwestTransport::new())))
}

pub fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
