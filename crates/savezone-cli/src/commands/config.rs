use anyhow::Result;
use std::path::Path;

use savezone_core::config::SavezoneConfig;
use savezone_core::config::credentials::TokenStore;
use savezone_storage::registry::StorageRegistry;

use super::{load_config, token_store};

pub fn run(base_dir: &Path) -> Result<()> {
    let config_path = SavezoneConfig::default_path(base_dir);
    let config = load_config(base_dir)?;
    let store = token_store(&config, base_dir);

    if config_path.exists() {
        println!("Config: {}", config_path.display());
    } else {
        println!("Config: {} (not created, using defaults)", config_path.display());
    }
    println!();
    println!("  Base directory: {}", config.savezone.base_directory);
    println!(
        "  Custom targets: {}{}",
        config.savezone.base_directory, config.savezone.custom_suffix
    );
    println!("  Restore dir:    {}", config.savezone.restore_dir);
    println!("  Scratch dir:    {}", config.scratch_dir().display());
    println!("  Token store:    {}", store.path().display());
    println!("  Local root:     {}", config.local_root(base_dir).display());
    println!();

    let registry = StorageRegistry::with_defaults(&config, base_dir);
    println!("  Storages ({}):", registry.entries().len());
    for entry in registry.entries() {
        let authorized = if !entry.requires_token() {
            "n/a"
        } else if store.get(entry.key)?.is_some() {
            "yes"
        } else {
            "no"
        };
        println!(
            "    - {} ({}; aliases: {}; auth: {}; token: {})",
            entry.key,
            entry.display_name,
            entry.synonyms.join(", "),
            entry.auth,
            authorized
        );
    }

    Ok(())
}
