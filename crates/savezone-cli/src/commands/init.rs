use anyhow::Result;
use std::path::Path;

use savezone_core::config::SavezoneConfig;

pub fn run(base_dir: &Path) -> Result<()> {
    println!("Initializing Savezone in {}", base_dir.display());

    std::fs::create_dir_all(base_dir)?;

    let config_path = SavezoneConfig::default_path(base_dir);
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
    } else {
        let config = SavezoneConfig::default_config(base_dir);
        config.save(&config_path)?;
        println!("Created config: {}", config_path.display());
    }

    let config = SavezoneConfig::load(&config_path)?;
    let local_root = config.local_root(base_dir);
    std::fs::create_dir_all(&local_root)?;
    println!("Local storage: {}", local_root.display());

    println!("\nSavezone initialized. Next steps:");
    println!("  1. Run `savezone auth -s yandex` (or `-s gdrive --credentials <file>`)");
    println!("  2. Run `savezone backup <path> -s yandex` to create your first backup");

    Ok(())
}
