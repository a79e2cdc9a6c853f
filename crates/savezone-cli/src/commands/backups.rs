use anyhow::Result;
use std::path::Path;

use super::open;

pub async fn run(storage: &str, token: Option<&str>, base_dir: &Path) -> Result<()> {
    let savezone = open(base_dir)?;
    let backups = savezone.get_backups(storage, token).await?;

    if backups.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    let base = savezone.layout().base_directory();
    for backup in &backups {
        println!("{} ({})", backup.name, backup.path);
        for version in &backup.versions {
            let size = version
                .size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            let id = version
                .path
                .strip_prefix(base)
                .unwrap_or(&version.path)
                .trim_start_matches('/');
            println!("  {:<14} {:>10}  {}", version.name, size, id);
        }
    }
    println!();
    println!("{} backup(s) on {}", backups.len(), backups[0].storage);

    Ok(())
}
