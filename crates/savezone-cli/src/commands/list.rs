use anyhow::Result;
use std::path::Path;

use super::open;

pub async fn run(storage: &str, path: &str, token: Option<&str>, base_dir: &Path) -> Result<()> {
    let savezone = open(base_dir)?;
    let resources = savezone.list_resources(storage, path, token).await?;

    if resources.is_empty() {
        println!("Nothing in {}", if path.is_empty() { "/" } else { path });
        return Ok(());
    }

    println!("{:<5} {:>10} {:<20} NAME", "TYPE", "SIZE", "MODIFIED");
    println!("{}", "-".repeat(72));

    for r in &resources {
        let kind = if r.is_file { "file" } else { "dir" };
        let size = r
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let modified = r
            .updated
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{kind:<5} {size:>10} {modified:<20} {}", r.name);
    }

    Ok(())
}
