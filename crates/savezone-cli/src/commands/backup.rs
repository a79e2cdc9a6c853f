use anyhow::Result;
use std::path::Path;

use savezone_backup::BackupRequest;

use super::{open, spinner};

pub async fn run(
    resource: &Path,
    storage: &str,
    target: Option<&str>,
    overwrite: bool,
    token: Option<&str>,
    base_dir: &Path,
) -> Result<()> {
    let savezone = open(base_dir)?;
    let request = BackupRequest {
        local_path: resource.to_path_buf(),
        remote_path: target.map(str::to_string),
        storage: storage.to_string(),
        token: token.map(str::to_string),
        overwrite,
    };

    let pb = spinner(format!("Backing up {}", resource.display()))?;
    let result = savezone.backup(&request).await;
    pb.finish_and_clear();
    let backup = result?;

    println!("Backup completed:");
    println!("  Source:         {}", backup.path);
    println!("  Storage:        {}", backup.storage);
    if let Some(version) = backup.latest() {
        println!("  Remote path:    {}", version.path);
        if let Some(size) = &version.size {
            println!("  Size:           {size}");
        }
        if target.is_none() {
            let base = savezone.layout().base_directory();
            let id = version
                .path
                .strip_prefix(base)
                .unwrap_or(&version.path)
                .trim_start_matches('/');
            println!();
            println!("Restore with: savezone restore {id} -s {storage}");
        }
    }
    if let Some(url) = &backup.url {
        println!("  Link:           {url}");
    }

    Ok(())
}
