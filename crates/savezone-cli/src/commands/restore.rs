use anyhow::Result;
use std::path::Path;

use savezone_backup::RestoreRequest;

use super::{open, spinner};

pub async fn run(
    resource_id: &str,
    storage: &str,
    target: Option<&Path>,
    token: Option<&str>,
    base_dir: &Path,
) -> Result<()> {
    let savezone = open(base_dir)?;
    let request = RestoreRequest {
        remote_path: resource_id.to_string(),
        storage: storage.to_string(),
        target: target.map(Path::to_path_buf),
        token: token.map(str::to_string),
    };

    let pb = spinner(format!("Restoring {resource_id}"))?;
    let result = savezone.restore(&request).await;
    pb.finish_and_clear();
    let restored = result?;

    println!("Restored to {}", restored.display());
    Ok(())
}
