use anyhow::Result;
use std::path::Path;

use super::open;

pub async fn run(storage: &str, token: Option<&str>, base_dir: &Path) -> Result<()> {
    let savezone = open(base_dir)?;
    let name = savezone.registry().resolve(storage)?.display_name;
    let meta = savezone.meta(storage, token).await?;

    println!("{name}:");
    println!("  Used:           {}", meta.used_space_display());
    println!("  Total:          {}", meta.total_space_display());
    println!(
        "  Available:      {} ({}%)",
        meta.available_space_display(),
        meta.available_space_percentage()
    );

    Ok(())
}
