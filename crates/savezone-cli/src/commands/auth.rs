use anyhow::Result;
use std::path::Path;

use savezone_core::config::credentials::TokenStore;
use savezone_storage::gdrive::GDriveStorage;
use savezone_storage::http::ReqwestTransport;
use savezone_storage::registry::{AuthStrategy, StorageRegistry};

use super::{load_config, token_store};

pub async fn run(storage: &str, credentials: Option<&Path>, base_dir: &Path) -> Result<()> {
    let config = load_config(base_dir)?;
    let store = token_store(&config, base_dir);
    let registry = StorageRegistry::with_defaults(&config, base_dir);
    let entry = registry.resolve(storage)?;

    match entry.auth {
        AuthStrategy::InteractiveRedirect => {
            let url = registry
                .oauth_request_url(entry)
                .ok_or_else(|| anyhow::anyhow!("{} has no authorization link", entry.display_name))?;
            println!("Open this link and allow access to {}:", entry.display_name);
            println!("\n  {url}\n");
            let token = crate::prompt("Paste the token: ")?;
            if token.is_empty() {
                anyhow::bail!("No token entered");
            }
            store.set(entry.key, &token)?;
        }
        AuthStrategy::StoredCredential => {
            if let Some(file) = credentials {
                let blob = std::fs::read_to_string(file)?;
                GDriveStorage::import_credentials(&store, &blob)?;
                println!("Imported credentials from {}", file.display());
            }
            GDriveStorage::auth(&store, &ReqwestTransport::new()).await?;
        }
        AuthStrategy::None => {
            println!("{} needs no authorization.", entry.display_name);
            return Ok(());
        }
    }

    println!(
        "{} authorized; token saved to {}",
        entry.display_name,
        store.path().display()
    );
    Ok(())
}
