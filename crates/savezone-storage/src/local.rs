use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use savezone_core::error::{Result, SavezoneError};
use savezone_core::types::{Resource, Size, SizeUnit, StorageMetaInfo};

use crate::provider::{StorageProvider, path_segments};

/// Registry key.
pub const STORAGE_KEY: &str = "local";

/// Filesystem-backed storage rooted at a directory.
///
/// Remote paths are resolved relative to the root. A missing path is a
/// `Remote` 404, the same as on a cloud storage.
pub struct LocalStorage {
    root: PathBuf,
    capacity: Option<u64>,
    name: String,
}

impl LocalStorage {
    pub fn new(root: &Path, capacity: Option<u64>) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            capacity,
            name: "Local Storage".to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, remote_path: &str) -> Result<(PathBuf, String)> {
        let segments = path_segments(remote_path);
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(SavezoneError::Validation(format!(
                "remote path {remote_path} escapes the storage root"
            )));
        }
        let local = segments.iter().fold(self.root.clone(), |p, s| p.join(s));
        Ok((local, segments.join("/")))
    }
}

fn not_found(remote_path: &str) -> SavezoneError {
    SavezoneError::remote(404, format!("{remote_path} not found"))
}

fn describe(local: &Path, remote_path: String) -> Result<Resource> {
    let metadata = std::fs::metadata(local)?;
    let mut resource = Resource::new(metadata.is_file(), remote_path);
    if metadata.is_file() {
        resource.size = Some(Size::bytes(metadata.len()));
    }
    resource.updated = metadata.modified().ok().map(DateTime::<Utc>::from);
    resource.created = metadata.created().ok().map(DateTime::<Utc>::from);
    Ok(resource)
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn list_resources_on_path(&self, remote_path: &str) -> Result<Vec<Resource>> {
        let (dir, prefix) = self.resolve(remote_path)?;
        if !dir.exists() {
            return Err(not_found(remote_path));
        }
        if !dir.is_dir() {
            return Err(SavezoneError::remote(
                400,
                format!("{remote_path} is not a directory"),
            ));
        }

        let mut entries: Vec<_> = std::fs::read_dir(&dir)?.collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());
        entries
            .iter()
            .map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let path = match prefix.as_str() {
                    "" => name,
                    prefix => format!("{prefix}/{name}"),
                };
                describe(&entry.path(), path)
            })
            .collect()
    }

    async fn get_meta_info(&self) -> Result<StorageMetaInfo> {
        let mut used = 0u64;
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if entry.file_type().is_file() {
                used += entry.metadata()?.len();
            }
        }
        Ok(StorageMetaInfo::new(
            used,
            self.capacity.unwrap_or(used),
            SizeUnit::Bytes,
        ))
    }

    async fn save_resource_to_path(
        &self,
        resource: &Resource,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<Resource> {
        let (dest, normalized) = self.resolve(remote_path)?;
        if normalized.is_empty() {
            return Err(SavezoneError::Validation("empty remote path".to_string()));
        }
        if dest.exists() && !overwrite {
            return Err(SavezoneError::remote(
                409,
                format!("{remote_path} already exists"),
            ));
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let size = std::fs::copy(&resource.path, &dest)?;
        info!(remote = %normalized, size, "stored in local storage");
        describe(&dest, normalized)
    }

    async fn download_resource(&self, remote_path: &str, local_path: &Path) -> Result<PathBuf> {
        let (src, _) = self.resolve(remote_path)?;
        if !src.is_file() {
            return Err(not_found(remote_path));
        }
        std::fs::copy(&src, local_path)?;
        Ok(local_path.to_path_buf())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
