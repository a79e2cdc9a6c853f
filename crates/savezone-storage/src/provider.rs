use async_trait::async_trait;
use std::path::{Path, PathBuf};

use savezone_core::error::Result;
use savezone_core::types::{Resource, StorageMetaInfo};

/// Uniform contract over path-addressed and id-addressed remote storages.
///
/// Remote paths are `/`-delimited strings relative to the storage root,
/// whatever the storage's own addressing model is.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List the immediate children of `remote_path`.
    ///
    /// Fails with `Remote` (404 when the path does not exist).
    async fn list_resources_on_path(&self, remote_path: &str) -> Result<Vec<Resource>>;

    /// Quota snapshot.
    async fn get_meta_info(&self) -> Result<StorageMetaInfo>;

    /// Upload the local file at `resource.path` to `remote_path`, creating
    /// missing intermediate directories.
    async fn save_resource_to_path(
        &self,
        resource: &Resource,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<Resource>;

    /// Fetch `remote_path` into the local file `local_path`.
    async fn download_resource(&self, remote_path: &str, local_path: &Path) -> Result<PathBuf>;

    /// Provider name for display.
    fn name(&self) -> &str;
}

/// Non-empty segments of a remote path.
pub fn path_segments(remote_path: &str) -> Vec<&str> {
    remote_path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Split a remote path into its parent segments and final name.
pub fn split_parent(remote_path: &str) -> Option<(Vec<&str>, &str)> {
    let mut segments = path_segments(remote_path);
    let name = segments.pop()?;
    Some((segments, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_skip_empty_parts() {
        assert_eq!(path_segments("/a//b/c/"), vec!["a", "b", "c"]);
        assert!(path_segments("/").is_empty());
    }

    #[test]
    fn split_parent_of_nested_path() {
        let (parent, name) = split_parent("savezone/ID-x/01012024000000").unwrap();
        assert_eq!(parent, vec!["savezone", "ID-x"]);
        assert_eq!(name, "01012024000000");
        assert!(split_parent("").is_none());
    }
}
