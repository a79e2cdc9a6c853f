use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};
use tracing::{info, warn};

use savezone_core::archive;
use savezone_core::codec;
use savezone_core::config::credentials::TokenStore;
use savezone_core::error::{Result, SavezoneError};
use savezone_core::types::{Backup, Resource, StorageMetaInfo};
use savezone_storage::http::HttpTransport;
use savezone_storage::provider::StorageProvider;
use savezone_storage::registry::StorageRegistry;

use crate::layout::{Clock, RemoteLayout, SystemClock, parse_timestamp};

#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub local_path: PathBuf,
    /// Explicit target under the custom directory. Such backups are not
    /// addressable by resource identifier.
    pub remote_path: Option<String>,
    pub storage: String,
    pub token: Option<String>,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// `[<base>/]<resource_id>[/<timestamp>]`; the newest version is used
    /// when no timestamp is given.
    pub remote_path: String,
    pub storage: String,
    /// Directory to unpack into; `<restore_dir>/<file_name>` when absent.
    pub target: Option<PathBuf>,
    pub token: Option<String>,
}

/// Backup orchestrator: ties the registry, the token store, the remote
/// layout and the archive helpers together.
pub struct Savezone {
    registry: StorageRegistry,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn HttpTransport>,
    clock: Box<dyn Clock>,
    layout: RemoteLayout,
    scratch_dir: PathBuf,
    restore_dir: PathBuf,
}

impl Savezone {
    pub fn new(
        registry: StorageRegistry,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let config = registry.config();
        let layout = RemoteLayout::from_settings(&config.savezone);
        let scratch_dir = config.scratch_dir();
        let restore_dir = PathBuf::from(&config.savezone.restore_dir);
        Self {
            registry,
            store,
            transport,
            clock: Box::new(SystemClock),
            layout,
            scratch_dir,
            restore_dir,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_restore_dir(mut self, dir: &Path) -> Self {
        self.restore_dir = dir.to_path_buf();
        self
    }

    pub fn with_scratch_dir(mut self, dir: &Path) -> Self {
        self.scratch_dir = dir.to_path_buf();
        self
    }

    pub fn registry(&self) -> &StorageRegistry {
        &self.registry
    }

    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    /// Resolve `storage` and its token, and build the adapter.
    pub async fn connect(
        &self,
        storage: &str,
        token: Option<&str>,
    ) -> Result<Box<dyn StorageProvider>> {
        let entry = self.registry.resolve(storage)?;
        let token = self
            .registry
            .resolve_token(entry, token, self.store.as_ref(), self.transport.as_ref())
            .await?;
        if entry.requires_token() && token.is_none() {
            return Err(SavezoneError::Auth(format!(
                "no token for {}, run `savezone auth -s {}` first",
                entry.display_name, entry.key
            )));
        }
        self.registry
            .connect(entry, token.as_deref(), self.transport.clone())
    }

    fn scratch_file(&self) -> Result<NamedTempFile> {
        std::fs::create_dir_all(&self.scratch_dir)?;
        Ok(Builder::new()
            .prefix("savezone-")
            .suffix(".zip")
            .tempfile_in(&self.scratch_dir)?)
    }

    /// Archive a local file or directory and upload it as a new version.
    pub async fn backup(&self, request: &BackupRequest) -> Result<Backup> {
        let local = validate_local(&request.local_path)?;
        let provider = self.connect(&request.storage, request.token.as_deref()).await?;

        let remote_path = match &request.remote_path {
            Some(target) => self.layout.custom_path(target, &local)?,
            None => self.layout.auto_path(&local, self.clock.now())?,
        };

        // Removed on drop, whichever way this returns.
        let scratch = self.scratch_file()?;
        let size = archive::pack(&local, scratch.path())?;
        info!(source = %local.display(), remote = %remote_path, size, "archive ready");

        let archive = Resource::new(true, scratch.path().to_string_lossy());
        let uploaded = provider
            .save_resource_to_path(&archive, &remote_path, request.overwrite)
            .await?;
        scratch.close()?;

        let version = uploaded.relocated(&remote_path);
        info!(remote = %remote_path, storage = provider.name(), "backup stored");
        Ok(Backup {
            url: version.url.clone(),
            versions: vec![version],
            storage: provider.name().to_string(),
            name: local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: local.to_string_lossy().into_owned(),
        })
    }

    /// Download a backup version and unpack it locally. Returns the
    /// directory the archive was unpacked into.
    pub async fn restore(&self, request: &RestoreRequest) -> Result<PathBuf> {
        let provider = self.connect(&request.storage, request.token.as_deref()).await?;

        let version = self.layout.parse(&request.remote_path)?;
        let (original, name) = codec::decode(&version.resource_id)?;

        let target = request
            .target
            .clone()
            .unwrap_or_else(|| self.restore_dir.join(&name));
        if target.exists() {
            return Err(SavezoneError::Conflict(format!(
                "{} already exists",
                target.display()
            )));
        }

        let remote_path = match version.timestamp {
            Some(timestamp) => self.layout.version_path(&version.resource_id, &timestamp),
            None => self.latest_version(provider.as_ref(), &version.resource_id).await?,
        };

        let scratch = self.scratch_file()?;
        provider.download_resource(&remote_path, scratch.path()).await?;
        archive::unpack(scratch.path(), &target)?;
        scratch.close()?;

        info!(
            remote = %remote_path,
            original = %original.display(),
            target = %target.display(),
            "backup restored"
        );
        Ok(target)
    }

    async fn latest_version(
        &self,
        provider: &dyn StorageProvider,
        resource_id: &str,
    ) -> Result<String> {
        let dir = self.layout.backup_dir(resource_id);
        let mut versions = provider.list_resources_on_path(&dir).await?;
        sort_newest_first(&mut versions);
        versions
            .into_iter()
            .find(|v| parse_timestamp(&v.name).is_some())
            .map(|v| self.layout.version_path(resource_id, &v.name))
            .ok_or_else(|| SavezoneError::remote(404, format!("no versions under {dir}")))
    }

    /// Every backup under the base directory, with its versions newest
    /// first. Entries that cannot be decoded or listed are skipped.
    pub async fn get_backups(&self, storage: &str, token: Option<&str>) -> Result<Vec<Backup>> {
        let provider = self.connect(storage, token).await?;
        let base = self.layout.base_directory();

        let children = match provider.list_resources_on_path(base).await {
            Ok(children) => children,
            Err(e) if e.is_not_found() => {
                info!(base, "no backups yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut backups = Vec::new();
        for child in children {
            let (original, name) = match codec::decode(&child.name) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!(entry = %child.name, error = %e, "skipping entry");
                    continue;
                }
            };
            let dir = self.layout.backup_dir(&child.name);
            let mut versions = match provider.list_resources_on_path(&dir).await {
                Ok(versions) => versions,
                Err(e) => {
                    warn!(entry = %child.name, error = %e, "cannot list versions, skipping");
                    continue;
                }
            };
            sort_newest_first(&mut versions);
            backups.push(Backup {
                versions,
                storage: provider.name().to_string(),
                name,
                path: original.to_string_lossy().into_owned(),
                url: child.url,
            });
        }
        Ok(backups)
    }

    pub async fn list_resources(
        &self,
        storage: &str,
        remote_path: &str,
        token: Option<&str>,
    ) -> Result<Vec<Resource>> {
        let provider = self.connect(storage, token).await?;
        provider.list_resources_on_path(remote_path).await
    }

    pub async fn meta(&self, storage: &str, token: Option<&str>) -> Result<StorageMetaInfo> {
        let provider = self.connect(storage, token).await?;
        provider.get_meta_info().await
    }
}

/// Absolute path of an existing, readable file or directory. Symlinks are
/// kept as given, so the identifier names the link and not its target.
fn validate_local(path: &Path) -> Result<PathBuf> {
    let local = std::path::absolute(path).map_err(|e| {
        SavezoneError::Validation(format!("{}: {e}", path.display()))
    })?;
    if !local.exists() {
        return Err(SavezoneError::Validation(format!(
            "{} does not exist",
            local.display()
        )));
    }
    if local.is_file() {
        std::fs::File::open(&local).map_err(|e| {
            SavezoneError::Validation(format!("{} cannot be opened: {e}", local.display()))
        })?;
    } else if local.is_dir() {
        std::fs::read_dir(&local).map_err(|e| {
            SavezoneError::Validation(format!("{} cannot be read: {e}", local.display()))
        })?;
    } else {
        return Err(SavezoneError::Validation(format!(
            "{} is neither a file nor a directory",
            local.display()
        )));
    }
    Ok(local)
}

/// Newest parsed timestamp first; unparsable names keep listing order at
/// the end.
fn sort_newest_first(versions: &mut [Resource]) {
    versions.sort_by_key(|v| std::cmp::Reverse(parse_timestamp(&v.name)));
}
