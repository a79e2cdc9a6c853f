use async_trait::async_trait;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use savezone_core::config::YandexSettings;
use savezone_core::error::{Result, SavezoneError};
use savezone_core::types::{Resource, Size, SizeUnit, StorageMetaInfo};

use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use crate::provider::{StorageProvider, path_segments, split_parent};

/// Registry key and token store key.
pub const STORAGE_KEY: &str = "yandex";

const PAGE_LIMIT: usize = 1000;
const DIRECTORY_EXISTS: &str = "DiskPathPointsToExistentDirectoryError";
const RESOURCE_EXISTS: &str = "DiskResourceAlreadyExistsError";

/// Yandex Disk: a path-addressed tree.
///
/// Uploads are two-step (ask for an upload link, PUT the bytes to it).
/// Directories are created one path prefix at a time.
pub struct YadiskStorage {
    transport: Arc<dyn HttpTransport>,
    token: String,
    api_url: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct YadiskItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    name: Option<String>,
    size: Option<u64>,
    file: Option<String>,
    created: Option<String>,
    modified: Option<String>,
    md5: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YadiskListing {
    #[serde(rename = "_embedded")]
    embedded: Option<YadiskEmbedded>,
}

#[derive(Debug, Deserialize)]
struct YadiskEmbedded {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct YadiskQuota {
    total_space: u64,
    used_space: u64,
}

#[derive(Debug, Deserialize)]
struct YadiskLink {
    href: Option<String>,
}

enum UploadAttempt {
    Uploaded(Resource),
    /// The link request hit a 409 because a parent directory is missing.
    ParentMissing(SavezoneError),
}

impl YadiskStorage {
    pub fn new(transport: Arc<dyn HttpTransport>, token: &str, settings: &YandexSettings) -> Self {
        Self {
            transport,
            token: token.to_string(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            name: "Yandex Disk".to_string(),
        }
    }

    /// Browser link that leads the user to an implicit-grant token.
    pub fn oauth_request_url(settings: &YandexSettings) -> String {
        format!(
            "{}?response_type=token&client_id={}",
            settings.oauth_url, settings.client_id
        )
    }

    fn resources_url(&self) -> String {
        format!("{}/resources", self.api_url)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.display_url(), "yandex request");
        self.transport
            .execute(request.authorization("OAuth", &self.token))
            .await
    }

    /// Create every prefix of `segments` in order. Existing directories are
    /// not an error, so this is idempotent.
    pub async fn create_path(&self, segments: &[&str]) -> Result<()> {
        let mut prefix = String::new();
        for segment in segments {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let resp = self
                .send(HttpRequest::put(self.resources_url()).query("path", &prefix))
                .await?;
            if resp.is_success() {
                info!(path = %prefix, "created remote directory");
            } else if resp.status == 409 && is_existing_directory(&resp) {
                debug!(path = %prefix, "remote directory already exists");
            } else {
                return Err(resp.into_error());
            }
        }
        Ok(())
    }

    async fn try_upload(
        &self,
        resource: &Resource,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<UploadAttempt> {
        let resp = self
            .send(
                HttpRequest::get(format!("{}/upload", self.resources_url()))
                    .query("path", remote_path)
                    .query("overwrite", overwrite),
            )
            .await?;
        if resp.status == 409 && resp.error_code().as_deref() != Some(RESOURCE_EXISTS) {
            return Ok(UploadAttempt::ParentMissing(resp.into_error()));
        }
        let resp = resp.ensure_success()?;
        let link: YadiskLink = resp.json()?;
        let href = link
            .href
            .ok_or_else(|| SavezoneError::remote(resp.status, "upload link missing"))?;

        let local_md5 = file_md5(Path::new(&resource.path))?;
        // The upload link is pre-authorized.
        let upload = HttpRequest::put(href).file_body(Path::new(&resource.path))?;
        let size = upload.body.as_ref().map_or(0, |b| b.len());
        self.transport.execute(upload).await?.ensure_success()?;
        info!(remote = %remote_path, size, "uploaded to Yandex Disk");

        let meta = self
            .send(HttpRequest::get(self.resources_url()).query("path", remote_path))
            .await?;
        let uploaded = if meta.is_success() {
            parse_item(meta.json()?).unwrap_or_else(|| resource.relocated(remote_path))
        } else {
            warn!(remote = %remote_path, status = meta.status, "uploaded, but metadata lookup failed");
            resource.relocated(remote_path)
        };
        if let Some(remote_md5) = &uploaded.md5 {
            if *remote_md5 != local_md5 {
                warn!(remote = %remote_path, %local_md5, %remote_md5, "checksum mismatch after upload");
            }
        }
        Ok(UploadAttempt::Uploaded(uploaded))
    }
}

fn file_md5(path: &Path) -> Result<String> {
    let mut hasher = Md5::new();
    std::io::copy(&mut std::fs::File::open(path)?, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn is_existing_directory(resp: &HttpResponse) -> bool {
    if resp.error_code().as_deref() == Some(DIRECTORY_EXISTS) {
        return true;
    }
    let message = resp.message();
    message.contains("already exists") || message.contains("уже существует")
}

/// `disk:/a/b` -> `a/b`
fn normalize_path(path: &str) -> String {
    path.strip_prefix("disk:")
        .unwrap_or(path)
        .trim_start_matches('/')
        .to_string()
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Items missing `path` or `type` are skipped rather than failing the call.
fn parse_item(value: serde_json::Value) -> Option<Resource> {
    let item: YadiskItem = serde_json::from_value(value).ok()?;
    let mut resource =
        Resource::new(item.kind != "dir", normalize_path(&item.path)).with_name(item.name.unwrap_or_default());
    resource.size = item.size.map(|s| Size {
        value: s,
        unit: SizeUnit::Bytes,
    });
    resource.url = item.file;
    resource.created = parse_time(item.created.as_deref());
    resource.updated = parse_time(item.modified.as_deref());
    resource.md5 = item.md5;
    Some(resource)
}

#[async_trait]
impl StorageProvider for YadiskStorage {
    async fn list_resources_on_path(&self, remote_path: &str) -> Result<Vec<Resource>> {
        let path = match path_segments(remote_path).join("/") {
            root if root.is_empty() => "/".to_string(),
            path => path,
        };

        let mut resources = Vec::new();
        let mut offset = 0;
        loop {
            let resp = self
                .send(
                    HttpRequest::get(self.resources_url())
                        .query("path", &path)
                        .query("limit", PAGE_LIMIT)
                        .query("offset", offset),
                )
                .await?
                .ensure_success()?;
            let listing: YadiskListing = resp.json()?;
            let Some(embedded) = listing.embedded else {
                break;
            };
            let fetched = embedded.items.len();
            resources.extend(embedded.items.into_iter().filter_map(parse_item));
            offset += fetched;
            if fetched == 0 || offset >= embedded.total.unwrap_or(offset) {
                break;
            }
        }
        Ok(resources)
    }

    async fn get_meta_info(&self) -> Result<StorageMetaInfo> {
        let resp = self
            .send(HttpRequest::get(format!("{}/", self.api_url)))
            .await?
            .ensure_success()?;
        let quota: YadiskQuota = resp.json()?;
        Ok(StorageMetaInfo::new(
            quota.used_space,
            quota.total_space,
            SizeUnit::Bytes,
        ))
    }

    async fn save_resource_to_path(
        &self,
        resource: &Resource,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<Resource> {
        let cause = match self.try_upload(resource, remote_path, overwrite).await? {
            UploadAttempt::Uploaded(uploaded) => return Ok(uploaded),
            UploadAttempt::ParentMissing(cause) => cause,
        };

        debug!(remote = %remote_path, %cause, "parent directory missing, creating it");
        let (parents, _) = split_parent(remote_path)
            .ok_or_else(|| SavezoneError::Validation("empty remote path".to_string()))?;
        self.create_path(&parents).await?;

        match self.try_upload(resource, remote_path, overwrite).await? {
            UploadAttempt::Uploaded(uploaded) => Ok(uploaded),
            UploadAttempt::ParentMissing(err) => Err(err),
        }
    }

    async fn download_resource(&self, remote_path: &str, local_path: &Path) -> Result<PathBuf> {
        let resp = self
            .send(
                HttpRequest::get(format!("{}/download", self.resources_url()))
                    .query("path", remote_path),
            )
            .await?
            .ensure_success()?;
        let link: YadiskLink = resp.json()?;
        let href = link
            .href
            .ok_or_else(|| SavezoneError::remote(resp.status, "download link missing"))?;

        let file = self
            .transport
            .execute(HttpRequest::get(href))
            .await?
            .ensure_success()?;
        std::fs::write(local_path, &file.body)?;
        info!(remote = %remote_path, local = %local_path.display(), size = file.body.len(), "downloaded from Yandex Disk");
        Ok(local_path.to_path_buf())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
