use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use savezone_core::config::GDriveSettings;
use savezone_core::config::credentials::TokenStore;
use savezone_core::error::{Result, SavezoneError};
use savezone_core::types::{Resource, Size, SizeUnit, StorageMetaInfo};

use crate::http::{HttpBody, HttpRequest, HttpResponse, HttpTransport, Method};
use crate::provider::{StorageProvider, path_segments, split_parent};

/// Registry key and token store key.
pub const STORAGE_KEY: &str = "gdrive";

const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const ROOT_ID: &str = "root";
const FILE_FIELDS: &str = "id,name,mimeType,size,md5Checksum,webContentLink,modifiedTime,createdTime";
const PAGE_SIZE: usize = 1000;

/// Authorized-user OAuth credentials, as stored in the token store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    /// Anything else in the blob (scopes, account) is kept as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl AuthorizedUser {
    pub fn parse(blob: &str) -> Result<Self> {
        serde_json::from_str(blob)
            .map_err(|e| SavezoneError::Auth(format!("invalid Google Drive credentials: {e}")))
    }

    /// Access token that stays valid for at least another minute.
    pub fn fresh_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.token.as_deref()?;
        match self.expiry {
            Some(expiry) if expiry <= now + Duration::seconds(60) => None,
            _ => Some(token),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshedToken {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    size: Option<String>,
    md5_checksum: Option<String>,
    web_content_link: Option<String>,
    modified_time: Option<DateTime<Utc>>,
    created_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }

    fn into_resource(self, path: String) -> Resource {
        let mut resource = Resource::new(!self.is_folder(), path).with_name(self.name);
        resource.size = self
            .size
            .and_then(|s| s.parse().ok())
            .map(|value| Size {
                value,
                unit: SizeUnit::Bytes,
            });
        resource.md5 = self.md5_checksum;
        resource.url = self.web_content_link;
        resource.updated = self.modified_time;
        resource.created = self.created_time;
        resource
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveAbout {
    storage_quota: DriveQuota,
}

#[derive(Debug, Deserialize)]
struct DriveQuota {
    limit: Option<String>,
    usage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveId {
    id: String,
}

/// Google Drive: objects are addressed by opaque ids.
///
/// Paths are resolved one folder name at a time under `root`; resolved
/// folder ids are cached for the lifetime of the adapter, keyed by the path
/// prefix they were resolved for.
pub struct GDriveStorage {
    transport: Arc<dyn HttpTransport>,
    token: String,
    api_url: String,
    upload_url: String,
    folder_ids: Mutex<HashMap<String, String>>,
    name: String,
}

impl GDriveStorage {
    pub fn new(transport: Arc<dyn HttpTransport>, token: &str, settings: &GDriveSettings) -> Self {
        Self {
            transport,
            token: token.to_string(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            upload_url: settings.upload_url.trim_end_matches('/').to_string(),
            folder_ids: Mutex::new(HashMap::new()),
            name: "Google Drive".to_string(),
        }
    }

    /// Store an authorized-user credential blob after checking it parses.
    pub fn import_credentials(store: &dyn TokenStore, blob: &str) -> Result<()> {
        AuthorizedUser::parse(blob)?;
        store.set(STORAGE_KEY, blob.trim())
    }

    /// Produce a usable access token from the stored credentials,
    /// refreshing and persisting them when the access token has expired.
    pub async fn auth(store: &dyn TokenStore, transport: &dyn HttpTransport) -> Result<String> {
        let blob = store.get(STORAGE_KEY)?.ok_or_else(|| {
            SavezoneError::Auth(
                "no Google Drive credentials stored, run `savezone auth -s gdrive --credentials <file>` first"
                    .to_string(),
            )
        })?;
        let mut creds = AuthorizedUser::parse(&blob)?;
        let now = Utc::now();
        if let Some(token) = creds.fresh_token(now) {
            return Ok(token.to_string());
        }

        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            creds.refresh_token.as_deref(),
            creds.client_id.as_deref(),
            creds.client_secret.as_deref(),
        ) else {
            return Err(SavezoneError::Auth(
                "Google Drive token expired and cannot be refreshed".to_string(),
            ));
        };

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ]
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
        let resp = transport
            .execute(
                HttpRequest::post(creds.token_uri.clone())
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(form.into_bytes()),
            )
            .await?;
        if !resp.is_success() {
            return Err(SavezoneError::Auth(format!(
                "token refresh failed ({}): {}",
                resp.status,
                resp.message()
            )));
        }
        let refreshed: RefreshedToken = resp.json()?;

        creds.expiry = refreshed
            .expires_in
            .map(|secs| now + Duration::seconds(secs));
        creds.token = Some(refreshed.access_token.clone());
        store.set(STORAGE_KEY, &serde_json::to_string(&creds)?)?;
        info!("refreshed Google Drive access token");
        Ok(refreshed.access_token)
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = %request.method, url = %request.display_url(), "drive request");
        self.transport
            .execute(request.authorization("Bearer", &self.token))
            .await
    }

    fn cached_folder(&self, prefix: &str) -> Option<String> {
        self.folder_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(prefix)
            .cloned()
    }

    fn remember_folder(&self, prefix: &str, id: &str) {
        self.folder_ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(prefix.to_string(), id.to_string());
    }

    /// First non-trashed child of `parent_id` named `name`.
    async fn find_child(
        &self,
        parent_id: &str,
        name: &str,
        folders_only: bool,
    ) -> Result<Option<DriveFile>> {
        let mut query = format!(
            "name = '{}' and '{}' in parents and trashed = false",
            escape_query(name),
            escape_query(parent_id)
        );
        if folders_only {
            query.push_str(&format!(" and mimeType = '{FOLDER_MIME}'"));
        }
        let resp = self
            .send(
                HttpRequest::get(format!("{}/files", self.api_url))
                    .query("q", query)
                    .query("fields", format!("files({FILE_FIELDS})"))
                    .query("spaces", "drive"),
            )
            .await?
            .ensure_success()?;
        let list: DriveFileList = resp.json()?;
        Ok(list.files.into_iter().next())
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String> {
        let resp = self
            .send(
                HttpRequest::post(format!("{}/files", self.api_url))
                    .query("fields", "id")
                    .json(&json!({
                        "name": name,
                        "mimeType": FOLDER_MIME,
                        "parents": [parent_id],
                    })),
            )
            .await?
            .ensure_success()?;
        let created: DriveId = resp.json()?;
        info!(folder = %name, id = %created.id, "created Drive folder");
        Ok(created.id)
    }

    /// Walk `segments` from the root, returning the id of the last folder.
    /// Missing folders are created when `create` is set, otherwise the walk
    /// stops with `None`.
    async fn resolve_folder(&self, segments: &[&str], create: bool) -> Result<Option<String>> {
        let mut parent = ROOT_ID.to_string();
        let mut prefix = String::new();
        for segment in segments {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            if let Some(id) = self.cached_folder(&prefix) {
                parent = id;
                continue;
            }
            let id = match self.find_child(&parent, segment, true).await? {
                Some(folder) => folder.id,
                None if create => self.create_folder(&parent, segment).await?,
                None => return Ok(None),
            };
            self.remember_folder(&prefix, &id);
            parent = id;
        }
        Ok(Some(parent))
    }

    /// Resolve `segments`, creating whatever is missing. Returns the id of
    /// the deepest folder.
    pub async fn create_path(&self, segments: &[&str]) -> Result<String> {
        self.resolve_folder(segments, true)
            .await?
            .ok_or_else(|| SavezoneError::remote(404, "folder could not be created"))
    }

    async fn find_file(&self, remote_path: &str) -> Result<DriveFile> {
        let not_found = || SavezoneError::remote(404, format!("{remote_path} not found"));
        let (parents, name) = split_parent(remote_path).ok_or_else(not_found)?;
        let folder = self
            .resolve_folder(&parents, false)
            .await?
            .ok_or_else(not_found)?;
        self.find_child(&folder, name, false)
            .await?
            .ok_or_else(not_found)
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait]
impl StorageProvider for GDriveStorage {
    async fn list_resources_on_path(&self, remote_path: &str) -> Result<Vec<Resource>> {
        let segments = path_segments(remote_path);
        let folder = self
            .resolve_folder(&segments, false)
            .await?
            .ok_or_else(|| SavezoneError::remote(404, format!("{remote_path} not found")))?;
        let prefix = segments.join("/");

        let mut resources = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = HttpRequest::get(format!("{}/files", self.api_url))
                .query("q", format!("'{}' in parents and trashed = false", escape_query(&folder)))
                .query("fields", format!("nextPageToken,files({FILE_FIELDS})"))
                .query("pageSize", PAGE_SIZE);
            if let Some(token) = &page_token {
                request = request.query("pageToken", token);
            }
            let list: DriveFileList = self.send(request).await?.ensure_success()?.json()?;
            resources.extend(list.files.into_iter().map(|file| {
                let path = match prefix.as_str() {
                    "" => file.name.clone(),
                    prefix => format!("{prefix}/{}", file.name),
                };
                file.into_resource(path)
            }));
            match list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(resources)
    }

    async fn get_meta_info(&self) -> Result<StorageMetaInfo> {
        let about: DriveAbout = self
            .send(
                HttpRequest::get(format!("{}/about", self.api_url))
                    .query("fields", "storageQuota"),
            )
            .await?
            .ensure_success()?
            .json()?;
        let usage = about
            .storage_quota
            .usage
            .and_then(|u| u.parse().ok())
            .unwrap_or(0);
        // No limit means an unlimited plan.
        let limit = about
            .storage_quota
            .limit
            .and_then(|l| l.parse().ok())
            .unwrap_or(usage);
        Ok(StorageMetaInfo::new(usage, limit, SizeUnit::Bytes))
    }

    async fn save_resource_to_path(
        &self,
        resource: &Resource,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<Resource> {
        let (parents, name) = split_parent(remote_path)
            .ok_or_else(|| SavezoneError::Validation("empty remote path".to_string()))?;
        let folder = self.create_path(&parents).await?;
        let existing = self.find_child(&folder, name, false).await?;

        let session = match existing {
            Some(file) if overwrite => HttpRequest::new(
                Method::PATCH,
                format!("{}/files/{}", self.upload_url, file.id),
            )
            .json(&json!({ "name": name })),
            Some(_) => {
                return Err(SavezoneError::remote(
                    409,
                    format!("{remote_path} already exists"),
                ));
            }
            None => HttpRequest::post(format!("{}/files", self.upload_url))
                .json(&json!({ "name": name, "parents": [folder] })),
        };

        let data = HttpBody::file(Path::new(&resource.path))?;
        let size = data.len();
        let resp = self
            .send(
                session
                    .query("uploadType", "resumable")
                    .query("fields", FILE_FIELDS)
                    .header("X-Upload-Content-Type", "application/octet-stream")
                    .header("X-Upload-Content-Length", size.to_string()),
            )
            .await?
            .ensure_success()?;
        let location = resp
            .header("Location")
            .ok_or_else(|| SavezoneError::remote(resp.status, "upload session location missing"))?
            .to_string();

        let uploaded: DriveFile = self
            .send(HttpRequest::put(location).payload(data))
            .await?
            .ensure_success()?
            .json()?;
        info!(remote = %remote_path, id = %uploaded.id, size, "uploaded to Google Drive");
        Ok(uploaded.into_resource(parents_join(&parents, name)))
    }

    async fn download_resource(&self, remote_path: &str, local_path: &Path) -> Result<PathBuf> {
        let file = self.find_file(remote_path).await?;
        let resp = self
            .send(
                HttpRequest::get(format!("{}/files/{}", self.api_url, file.id))
                    .query("alt", "media"),
            )
            .await?
            .ensure_success()?;
        std::fs::write(local_path, &resp.body)?;
        info!(remote = %remote_path, local = %local_path.display(), size = resp.body.len(), "downloaded from Google Drive");
        Ok(local_path.to_path_buf())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn parents_join(parents: &[&str], name: &str) -> String {
    let mut segments = parents.to_vec();
    segments.push(name);
    segments.join("/")
}
