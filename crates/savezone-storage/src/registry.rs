use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use savezone_core::config::SavezoneConfig;
use savezone_core::config::credentials::TokenStore;
use savezone_core::error::{Result, SavezoneError};

use crate::gdrive::{self, GDriveStorage};
use crate::http::HttpTransport;
use crate::local::{self, LocalStorage};
use crate::provider::StorageProvider;
use crate::yadisk::{self, YadiskStorage};

/// Adapter family behind a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Yandex,
    GDrive,
    Local,
}

/// How a storage obtains a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Open the provider's OAuth page, paste the resulting token.
    InteractiveRedirect,
    /// Import a credential file, refresh it as needed.
    StoredCredential,
    /// No token required.
    None,
}

impl fmt::Display for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthStrategy::InteractiveRedirect => write!(f, "oauth redirect"),
            AuthStrategy::StoredCredential => write!(f, "stored credential"),
            AuthStrategy::None => write!(f, "none"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Canonical name; also the token store key.
    pub key: &'static str,
    pub display_name: &'static str,
    pub synonyms: &'static [&'static str],
    pub auth: AuthStrategy,
    pub kind: StorageKind,
}

impl StorageEntry {
    pub fn requires_token(&self) -> bool {
        self.auth != AuthStrategy::None
    }

    fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        self.key.eq_ignore_ascii_case(name)
            || self.display_name.eq_ignore_ascii_case(name)
            || self.synonyms.iter().any(|s| s.eq_ignore_ascii_case(name))
    }
}

/// Maps user-facing storage names to adapters.
pub struct StorageRegistry {
    entries: Vec<StorageEntry>,
    config: SavezoneConfig,
    base_dir: PathBuf,
}

impl StorageRegistry {
    pub fn new(config: &SavezoneConfig, base_dir: &Path) -> Self {
        Self {
            entries: Vec::new(),
            config: config.clone(),
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Registry with Yandex Disk, Google Drive and the local storage.
    pub fn with_defaults(config: &SavezoneConfig, base_dir: &Path) -> Self {
        let mut registry = Self::new(config, base_dir);
        registry.register(StorageEntry {
            key: yadisk::STORAGE_KEY,
            display_name: "Yandex Disk",
            synonyms: &["yandex", "yd", "yadisk", "Yandex"],
            auth: AuthStrategy::InteractiveRedirect,
            kind: StorageKind::Yandex,
        });
        registry.register(StorageEntry {
            key: gdrive::STORAGE_KEY,
            display_name: "Google Drive",
            synonyms: &["gdrive", "google", "googledrive", "gd", "drive"],
            auth: AuthStrategy::StoredCredential,
            kind: StorageKind::GDrive,
        });
        registry.register(StorageEntry {
            key: local::STORAGE_KEY,
            display_name: "Local Storage",
            synonyms: &["local", "fs"],
            auth: AuthStrategy::None,
            kind: StorageKind::Local,
        });
        registry
    }

    pub fn register(&mut self, entry: StorageEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[StorageEntry] {
        &self.entries
    }

    pub fn config(&self) -> &SavezoneConfig {
        &self.config
    }

    /// Find the entry for a key, display name or synonym (case-insensitive).
    pub fn resolve(&self, name: &str) -> Result<&StorageEntry> {
        self.entries
            .iter()
            .find(|e| e.matches(name))
            .ok_or_else(|| {
                let known: Vec<&str> = self.entries.iter().map(|e| e.key).collect();
                SavezoneError::ProviderNotFound(format!(
                    "'{name}' (known storages: {})",
                    known.join(", ")
                ))
            })
    }

    /// Browser link for storages authorized by OAuth redirect.
    pub fn oauth_request_url(&self, entry: &StorageEntry) -> Option<String> {
        match (entry.auth, entry.kind) {
            (AuthStrategy::InteractiveRedirect, StorageKind::Yandex) => {
                Some(YadiskStorage::oauth_request_url(&self.config.yandex))
            }
            _ => None,
        }
    }

    /// Token for `entry`, in order: the explicit one, then the token store.
    ///
    /// Stored Google Drive credentials are refreshed when expired. Returns
    /// `None` when nothing is available; storages that need no token always
    /// get `None`.
    pub async fn resolve_token(
        &self,
        entry: &StorageEntry,
        explicit: Option<&str>,
        store: &dyn TokenStore,
        transport: &dyn HttpTransport,
    ) -> Result<Option<String>> {
        if !entry.requires_token() {
            return Ok(None);
        }
        if let Some(token) = explicit.filter(|t| !t.trim().is_empty()) {
            return Ok(Some(token.trim().to_string()));
        }
        match entry.kind {
            StorageKind::GDrive => {
                if store.get(entry.key)?.is_none() {
                    return Ok(None);
                }
                GDriveStorage::auth(store, transport).await.map(Some)
            }
            _ => Ok(store.get(entry.key)?.filter(|t| !t.trim().is_empty())),
        }
    }

    /// Build the adapter for `entry`.
    pub fn connect(
        &self,
        entry: &StorageEntry,
        token: Option<&str>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Box<dyn StorageProvider>> {
        let token = || {
            token.ok_or_else(|| {
                SavezoneError::Auth(format!(
                    "no token for {}, run `savezone auth -s {}` first",
                    entry.display_name, entry.key
                ))
            })
        };
        let provider: Box<dyn StorageProvider> = match entry.kind {
            StorageKind::Yandex => Box::new(YadiskStorage::new(
                transport,
                token()?,
                &self.config.yandex,
            )),
            StorageKind::GDrive => Box::new(GDriveStorage::new(
                transport,
                token()?,
                &self.config.gdrive,
            )),
            StorageKind::Local => Box::new(LocalStorage::new(
                &self.config.local_root(&self.base_dir),
                self.config.local.capacity,
            )?),
        };
        Ok(provider)
    }
}
