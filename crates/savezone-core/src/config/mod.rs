pub mod credentials;

use crate::error::{Result, SavezoneError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level Savezone configuration stored as TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavezoneConfig {
    #[serde(default)]
    pub savezone: SavezoneSettings,
    #[serde(default)]
    pub yandex: YandexSettings,
    #[serde(default)]
    pub gdrive: GDriveSettings,
    #[serde(default)]
    pub local: LocalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavezoneSettings {
    /// Remote folder all automatic backups are nested under.
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    /// Appended to `base_directory` for backups with an explicit target.
    #[serde(default = "default_custom_suffix")]
    pub custom_suffix: String,
    /// Parent directory for restores without an explicit target.
    #[serde(default = "default_restore_dir")]
    pub restore_dir: String,
    /// Where temporary archives are written (system temp dir when unset).
    #[serde(default)]
    pub scratch_dir: Option<String>,
    /// JSON file holding per-storage tokens.
    #[serde(default)]
    pub token_store: Option<String>,
}

impl Default for SavezoneSettings {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            custom_suffix: default_custom_suffix(),
            restore_dir: default_restore_dir(),
            scratch_dir: None,
            token_store: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YandexSettings {
    /// OAuth application id used to build the authorization link.
    #[serde(default = "default_yandex_client_id")]
    pub client_id: String,
    #[serde(default = "default_yandex_api_url")]
    pub api_url: String,
    #[serde(default = "default_yandex_oauth_url")]
    pub oauth_url: String,
}

impl Default for YandexSettings {
    fn default() -> Self {
        Self {
            client_id: default_yandex_client_id(),
            api_url: default_yandex_api_url(),
            oauth_url: default_yandex_oauth_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GDriveSettings {
    #[serde(default = "default_gdrive_api_url")]
    pub api_url: String,
    #[serde(default = "default_gdrive_upload_url")]
    pub upload_url: String,
}

impl Default for GDriveSettings {
    fn default() -> Self {
        Self {
            api_url: default_gdrive_api_url(),
            upload_url: default_gdrive_upload_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalSettings {
    /// Root directory of the local storage (`<config_dir>/local` when unset).
    #[serde(default)]
    pub root: Option<String>,
    /// Nominal capacity reported by `meta`, in bytes.
    #[serde(default)]
    pub capacity: Option<u64>,
}

fn default_base_directory() -> String {
    "savezone".to_string()
}

fn default_custom_suffix() -> String {
    "-custom".to_string()
}

fn default_restore_dir() -> String {
    "restored".to_string()
}

fn default_yandex_client_id() -> String {
    "684404c2a24f4c46a7ea73447888e225".to_string()
}

fn default_yandex_api_url() -> String {
    "https://cloud-api.yandex.net/v1/disk".to_string()
}

fn default_yandex_oauth_url() -> String {
    "https://oauth.yandex.ru/authorize".to_string()
}

fn default_gdrive_api_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_gdrive_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

impl SavezoneConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SavezoneError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SavezoneError::TomlDe(e.to_string()))
    }

    /// Load config, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(SavezoneError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Save config to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SavezoneError::TomlSer(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config for `savezone init`, with paths anchored at `base_dir`.
    pub fn default_config(base_dir: &Path) -> Self {
        let mut config = Self::default();
        config.savezone.token_store = Some(base_dir.join("tokens.json").display().to_string());
        config.local.root = Some(base_dir.join("local").display().to_string());
        config
    }

    /// Token store path, defaulting to `<base_dir>/tokens.json`.
    pub fn token_store_path(&self, base_dir: &Path) -> PathBuf {
        self.savezone
            .token_store
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("tokens.json"))
    }

    /// Local storage root, defaulting to `<base_dir>/local`.
    pub fn local_root(&self, base_dir: &Path) -> PathBuf {
        self.local
            .root
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| base_dir.join("local"))
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.savezone
            .scratch_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Resolve the config file path: `<base_dir>/savezone.toml`
    pub fn default_path(base_dir: &Path) -> PathBuf {
        base_dir.join("savezone.toml")
    }

    /// Resolve the default savezone home directory: `~/.savezone`
    pub fn default_base_dir() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|h| h.join(".savezone"))
            .ok_or_else(|| SavezoneError::Config("Cannot determine home directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("savezone.toml");
        let config = SavezoneConfig::default_config(tmp.path());
        config.save(&path).unwrap();
        let loaded = SavezoneConfig::load(&path).unwrap();
        assert_eq!(loaded.savezone.base_directory, "savezone");
        assert_eq!(
            loaded.token_store_path(Path::new("/elsewhere")),
            tmp.path().join("tokens.json")
        );
    }

    #[test]
    fn load_nonexistent_returns_error() {
        let result = SavezoneConfig::load(Path::new("/nonexistent/savezone.toml"));
        assert!(matches!(result, Err(SavezoneError::ConfigNotFound(_))));
    }

    #[test]
    fn load_or_default_without_file() {
        let config =
            SavezoneConfig::load_or_default(Path::new("/nonexistent/savezone.toml")).unwrap();
        assert_eq!(config.savezone.custom_suffix, "-custom");
        assert_eq!(config.yandex.api_url, "https://cloud-api.yandex.net/v1/disk");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("savezone.toml");
        std::fs::write(&path, "[savezone]\nbase_directory = \"archive\"\n").unwrap();
        let config = SavezoneConfig::load(&path).unwrap();
        assert_eq!(config.savezone.base_directory, "archive");
        assert_eq!(config.savezone.restore_dir, "restored");
        assert_eq!(config.gdrive.api_url, "https://www.googleapis.com/drive/v3");
        assert_eq!(config.local_root(tmp.path()), tmp.path().join("local"));
    }
}
