//! Where backups live on a remote storage.
//!
//! Automatic backups: `<base>/<resource_id>/<DDMMYYYYHHMMSS>`.
//! Backups with an explicit target: `<base><suffix>/<target>/<file_name>`.

use chrono::{Local, NaiveDateTime};
use std::path::Path;

use savezone_core::codec;
use savezone_core::config::SavezoneSettings;
use savezone_core::error::{Result, SavezoneError};
use savezone_storage::provider::path_segments;

/// Version folder name format.
pub const TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

/// Source of backup timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock, local time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// A backup addressed by its identifier, optionally pinned to one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRef {
    pub resource_id: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteLayout {
    base_directory: String,
    custom_suffix: String,
}

impl RemoteLayout {
    pub fn new(base_directory: &str, custom_suffix: &str) -> Self {
        Self {
            base_directory: base_directory.trim_matches('/').to_string(),
            custom_suffix: custom_suffix.to_string(),
        }
    }

    pub fn from_settings(settings: &SavezoneSettings) -> Self {
        Self::new(&settings.base_directory, &settings.custom_suffix)
    }

    pub fn base_directory(&self) -> &str {
        &self.base_directory
    }

    pub fn custom_directory(&self) -> String {
        format!("{}{}", self.base_directory, self.custom_suffix)
    }

    /// Folder holding every version of one resource.
    pub fn backup_dir(&self, resource_id: &str) -> String {
        format!("{}/{resource_id}", self.base_directory)
    }

    pub fn version_path(&self, resource_id: &str, timestamp: &str) -> String {
        format!("{}/{timestamp}", self.backup_dir(resource_id))
    }

    /// `<base>/<encode(local)>/<timestamp of at>`
    pub fn auto_path(&self, local: &Path, at: NaiveDateTime) -> Result<String> {
        let resource_id = codec::encode(local)?;
        Ok(self.version_path(&resource_id, &format_timestamp(at)))
    }

    /// `<base><suffix>/<target>/<file_name of local>`
    pub fn custom_path(&self, target: &str, local: &Path) -> Result<String> {
        let name = local
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SavezoneError::Validation(format!("{} has no usable file name", local.display()))
            })?;
        let mut segments = vec![self.custom_directory()];
        segments.extend(path_segments(target).into_iter().map(str::to_string));
        segments.push(name.to_string());
        Ok(segments.join("/"))
    }

    /// Parse `[<base>/]<resource_id>[/<timestamp>]`.
    pub fn parse(&self, remote_path: &str) -> Result<VersionRef> {
        let mut segments = path_segments(remote_path);
        if segments.first() == Some(&self.custom_directory().as_str()) {
            return Err(SavezoneError::Format(format!(
                "{remote_path} was backed up to an explicit target and has no resource identifier"
            )));
        }
        if segments.len() > 1 && segments.first() == Some(&self.base_directory.as_str()) {
            segments.remove(0);
        }
        match segments.as_slice() {
            [id] => Ok(VersionRef {
                resource_id: id.to_string(),
                timestamp: None,
            }),
            [id, timestamp] => Ok(VersionRef {
                resource_id: id.to_string(),
                timestamp: Some(timestamp.to_string()),
            }),
            _ => Err(SavezoneError::Format(format!(
                "expected <resource_id>[/<timestamp>], got {remote_path:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn new_year() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn layout() -> RemoteLayout {
        RemoteLayout::new("savezone", "-custom")
    }

    #[test]
    fn auto_path_is_deterministic() {
        let path = layout()
            .auto_path(Path::new("/tmp/report.pdf"), FixedClock(new_year()).now())
            .unwrap();
        assert_eq!(path, "savezone/F52G24BPOJSXA33SOQXHAZDG-report.pdf/01012024000000");
    }

    #[test]
    fn custom_path_nests_file_name() {
        let path = layout()
            .custom_path("/work/q1/", Path::new("/tmp/report.pdf"))
            .unwrap();
        assert_eq!(path, "savezone-custom/work/q1/report.pdf");
    }

    #[test]
    fn timestamp_roundtrip() {
        assert_eq!(format_timestamp(new_year()), "01012024000000");
        assert_eq!(parse_timestamp("01012024000000"), Some(new_year()));
        assert_eq!(parse_timestamp("latest"), None);
    }

    #[test]
    fn parse_with_and_without_base() {
        let layout = layout();
        let pinned = VersionRef {
            resource_id: "ID-a".to_string(),
            timestamp: Some("01012024000000".to_string()),
        };
        assert_eq!(layout.parse("savezone/ID-a/01012024000000").unwrap(), pinned);
        assert_eq!(layout.parse("/ID-a/01012024000000").unwrap(), pinned);
        assert_eq!(layout.parse("ID-a").unwrap().timestamp, None);
        assert_eq!(layout.parse("savezone/ID-a").unwrap().resource_id, "ID-a");
    }

    #[test]
    fn parse_rejects_other_shapes() {
        let layout = layout();
        assert!(matches!(layout.parse(""), Err(SavezoneError::Format(_))));
        assert!(matches!(layout.parse("a/b/c/d"), Err(SavezoneError::Format(_))));
        assert!(matches!(
            layout.parse("savezone-custom/work/report.pdf"),
            Err(SavezoneError::Format(_))
        ));
    }
}
