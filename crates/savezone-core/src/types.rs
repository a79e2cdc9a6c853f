use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit a provider reports sizes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizeUnit {
    Bytes,
    Kilobytes,
    Megabytes,
}

impl SizeUnit {
    fn to_megabytes(self, value: f64) -> f64 {
        match self {
            SizeUnit::Bytes => value / 1024.0 / 1024.0,
            SizeUnit::Kilobytes => value / 1024.0,
            SizeUnit::Megabytes => value,
        }
    }
}

impl fmt::Display for SizeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeUnit::Bytes => write!(f, "B"),
            SizeUnit::Kilobytes => write!(f, "Kb"),
            SizeUnit::Megabytes => write!(f, "Mb"),
        }
    }
}

/// A size together with the unit it was reported in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub value: u64,
    pub unit: SizeUnit,
}

impl Size {
    pub fn bytes(value: u64) -> Self {
        Self {
            value,
            unit: SizeUnit::Bytes,
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.unit != SizeUnit::Bytes {
            return write!(f, "{} {}", self.value, self.unit);
        }
        let bytes = self.value;
        if bytes >= GB {
            write!(f, "{:.1} GB", bytes as f64 / GB as f64)
        } else if bytes >= MB {
            write!(f, "{:.1} MB", bytes as f64 / MB as f64)
        } else if bytes >= KB {
            write!(f, "{:.1} KB", bytes as f64 / KB as f64)
        } else {
            write!(f, "{bytes} B")
        }
    }
}

/// A file or directory, local or remote.
///
/// `path` is a local filesystem path or a provider-specific remote path.
/// `name` is always derivable from the final path segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub is_file: bool,
    pub path: String,
    pub name: String,
    pub size: Option<Size>,
    pub url: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub md5: Option<String>,
}

impl Resource {
    pub fn new(is_file: bool, path: impl Into<String>) -> Self {
        let path = path.into();
        let name = name_from_path(&path);
        Self {
            is_file,
            path,
            name,
            size: None,
            url: None,
            created: None,
            updated: None,
            md5: None,
        }
    }

    /// Override the derived name. An empty name keeps the derived one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = name;
        }
        self
    }

    /// Same resource, addressed at a different path.
    pub fn relocated(&self, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            name: name_from_path(&path),
            path,
            ..self.clone()
        }
    }
}

/// Last non-empty segment of a `/`-delimited path, or the path itself.
pub fn name_from_path(path: &str) -> String {
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// Quota snapshot, normalized to megabytes on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageMetaInfo {
    pub used_space: f64,
    pub total_space: f64,
}

impl StorageMetaInfo {
    pub fn new(used_space: u64, total_space: u64, unit: SizeUnit) -> Self {
        Self {
            used_space: unit.to_megabytes(used_space as f64),
            total_space: unit.to_megabytes(total_space as f64),
        }
    }

    pub fn available_space(&self) -> f64 {
        self.total_space - self.used_space
    }

    /// Remaining capacity as a rounded percentage of the total.
    pub fn available_space_percentage(&self) -> u32 {
        if self.total_space <= 0.0 {
            return 0;
        }
        (100.0 * self.available_space() / self.total_space)
            .round()
            .max(0.0) as u32
    }

    pub fn used_space_display(&self) -> String {
        display_megabytes(self.used_space)
    }

    pub fn total_space_display(&self) -> String {
        display_megabytes(self.total_space)
    }

    pub fn available_space_display(&self) -> String {
        display_megabytes(self.available_space())
    }
}

fn display_megabytes(value: f64) -> String {
    format!("{} Mb", value.trunc() as i64)
}

impl fmt::Display for StorageMetaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} / {}",
            self.used_space_display(),
            self.total_space_display()
        )
    }
}

/// Result of one backup operation, or of grouping a remote listing.
///
/// Every version decodes to the same original `(path, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Backup {
    /// Newest first.
    pub versions: Vec<Resource>,
    pub storage: String,
    pub name: String,
    pub path: String,
    pub url: Option<String>,
}

impl Backup {
    pub fn latest(&self) -> Option<&Resource> {
        self.versions.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_derived_from_last_segment() {
        assert_eq!(Resource::new(true, "/tmp/report.pdf").name, "report.pdf");
        assert_eq!(Resource::new(false, "disk:/savezone/").name, "savezone");
        assert_eq!(Resource::new(true, "report.pdf").name, "report.pdf");
    }

    #[test]
    fn empty_name_override_keeps_derived_name() {
        let res = Resource::new(true, "a/b/c.txt").with_name("");
        assert_eq!(res.name, "c.txt");
    }

    #[test]
    fn relocated_rederives_name() {
        let res = Resource::new(true, "/tmp/savezone-abc.zip").relocated("savezone/X-a/01012024000000");
        assert_eq!(res.path, "savezone/X-a/01012024000000");
        assert_eq!(res.name, "01012024000000");
    }

    #[test]
    fn quota_from_bytes() {
        let meta = StorageMetaInfo::new(1_048_576, 10_485_760, SizeUnit::Bytes);
        assert_eq!(meta.used_space_display(), "1 Mb");
        assert_eq!(meta.total_space_display(), "10 Mb");
        assert_eq!(meta.available_space_display(), "9 Mb");
        assert_eq!(meta.available_space_percentage(), 90);
        assert_eq!(meta.to_string(), "1 Mb / 10 Mb");
    }

    #[test]
    fn quota_from_kilobytes() {
        let meta = StorageMetaInfo::new(2048, 8192, SizeUnit::Kilobytes);
        assert_eq!(meta.used_space, 2.0);
        assert_eq!(meta.total_space, 8.0);
        assert_eq!(meta.available_space_percentage(), 75);
    }

    #[test]
    fn quota_with_zero_total() {
        let meta = StorageMetaInfo::new(0, 0, SizeUnit::Megabytes);
        assert_eq!(meta.available_space_percentage(), 0);
    }

    #[test]
    fn size_display() {
        assert_eq!(Size::bytes(512).to_string(), "512 B");
        assert_eq!(Size::bytes(2048).to_string(), "2.0 KB");
        assert_eq!(Size::bytes(3 * 1024 * 1024).to_string(), "3.0 MB");
    }
}
